use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{KaocheError, Result};

/// RGBA color; `a` follows ASS semantics where 0 is opaque
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default)]
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0 }
    }

    /// `&HAABBGGRR`
    pub fn to_ass(&self) -> String {
        format!("&H{:02X}{:02X}{:02X}{:02X}", self.a, self.b, self.g, self.r)
    }

    /// `&HBBGGRR&`, the form used by inline `\c` overrides
    pub fn to_ass_inline(&self) -> String {
        format!("&H{:02X}{:02X}{:02X}&", self.b, self.g, self.r)
    }

    /// Accepts `&HAABBGGRR`, `&HBBGGRR&` and the decimal form found in SSA files
    pub fn from_ass(value: &str) -> Option<Self> {
        let value = value.trim();
        let raw = if let Some(hex) = value.strip_prefix("&H").or_else(|| value.strip_prefix("&h")) {
            u32::from_str_radix(hex.trim_end_matches('&'), 16).ok()?
        } else {
            value.parse::<i64>().ok()? as u32
        };
        Some(Self {
            r: (raw & 0xFF) as u8,
            g: ((raw >> 8) & 0xFF) as u8,
            b: ((raw >> 16) & 0xFF) as u8,
            a: ((raw >> 24) & 0xFF) as u8,
        })
    }

    /// Parse `#RRGGBB`
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let raw = u32::from_str_radix(hex, 16).ok()?;
        Some(Self::rgb((raw >> 16) as u8, (raw >> 8) as u8, raw as u8))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssStyle {
    pub name: String,
    pub fontname: String,
    pub fontsize: f32,
    pub primary_color: Color,
    pub secondary_color: Color,
    pub outline_color: Color,
    pub back_color: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikeout: bool,
    pub scale_x: f32,
    pub scale_y: f32,
    pub spacing: f32,
    pub angle: f32,
    pub border_style: u8,
    pub outline: f32,
    pub shadow: f32,
    /// Numpad alignment (1-9)
    pub alignment: u8,
    pub margin_l: i32,
    pub margin_r: i32,
    pub margin_v: i32,
    pub encoding: i32,
}

impl Default for AssStyle {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            fontname: "Arial".to_string(),
            fontsize: 20.0,
            primary_color: Color::rgb(255, 255, 255),
            secondary_color: Color::rgb(255, 0, 0),
            outline_color: Color::rgb(0, 0, 0),
            back_color: Color::rgb(0, 0, 0),
            bold: false,
            italic: false,
            underline: false,
            strikeout: false,
            scale_x: 100.0,
            scale_y: 100.0,
            spacing: 0.0,
            angle: 0.0,
            border_style: 1,
            outline: 2.0,
            shadow: 2.0,
            alignment: 2,
            margin_l: 10,
            margin_r: 10,
            margin_v: 10,
            encoding: 1,
        }
    }
}

/// Column order written to `[V4+ Styles]`
pub const STYLE_FORMAT: &str = "Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";

fn ass_bool(value: bool) -> i32 {
    if value { -1 } else { 0 }
}

fn fmt_num(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl AssStyle {
    /// Build a style from `Format:` field names and their values
    pub fn from_fields(format: &[String], values: &[&str]) -> Self {
        let mut style = Self::default();
        for (key, value) in format.iter().zip(values.iter()) {
            let value = value.trim();
            let flag = || value.parse::<i32>().map(|v| v != 0).unwrap_or(false);
            let num = |fallback: f32| value.parse::<f32>().unwrap_or(fallback);
            match key.to_lowercase().as_str() {
                "name" => style.name = value.to_string(),
                "fontname" => style.fontname = value.to_string(),
                "fontsize" => style.fontsize = num(style.fontsize),
                "primarycolour" => style.primary_color = Color::from_ass(value).unwrap_or(style.primary_color),
                "secondarycolour" => style.secondary_color = Color::from_ass(value).unwrap_or(style.secondary_color),
                "outlinecolour" | "tertiarycolour" => style.outline_color = Color::from_ass(value).unwrap_or(style.outline_color),
                "backcolour" => style.back_color = Color::from_ass(value).unwrap_or(style.back_color),
                "bold" => style.bold = flag(),
                "italic" => style.italic = flag(),
                "underline" => style.underline = flag(),
                "strikeout" => style.strikeout = flag(),
                "scalex" => style.scale_x = num(style.scale_x),
                "scaley" => style.scale_y = num(style.scale_y),
                "spacing" => style.spacing = num(style.spacing),
                "angle" => style.angle = num(style.angle),
                "borderstyle" => style.border_style = value.parse().unwrap_or(style.border_style),
                "outline" => style.outline = num(style.outline),
                "shadow" => style.shadow = num(style.shadow),
                "alignment" => style.alignment = value.parse().unwrap_or(style.alignment),
                "marginl" => style.margin_l = value.parse().unwrap_or(style.margin_l),
                "marginr" => style.margin_r = value.parse().unwrap_or(style.margin_r),
                "marginv" => style.margin_v = value.parse().unwrap_or(style.margin_v),
                "encoding" => style.encoding = value.parse().unwrap_or(style.encoding),
                other => debug!("Ignoring style field {}", other),
            }
        }
        style
    }

    /// `Style:` line body in [`STYLE_FORMAT`] order
    pub fn to_ass_line(&self) -> String {
        format!(
            "Style: {},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.name,
            self.fontname,
            fmt_num(self.fontsize),
            self.primary_color.to_ass(),
            self.secondary_color.to_ass(),
            self.outline_color.to_ass(),
            self.back_color.to_ass(),
            ass_bool(self.bold),
            ass_bool(self.italic),
            ass_bool(self.underline),
            ass_bool(self.strikeout),
            fmt_num(self.scale_x),
            fmt_num(self.scale_y),
            fmt_num(self.spacing),
            fmt_num(self.angle),
            self.border_style,
            fmt_num(self.outline),
            fmt_num(self.shadow),
            self.alignment,
            self.margin_l,
            self.margin_r,
            self.margin_v,
            self.encoding
        )
    }
}

/// Named style presets stored as JSON files in one directory
pub struct StyleManager {
    dir: PathBuf,
}

impl StyleManager {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Presets under the user config directory
    pub fn default_location() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| KaocheError::Config("No user config directory".to_string()))?;
        Self::new(base.join("kaoche").join("styles"))
    }

    fn preset_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(KaocheError::InvalidArgument(format!("Invalid preset name '{}'", name)));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }

    pub fn save(&self, name: &str, style: &AssStyle) -> Result<()> {
        let path = self.preset_path(name)?;
        std::fs::write(&path, serde_json::to_string_pretty(style)?)?;
        info!("Saved style preset '{}' to {}", name, path.display());
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<AssStyle> {
        let path = self.preset_path(name)?;
        if !path.exists() {
            return Err(KaocheError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.preset_path(name)?;
        if path.exists() {
            std::fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn test_color_round_trip_forms() {
        let color = Color { r: 0x12, g: 0x34, b: 0x56, a: 0x80 };
        assert_eq!(color.to_ass(), "&H80563412");
        assert_eq!(Color::from_ass("&H80563412"), Some(color));
        assert_eq!(Color::rgb(255, 0, 0).to_ass_inline(), "&H0000FF&");
        assert_eq!(Color::from_ass("255"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::from_hex("#00FF00"), Some(Color::rgb(0, 255, 0)));
    }

    #[test]
    fn test_style_from_fields() {
        let format: Vec<String> = ["Name", "Fontname", "Fontsize", "Bold", "Alignment"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let style = AssStyle::from_fields(&format, &["Top", "Noto Sans", "48", "-1", "8"]);
        assert_eq!(style.name, "Top");
        assert_eq!(style.fontsize, 48.0);
        assert!(style.bold);
        assert_eq!(style.alignment, 8);
        assert!(style.to_ass_line().starts_with("Style: Top,Noto Sans,48,&H00FFFFFF"));
    }

    #[test]
    fn test_preset_save_list_load() {
        let dir = TempDir::new().unwrap();
        let manager = StyleManager::new(dir.path()).unwrap();

        let mut style = AssStyle::default();
        style.fontsize = 36.0;
        manager.save("karaoke", &style).unwrap();
        manager.save("plain", &AssStyle::default()).unwrap();

        assert_eq!(manager.list().unwrap(), vec!["karaoke", "plain"]);
        assert_eq!(manager.load("karaoke").unwrap().fontsize, 36.0);
        assert!(manager.delete("plain").unwrap());
        assert!(manager.load("plain").is_err());
        assert!(manager.save("../escape", &style).is_err());
    }
}
