use once_cell::sync::Lazy;
use regex::Regex;

use crate::subtitle::Color;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("valid override tag regex"));

const ESCAPES: [&str; 3] = ["\\N", "\\n", "\\h"];

enum Piece<'a> {
    Raw(&'a str),
    Glyph(char),
}

fn push_plain<'a>(plain: &'a str, out: &mut Vec<Piece<'a>>) {
    let mut rest = plain;
    while let Some(c) = rest.chars().next() {
        if let Some(esc) = ESCAPES.iter().find(|e| rest.starts_with(**e)) {
            out.push(Piece::Raw(&rest[..esc.len()]));
            rest = &rest[esc.len()..];
        } else if c == '\n' {
            out.push(Piece::Raw(&rest[..1]));
            rest = &rest[1..];
        } else {
            out.push(Piece::Glyph(c));
            rest = &rest[c.len_utf8()..];
        }
    }
}

/// Override tags, line breaks and their escapes pass through; everything else is a glyph
fn pieces(text: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in TAG.find_iter(text) {
        push_plain(&text[last..m.start()], &mut out);
        out.push(Piece::Raw(m.as_str()));
        last = m.end();
    }
    push_plain(&text[last..], &mut out);
    out
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t) as u8
}

/// Colour each visible character of an ASS line along a `start` to `end` gradient
pub fn apply_gradient(text: &str, start: Color, end: Color) -> String {
    let pieces = pieces(text);
    let visible = pieces.iter().filter(|p| matches!(p, Piece::Glyph(_))).count();
    if visible <= 1 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() * 12);
    let mut index = 0usize;
    for piece in pieces {
        match piece {
            Piece::Raw(raw) => out.push_str(raw),
            Piece::Glyph(c) => {
                let t = index as f64 / (visible - 1) as f64;
                let color = Color::rgb(lerp(start.r, end.r, t), lerp(start.g, end.g, t), lerp(start.b, end.b, t));
                out.push_str(&format!("{{\\c{}}}{}", color.to_ass_inline(), c));
                index += 1;
            }
        }
    }
    out
}
