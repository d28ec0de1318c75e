// Bilingual file support
//
// A bilingual file carries both languages in one document. Supported layouts:
// - tsv / delimiter: one pair per line, split by tab or '|'
// - alternating: source line followed by its translation
// - block: all source lines first, then all translations
// - csv: two columns with an optional header row
//
// Pairs are normalised to (source, target) with smart_language_pair so a
// file written Chinese-first still yields English sources.

pub mod detect;
pub mod language;
pub mod parse;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use detect::{detect_bilingual_format, is_bilingual_file};
pub use language::{Lang, detect_language, detect_source_language, smart_language_pair};
pub use parse::{ParseOptions, get_language_stats, parse_bilingual_file};

use crate::error::KaocheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BilingualFormat {
    Tsv,
    Delimiter,
    Alternating,
    Block,
    Csv,
    Xlsx,
    Unknown,
}

impl fmt::Display for BilingualFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tsv => "tsv",
            Self::Delimiter => "delimiter",
            Self::Alternating => "alternating",
            Self::Block => "block",
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for BilingualFormat {
    type Err = KaocheError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tsv" => Ok(Self::Tsv),
            "delimiter" => Ok(Self::Delimiter),
            "alternating" => Ok(Self::Alternating),
            "block" => Ok(Self::Block),
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "unknown" | "auto" => Ok(Self::Unknown),
            _ => Err(KaocheError::InvalidArgument(format!(
                "Invalid bilingual format '{}'. Valid formats: tsv, delimiter, alternating, block, csv, auto",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualPair {
    pub source: String,
    pub target: String,
}

impl BilingualPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LanguageStats {
    pub total: usize,
    pub source_en: usize,
    pub source_zh: usize,
    pub source_mixed: usize,
    pub target_en: usize,
    pub target_zh: usize,
    pub target_mixed: usize,
}
