// Subtitle alignment
//
// Two subtitle files of the same video rarely share cue boundaries. Alignment
// builds project rows from them:
// - timeline: pairs cues by time containment or overlap, anchored on one side
// - semantic: asks an LLM to pair lines by meaning, used for untimed text and
//   for filling rows the timeline pass left half empty
// - runner: background job wrapping both passes with progress events

pub mod runner;
pub mod semantic;
pub mod timeline;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use runner::{AlignmentEvent, AlignmentHandle, AlignmentJob};
pub use semantic::{align_with_llm, fill_alignment_gaps};
pub use timeline::{align_by_line_count, align_subtitles};

use crate::error::KaocheError;

/// Which side drives row creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMode {
    #[default]
    Source,
    Target,
    Auto,
}

impl AnchorMode {
    /// Concrete anchor side; auto picks the source
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto => Self::Source,
            other => other,
        }
    }
}

impl fmt::Display for AnchorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Source => "source",
            Self::Target => "target",
            Self::Auto => "auto",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for AnchorMode {
    type Err = KaocheError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "target" => Ok(Self::Target),
            "auto" => Ok(Self::Auto),
            _ => Err(KaocheError::InvalidArgument(format!(
                "Invalid anchor mode '{}'. Must be 'source', 'target', or 'auto'",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_mode_parse() {
        assert_eq!("Target".parse::<AnchorMode>().unwrap(), AnchorMode::Target);
        assert_eq!("auto".parse::<AnchorMode>().unwrap().resolve(), AnchorMode::Source);
        assert!("middle".parse::<AnchorMode>().is_err());
        assert_eq!(AnchorMode::default().to_string(), "source");
    }
}
