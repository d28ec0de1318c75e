use super::Cue;

/// Every non-empty line becomes an untimed cue
pub fn parse_plain_text(content: &str) -> Vec<Cue> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| Cue::new(0, 0, l))
        .collect()
}

pub fn to_txt(cues: &[Cue]) -> String {
    let mut out = cues
        .iter()
        .map(|c| c.text.trim())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text_skips_blank_lines() {
        let cues = parse_plain_text("  first  \n\n\nsecond\n   \n");
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "first");
        assert_eq!(cues[1].start_ms, 0);
    }
}
