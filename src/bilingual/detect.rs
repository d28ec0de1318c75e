use std::path::Path;
use tracing::{debug, error, info};

use super::BilingualFormat;
use super::language::{Lang, block_language};
use crate::subtitle::{extension_of, read_text_file};

const DELIMITERS: [&str; 3] = ["|", "\t", "|||"];
const TSV_HEADER_CELLS: [&str; 7] = ["en", "cn", "zh", "source", "target", "english", "chinese"];

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A tab-separated first line with a header word in any cell, e.g. `Source Text\tTarget Text`
fn looks_like_tsv_header(line: &str) -> bool {
    line.contains('\t')
        && line.split('\t').any(|cell| {
            cell.to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| TSV_HEADER_CELLS.contains(&word))
        })
}

fn looks_delimited(lines: &[String]) -> bool {
    DELIMITERS.iter().any(|delimiter| {
        lines[0].contains(delimiter) && {
            let count = lines.iter().filter(|l| l.contains(delimiter)).count();
            count as f64 >= lines.len() as f64 * 0.8
        }
    })
}

/// Even lines mostly Latin, odd lines mostly CJK
fn looks_alternating(lines: &[String]) -> bool {
    let checkable = (lines.len() / 2 * 2).min(20);
    let mut even_latin = 0usize;
    let mut odd_cjk = 0usize;

    for (i, line) in lines.iter().take(checkable).enumerate() {
        let latin = line.chars().filter(|c| c.is_ascii_alphabetic()).count();
        let cjk = line.chars().filter(|c| is_cjk(*c)).count();
        let total = line.chars().filter(|c| is_word_char(*c)).count();
        if total < 5 {
            continue;
        }

        if i % 2 == 0 {
            if latin > cjk && latin as f64 / total as f64 > 0.6 {
                even_latin += 1;
            }
        } else if cjk > latin && cjk as f64 / total as f64 > 0.6 {
            odd_cjk += 1;
        }
    }

    let half = (checkable / 2) as f64;
    let alternating = even_latin as f64 >= half * 0.6 && odd_cjk as f64 >= half * 0.6;
    if alternating {
        info!(
            "Detected alternating format: {}/{} latin lines, {}/{} CJK lines",
            even_latin, half, odd_cjk, half
        );
    }
    alternating
}

/// First 40% and last 40% are written in different languages
fn looks_block(lines: &[String]) -> bool {
    if lines.len() < 20 {
        return false;
    }
    let first_end = (lines.len() as f64 * 0.4) as usize;
    let second_start = (lines.len() as f64 * 0.6) as usize;

    let first = block_language(&lines[..first_end]);
    let second = block_language(&lines[second_start..]);
    let block = first != Lang::Mixed && second != Lang::Mixed && first != second;
    if block {
        info!("Detected block format: first part={}, second part={}", first, second);
    }
    block
}

/// Classify the layout of already-trimmed, non-empty lines
pub fn detect_format_from_lines(lines: &[String]) -> BilingualFormat {
    if lines.len() < 4 {
        return BilingualFormat::Unknown;
    }
    if looks_like_tsv_header(&lines[0]) {
        return BilingualFormat::Tsv;
    }
    if looks_delimited(lines) {
        return BilingualFormat::Delimiter;
    }
    if looks_alternating(lines) {
        return BilingualFormat::Alternating;
    }
    if looks_block(lines) {
        return BilingualFormat::Block;
    }
    BilingualFormat::Unknown
}

pub(crate) fn non_empty_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Detect how a file interleaves its two languages
///
/// Regular subtitle files are never treated as bilingual.
pub fn detect_bilingual_format<P: AsRef<Path>>(path: P) -> BilingualFormat {
    let path = path.as_ref();
    match extension_of(path).as_str() {
        "srt" | "ass" | "ssa" | "vtt" => {
            debug!("Skipping bilingual detection for subtitle file {}", path.display());
            return BilingualFormat::Unknown;
        }
        "xlsx" | "xls" => return BilingualFormat::Xlsx,
        "csv" => return BilingualFormat::Csv,
        _ => {}
    }

    match read_text_file(path) {
        Ok(content) => detect_format_from_lines(&non_empty_lines(&content)),
        Err(e) => {
            error!("Failed to detect bilingual format of {}: {}", path.display(), e);
            BilingualFormat::Unknown
        }
    }
}

pub fn is_bilingual_file<P: AsRef<Path>>(path: P) -> bool {
    detect_bilingual_format(path) != BilingualFormat::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_too_short() {
        assert_eq!(detect_format_from_lines(&lines(&["a", "b", "c"])), BilingualFormat::Unknown);
    }

    #[test]
    fn test_tsv_and_delimiter() {
        let tsv = lines(&["EN\tCN", "Hello\t你好", "Bye\t再见", "Yes\t是"]);
        assert_eq!(detect_format_from_lines(&tsv), BilingualFormat::Tsv);

        let piped = lines(&["Hello | 你好", "Bye | 再见", "Yes | 是", "No | 不"]);
        assert_eq!(detect_format_from_lines(&piped), BilingualFormat::Delimiter);
    }

    #[test]
    fn test_tsv_header_with_multi_word_cells() {
        let tsv = lines(&["Source Text\tTarget Text", "Hello\t你好", "Bye\t再见", "Yes\t是"]);
        assert_eq!(detect_format_from_lines(&tsv), BilingualFormat::Tsv);

        // "Then" contains "en" but is not a header word
        let body = lines(&["Then\t然后", "Hello\t你好", "Bye\t再见", "Yes\t是"]);
        assert_eq!(detect_format_from_lines(&body), BilingualFormat::Delimiter);
    }

    #[test]
    fn test_alternating() {
        let alt = lines(&[
            "Good morning everyone",
            "大家早上好啊",
            "Where are you going",
            "你要去哪里呢",
            "See you tomorrow then",
            "那明天见吧朋友",
        ]);
        assert_eq!(detect_format_from_lines(&alt), BilingualFormat::Alternating);
    }

    #[test]
    fn test_block() {
        let mut block: Vec<String> = (0..10).map(|i| format!("This is English line number {}", i)).collect();
        block.extend((0..10).map(|_| "这是一行中文字幕内容".to_string()));
        assert_eq!(detect_format_from_lines(&block), BilingualFormat::Block);
    }

    #[test]
    fn test_extension_shortcuts() {
        let dir = TempDir::new().unwrap();
        let srt = dir.path().join("a.srt");
        std::fs::write(&srt, "Hello | 你好\nBye | 再见\nYes | 是\nNo | 不\n").unwrap();
        assert_eq!(detect_bilingual_format(&srt), BilingualFormat::Unknown);
        assert_eq!(detect_bilingual_format(dir.path().join("b.xlsx")), BilingualFormat::Xlsx);

        let txt = dir.path().join("c.txt");
        std::fs::write(&txt, "Hello | 你好\nBye | 再见\nYes | 是\nNo | 不\n").unwrap();
        assert!(is_bilingual_file(&txt));
    }
}
