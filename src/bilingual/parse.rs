use calamine::{Reader, open_workbook_auto};
use std::path::Path;
use tracing::{info, warn};

use super::detect::{detect_bilingual_format, non_empty_lines};
use super::language::{Lang, detect_language, smart_language_pair};
use super::{BilingualFormat, BilingualPair, LanguageStats};
use crate::error::{KaocheError, Result};
use crate::llm::{LlmClient, LlmRequest, parse_json_from_response};
use crate::subtitle::read_text_file;

const BLOCK_ALIGN_SYSTEM_PROMPT: &str = r#"You are an expert at aligning bilingual text.

Task: given a list of English sentences and a list of Chinese translations, pair them correctly.

Rules:
1. Keep the original order of both lists.
2. Several sentences may map to one translation; merge them into one entry.
3. If an English sentence has no translation, use "" for "zh".
4. If a Chinese sentence has no source, use "" for "en".

Output a JSON array whose elements look like:
{"en": "English sentence(s)", "zh": "matching Chinese translation"}

Return valid JSON only, without markdown code fences."#;

const HEADER_KEYWORDS: [&str; 10] = ["source", "target", "en", "zh", "english", "chinese", "原文", "译文", "英文", "中文"];
const SOURCE_KEYWORDS: [&str; 5] = ["source", "en", "english", "原文", "英文"];
const TARGET_KEYWORDS: [&str; 5] = ["target", "zh", "chinese", "译文", "中文"];

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Skip detection and use this layout
    pub format_hint: Option<BilingualFormat>,
    /// Reorder each pair as (source, target) by language
    pub smart_detect: bool,
    /// Ask the LLM to pair block files with unequal line counts
    pub use_llm_alignment: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            format_hint: None,
            smart_detect: true,
            use_llm_alignment: false,
        }
    }
}

fn is_header_cell(cell: &str, keywords: &[&str]) -> bool {
    let cell = cell.trim().to_lowercase();
    keywords.iter().any(|kw| {
        if kw.is_ascii() {
            cell == *kw || cell.split(|c: char| !c.is_alphanumeric()).any(|word| word == *kw)
        } else {
            cell.contains(kw)
        }
    })
}

/// One pair per line, split on '|' (or tab when the first line has no pipe)
pub fn parse_delimiter(lines: &[String]) -> Vec<BilingualPair> {
    let Some(first) = lines.first() else {
        return Vec::new();
    };
    let delimiter = if first.contains('|') { "|" } else { "\t" };

    let first_parts: Vec<&str> = first.trim().split(delimiter).collect();
    let skip_header = first_parts.len() >= 2 && is_header_cell(first_parts[0], &SOURCE_KEYWORDS);

    let pairs: Vec<BilingualPair> = lines
        .iter()
        .skip(usize::from(skip_header))
        .filter_map(|line| {
            let parts: Vec<&str> = line.trim().split(delimiter).collect();
            if parts.len() < 2 {
                return None;
            }
            let (source, target) = (parts[0].trim(), parts[1].trim());
            (!source.is_empty() || !target.is_empty()).then(|| BilingualPair::new(source, target))
        })
        .collect();

    info!("Parsed delimiter format: {} pairs (delimiter '{}')", pairs.len(), delimiter.escape_default());
    pairs
}

/// Consecutive non-empty lines form a pair
pub fn parse_alternating(lines: &[String]) -> Vec<BilingualPair> {
    let pairs: Vec<BilingualPair> = lines
        .chunks_exact(2)
        .map(|chunk| BilingualPair::new(chunk[0].as_str(), chunk[1].as_str()))
        .collect();
    if lines.len() % 2 == 1 {
        warn!("Alternating file has an odd number of lines; last line dropped");
    }
    pairs
}

fn zip_truncated(en_lines: &[String], zh_lines: &[String]) -> Vec<BilingualPair> {
    en_lines
        .iter()
        .zip(zh_lines.iter())
        .map(|(en, zh)| BilingualPair::new(en.as_str(), zh.as_str()))
        .collect()
}

/// Split a block file into its English and Chinese line runs
pub fn split_blocks(lines: &[String]) -> (Vec<String>, Vec<String>) {
    let langs: Vec<Lang> = lines.iter().map(|l| detect_language(l)).collect();
    let mut en_lines = Vec::new();
    let mut zh_lines = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let mut lang = langs[i];
        if lang == Lang::Mixed {
            if i > 0 {
                lang = langs[i - 1];
            } else if i + 1 < langs.len() {
                lang = langs[i + 1];
            }
        }
        match lang {
            Lang::En => en_lines.push(line.clone()),
            Lang::Zh => zh_lines.push(line.clone()),
            other => warn!("Ignoring {} line in block file: {}", other, line),
        }
    }

    (en_lines, zh_lines)
}

/// Pair unequal English and Chinese runs through the LLM
pub async fn align_blocks_with_llm(
    client: &dyn LlmClient,
    en_lines: &[String],
    zh_lines: &[String],
) -> Vec<BilingualPair> {
    let numbered = |lines: &[String]| {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| format!("{}. {}", i + 1, l))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let user = format!(
        "English sentences ({} lines):\n{}\n\nChinese sentences ({} lines):\n{}\n\nPair them correctly and output a JSON array.",
        en_lines.len(),
        numbered(en_lines),
        zh_lines.len(),
        numbered(zh_lines)
    );
    let request = LlmRequest::new(BLOCK_ALIGN_SYSTEM_PROMPT, user).json().temperature(0.3);

    let parsed = match client.generate(&request).await {
        Ok(response) => parse_json_from_response(&response.text),
        Err(e) => {
            warn!("LLM block alignment failed: {}", e);
            None
        }
    };

    match parsed.as_ref().and_then(|v| v.as_array()) {
        Some(items) => {
            let pairs: Vec<BilingualPair> = items
                .iter()
                .map(|item| {
                    BilingualPair::new(
                        item.get("en").and_then(|v| v.as_str()).unwrap_or_default(),
                        item.get("zh").and_then(|v| v.as_str()).unwrap_or_default(),
                    )
                })
                .collect();
            info!("LLM block alignment produced {} pairs", pairs.len());
            pairs
        }
        None => {
            warn!("Falling back to truncated pairing");
            zip_truncated(en_lines, zh_lines)
        }
    }
}

/// All source lines first, then all translations
pub async fn parse_block(lines: &[String], llm: Option<&dyn LlmClient>) -> Vec<BilingualPair> {
    if lines.len() < 4 {
        warn!("Too few lines for block format");
        return Vec::new();
    }

    let (en_lines, zh_lines) = split_blocks(lines);
    if en_lines.is_empty() || zh_lines.is_empty() {
        warn!(
            "No usable language blocks: {} English lines, {} Chinese lines",
            en_lines.len(),
            zh_lines.len()
        );
        return Vec::new();
    }

    if en_lines.len() == zh_lines.len() {
        return zip_truncated(&en_lines, &zh_lines);
    }

    warn!("Unequal block sizes: {} English vs {} Chinese", en_lines.len(), zh_lines.len());
    match llm {
        Some(client) => align_blocks_with_llm(client, &en_lines, &zh_lines).await,
        None => zip_truncated(&en_lines, &zh_lines),
    }
}

/// Rows of a two-column table; a header row may name and swap the columns
fn pairs_from_rows(rows: &[Vec<String>]) -> Vec<BilingualPair> {
    let (mut source_col, mut target_col) = (0usize, 1usize);
    let mut skip = 0usize;
    if let Some(first) = rows.first().filter(|r| r.len() >= 2) {
        if is_header_cell(&first[0], &HEADER_KEYWORDS) || is_header_cell(&first[1], &HEADER_KEYWORDS) {
            skip = 1;
            if is_header_cell(&first[0], &TARGET_KEYWORDS) && is_header_cell(&first[1], &SOURCE_KEYWORDS) {
                info!("Header puts the translation first; swapping columns");
                (source_col, target_col) = (1, 0);
            }
        }
    }

    rows.iter()
        .skip(skip)
        .filter(|r| r.len() >= 2)
        .filter(|r| !r[source_col].is_empty() || !r[target_col].is_empty())
        .map(|r| BilingualPair::new(r[source_col].as_str(), r[target_col].as_str()))
        .collect()
}

/// Two-column CSV
pub fn parse_csv(content: &str) -> Result<Vec<BilingualPair>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|f| f.trim().to_string()).collect::<Vec<_>>());
    }
    Ok(pairs_from_rows(&rows))
}

/// First sheet of an Excel workbook, read like a two-column CSV
pub fn parse_xlsx<P: AsRef<Path>>(path: P) -> Result<Vec<BilingualPair>> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| KaocheError::Parse(format!("{} has no worksheets", path.display())))??;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect())
        .collect();
    if rows.is_empty() {
        warn!("Workbook {} is empty", path.display());
    }

    let pairs = pairs_from_rows(&rows);
    info!("Parsed {} pairs from workbook {}", pairs.len(), path.display());
    Ok(pairs)
}

/// Parse a bilingual file into (source, target) pairs
pub async fn parse_bilingual_file<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
    llm: Option<&dyn LlmClient>,
) -> Result<Vec<BilingualPair>> {
    let path = path.as_ref();
    let format = match options.format_hint {
        Some(format) => format,
        None => {
            let detected = detect_bilingual_format(path);
            info!("Detected bilingual format: {}", detected);
            detected
        }
    };

    let raw_pairs = if format == BilingualFormat::Xlsx {
        parse_xlsx(path)?
    } else {
        let content = read_text_file(path)?;
        let lines = non_empty_lines(&content);
        let llm = llm.filter(|_| options.use_llm_alignment);

        match format {
            BilingualFormat::Alternating => parse_alternating(&lines),
            BilingualFormat::Block => parse_block(&lines, llm).await,
            BilingualFormat::Delimiter | BilingualFormat::Tsv => parse_delimiter(&lines),
            BilingualFormat::Csv => parse_csv(&content)?,
            BilingualFormat::Unknown | BilingualFormat::Xlsx => {
                warn!("Unknown bilingual format, trying delimiter then alternating");
                let pairs = parse_delimiter(&lines);
                if pairs.is_empty() { parse_alternating(&lines) } else { pairs }
            }
        }
    };

    if !options.smart_detect {
        return Ok(raw_pairs);
    }

    let pairs: Vec<BilingualPair> = raw_pairs
        .into_iter()
        .map(|p| {
            let (source, target) = smart_language_pair(&p.source, &p.target);
            BilingualPair { source, target }
        })
        .collect();
    info!("Smart language detection ordered {} pairs", pairs.len());
    Ok(pairs)
}

pub fn get_language_stats(pairs: &[BilingualPair]) -> LanguageStats {
    let mut stats = LanguageStats {
        total: pairs.len(),
        ..LanguageStats::default()
    };

    for pair in pairs {
        match detect_language(&pair.source) {
            Lang::En => stats.source_en += 1,
            Lang::Zh => stats.source_zh += 1,
            _ => stats.source_mixed += 1,
        }
        match detect_language(&pair.target) {
            Lang::En => stats.target_en += 1,
            Lang::Zh => stats.target_zh += 1,
            _ => stats.target_mixed += 1,
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlmClient, Usage};
    use assert_fs::TempDir;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn reply(text: &str) -> LlmResponse {
        LlmResponse {
            text: text.to_string(),
            model: "mock".to_string(),
            usage: Usage::default(),
        }
    }

    #[test]
    fn test_parse_delimiter_with_header() {
        let pairs = parse_delimiter(&lines(&["English | Chinese", "Hello | 你好", " | 只有译文", "bad line"]));
        assert_eq!(pairs, vec![BilingualPair::new("Hello", "你好"), BilingualPair::new("", "只有译文")]);
    }

    #[test]
    fn test_parse_delimiter_keeps_words_containing_en() {
        let pairs = parse_delimiter(&lines(&["Then | 然后", "When | 何时"]));
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_parse_alternating() {
        let pairs = parse_alternating(&lines(&["Hi", "你好", "Bye", "再见", "orphan"]));
        assert_eq!(pairs, vec![BilingualPair::new("Hi", "你好"), BilingualPair::new("Bye", "再见")]);
    }

    #[test]
    fn test_split_blocks_inherits_mixed() {
        let (en, zh) = split_blocks(&lines(&["Hello there", "123", "你好", "...", "再见"]));
        assert_eq!(en, vec!["Hello there", "123"]);
        assert_eq!(zh, vec!["你好", "...", "再见"]);
    }

    #[tokio::test]
    async fn test_parse_block_equal_counts() {
        let pairs = parse_block(&lines(&["One", "Two", "一", "二"]), None).await;
        assert_eq!(pairs, vec![BilingualPair::new("One", "一"), BilingualPair::new("Two", "二")]);
    }

    #[tokio::test]
    async fn test_parse_block_uses_llm_for_unequal_counts() {
        let mut mock = MockLlmClient::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(reply(r#"[{"en": "One. Two.", "zh": "一二"}, {"en": "Three", "zh": "三"}]"#)));

        let pairs = parse_block(&lines(&["One.", "Two.", "Three", "一二", "三"]), Some(&mock)).await;
        assert_eq!(pairs, vec![BilingualPair::new("One. Two.", "一二"), BilingualPair::new("Three", "三")]);
    }

    #[tokio::test]
    async fn test_llm_block_alignment_falls_back() {
        let mut mock = MockLlmClient::new();
        mock.expect_generate().returning(|_| Ok(reply("sorry, cannot help")));

        let pairs = align_blocks_with_llm(&mock, &lines(&["A", "B"]), &lines(&["甲"])).await;
        assert_eq!(pairs, vec![BilingualPair::new("A", "甲")]);
    }

    #[test]
    fn test_parse_csv_swapped_header() {
        let pairs = parse_csv("\u{feff}译文,原文\n你好,Hello\n\"再见, 朋友\",Bye\n,\n").unwrap();
        assert_eq!(pairs, vec![BilingualPair::new("Hello", "你好"), BilingualPair::new("Bye", "再见, 朋友")]);
    }

    #[tokio::test]
    async fn test_parse_bilingual_file_orders_pairs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pairs.txt");
        std::fs::write(&path, "你好 | Hello\n再见 | Goodbye\n是 | Yes\n不 | No\n").unwrap();

        let pairs = parse_bilingual_file(&path, &ParseOptions::default(), None).await.unwrap();
        assert_eq!(pairs[0], BilingualPair::new("Hello", "你好"));
        assert_eq!(pairs.len(), 4);

        let raw_options = ParseOptions { smart_detect: false, ..ParseOptions::default() };
        let raw = parse_bilingual_file(&path, &raw_options, None).await.unwrap();
        assert_eq!(raw[0], BilingualPair::new("你好", "Hello"));
    }

    fn write_workbook(path: &Path, rows: &[[&str; 2]]) {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if !cell.is_empty() {
                    sheet.write_string(r as u32, c as u16, *cell).unwrap();
                }
            }
        }
        workbook.save(path).unwrap();
    }

    #[tokio::test]
    async fn test_parse_xlsx_swapped_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.xlsx");
        write_workbook(&path, &[["中文", "English"], ["你好", "Hello"], ["", ""], ["再见", " Bye "]]);

        let pairs = parse_xlsx(&path).unwrap();
        assert_eq!(pairs, vec![BilingualPair::new("Hello", "你好"), BilingualPair::new("Bye", "再见")]);

        let detected = parse_bilingual_file(&path, &ParseOptions::default(), None).await.unwrap();
        assert_eq!(detected, pairs);
    }

    #[test]
    fn test_parse_xlsx_without_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.xlsx");
        write_workbook(&path, &[["Good morning", "早上好"], ["Thanks", "谢谢"]]);

        let pairs = parse_xlsx(&path).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], BilingualPair::new("Good morning", "早上好"));
    }

    #[test]
    fn test_parse_xlsx_rejects_non_workbook() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.xlsx");
        std::fs::write(&path, "not a zip").unwrap();
        assert!(parse_xlsx(&path).is_err());
    }

    #[test]
    fn test_language_stats() {
        let stats = get_language_stats(&[BilingualPair::new("Hello", "你好"), BilingualPair::new("...", "Bye")]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.source_en, 1);
        assert_eq!(stats.source_mixed, 1);
        assert_eq!(stats.target_zh, 1);
        assert_eq!(stats.target_en, 1);
    }
}
