use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Language guess for a single line of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Zh,
    Ja,
    Ko,
    Ar,
    Ru,
    De,
    Fr,
    En,
    Greek,
    Thai,
    Mixed,
}

impl Lang {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::Ja => "ja",
            Self::Ko => "ko",
            Self::Ar => "ar",
            Self::Ru => "ru",
            Self::De => "de",
            Self::Fr => "fr",
            Self::En => "en",
            Self::Greek => "greek",
            Self::Thai => "thai",
            Self::Mixed => "mixed",
        }
    }

    /// Languages usually found on the source side of a Chinese translation
    pub fn is_typical_source(&self) -> bool {
        matches!(self, Self::En | Self::Ja | Self::Fr | Self::De | Self::Ru | Self::Ko)
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

const JA_KANJI_ONLY: &[char] = &[
    '込', '枠', '峠', '畑', '駅', '雫', '喰', '腺', '栃', '匂', '塀', '搾', '吊', '噛', '揃', '蹴',
];
const FRENCH_MARKERS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "du", "de", "et", "est", "être", "je", "vous", "pour",
    "dans", "qui", "que", "en", "par", "ce", "pas", "sur", "bonjour",
];
const GERMAN_MARKERS: &[&str] = &[
    "der", "die", "das", "den", "dem", "des", "und", "ist", "sind", "ich", "sie", "nicht", "mit",
    "zu", "für", "auf", "ein", "eine", "guten", "tag", "danke", "ja", "nein",
];
const ENGLISH_MARKERS: &[&str] = &[
    "the", "a", "an", "and", "is", "are", "in", "of", "to", "it", "you", "that", "for", "with",
    "on", "at", "by", "this", "have", "from", "hello", "thank",
];

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));

#[derive(Default)]
struct ScriptCounts {
    cjk: usize,
    kana: usize,
    hangul: usize,
    arabic: usize,
    cyrillic: usize,
    greek: usize,
    thai: usize,
    latin: usize,
}

impl ScriptCounts {
    fn of(text: &str) -> Self {
        let mut counts = Self::default();
        for c in text.chars() {
            match c as u32 {
                0x4E00..=0x9FFF | 0x3400..=0x4DBF => counts.cjk += 1,
                0x3040..=0x30FF => counts.kana += 1,
                0xAC00..=0xD7AF | 0x1100..=0x11FF => counts.hangul += 1,
                0x0600..=0x06FF | 0x0750..=0x077F => counts.arabic += 1,
                0x0400..=0x04FF => counts.cyrillic += 1,
                0x0370..=0x03FF => counts.greek += 1,
                0x0E00..=0x0E7F => counts.thai += 1,
                0x41..=0x5A | 0x61..=0x7A | 0xC0..=0xFF | 0x100..=0x17F => counts.latin += 1,
                _ => {}
            }
        }
        counts
    }

    fn total(&self) -> usize {
        self.cjk + self.kana + self.hangul + self.arabic + self.cyrillic + self.greek + self.thai + self.latin
    }
}

fn latin_language(text: &str) -> Lang {
    let lower = text.to_lowercase();
    if lower.chars().any(|c| "ßäöü".contains(c)) {
        return Lang::De;
    }
    if lower.chars().any(|c| "éàèùâêîôûëïç".contains(c)) {
        return Lang::Fr;
    }

    let words: HashSet<&str> = WORD.find_iter(&lower).map(|m| m.as_str()).collect();
    let score = |markers: &[&str]| words.iter().filter(|w| markers.contains(*w)).count();
    let fr = score(FRENCH_MARKERS);
    let de = score(GERMAN_MARKERS);
    let en = score(ENGLISH_MARKERS);

    if fr > de && fr > en {
        Lang::Fr
    } else if de > fr && de > en {
        Lang::De
    } else {
        Lang::En
    }
}

/// Guess the language of a line from its script mix
pub fn detect_language(text: &str) -> Lang {
    if text.trim().is_empty() {
        return Lang::Mixed;
    }

    let counts = ScriptCounts::of(text);
    if counts.total() == 0 {
        return Lang::Mixed;
    }

    if counts.kana >= 1 {
        Lang::Ja
    } else if counts.hangul >= 1 {
        Lang::Ko
    } else if counts.arabic >= 1 {
        Lang::Ar
    } else if counts.cyrillic >= 2 {
        Lang::Ru
    } else if counts.cjk >= 1 {
        if text.chars().any(|c| JA_KANJI_ONLY.contains(&c)) {
            Lang::Ja
        } else {
            // Traditional text without kokuji also lands on zh
            Lang::Zh
        }
    } else if counts.latin >= 1 {
        latin_language(text)
    } else if counts.greek >= 1 {
        Lang::Greek
    } else if counts.thai >= 1 {
        Lang::Thai
    } else {
        Lang::Mixed
    }
}

/// Order two texts as (source, target)
pub fn smart_language_pair(text1: &str, text2: &str) -> (String, String) {
    let lang1 = detect_language(text1);
    let lang2 = detect_language(text2);

    if lang1.is_typical_source() && lang2 == Lang::Zh {
        return (text1.to_string(), text2.to_string());
    }
    if lang2.is_typical_source() && lang1 == Lang::Zh {
        return (text2.to_string(), text1.to_string());
    }
    if lang1 == lang2 || lang1 == Lang::Mixed || lang2 == Lang::Mixed {
        return (text1.to_string(), text2.to_string());
    }

    if lang1.code() < lang2.code() {
        (text1.to_string(), text2.to_string())
    } else {
        (text2.to_string(), text1.to_string())
    }
}

/// Language codes making up at least 15% of the first 50 non-empty lines
pub fn detect_source_language<S: AsRef<str>>(texts: &[S]) -> String {
    let mut counts: Vec<(Lang, usize)> = Vec::new();
    let mut total = 0usize;

    for text in texts.iter().map(AsRef::as_ref).filter(|t| !t.trim().is_empty()).take(50) {
        let lang = detect_language(text);
        if lang == Lang::Mixed {
            continue;
        }
        total += 1;
        match counts.iter_mut().find(|(l, _)| *l == lang) {
            Some((_, n)) => *n += 1,
            None => counts.push((lang, 1)),
        }
    }

    if total == 0 {
        return "unknown".to_string();
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let detected: Vec<&str> = counts
        .iter()
        .filter(|(_, n)| *n as f64 / total as f64 >= 0.15)
        .map(|(lang, _)| lang.code())
        .collect();

    if detected.is_empty() {
        "unknown".to_string()
    } else {
        detected.join(", ")
    }
}

/// Share-based block classification used for block-format files: zh, en or mixed
pub fn block_language<S: AsRef<str>>(lines: &[S]) -> Lang {
    let (cjk, latin) = lines.iter().fold((0usize, 0usize), |(cjk, latin), line| {
        let line = line.as_ref();
        (
            cjk + line.chars().filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c)).count(),
            latin + line.chars().filter(|c| c.is_ascii_alphabetic()).count(),
        )
    });

    let total = cjk + latin;
    if total == 0 {
        return Lang::Mixed;
    }
    if cjk as f64 / total as f64 > 0.6 {
        Lang::Zh
    } else if latin as f64 / total as f64 > 0.6 {
        Lang::En
    } else {
        Lang::Mixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_scripts() {
        assert_eq!(detect_language("你好，世界"), Lang::Zh);
        assert_eq!(detect_language("こんにちは"), Lang::Ja);
        assert_eq!(detect_language("駅に行く"), Lang::Ja);
        assert_eq!(detect_language("駅"), Lang::Ja);
        assert_eq!(detect_language("안녕하세요"), Lang::Ko);
        assert_eq!(detect_language("مرحبا"), Lang::Ar);
        assert_eq!(detect_language("Привет"), Lang::Ru);
        assert_eq!(detect_language("Γειά σου"), Lang::Greek);
        assert_eq!(detect_language("สวัสดี"), Lang::Thai);
        assert_eq!(detect_language("   "), Lang::Mixed);
        assert_eq!(detect_language("12345 !!"), Lang::Mixed);
    }

    #[test]
    fn test_detect_latin_languages() {
        assert_eq!(detect_language("Hello, how are you?"), Lang::En);
        assert_eq!(detect_language("Straße"), Lang::De);
        assert_eq!(detect_language("Café crème"), Lang::Fr);
        assert_eq!(detect_language("Je suis dans la maison"), Lang::Fr);
        assert_eq!(detect_language("Ich bin nicht da"), Lang::De);
        assert_eq!(detect_language("Okay"), Lang::En);
    }

    #[test]
    fn test_smart_language_pair() {
        assert_eq!(
            smart_language_pair("你好", "Hello"),
            ("Hello".to_string(), "你好".to_string())
        );
        assert_eq!(
            smart_language_pair("Hello", "你好"),
            ("Hello".to_string(), "你好".to_string())
        );
        assert_eq!(
            smart_language_pair("...", "你好"),
            ("...".to_string(), "你好".to_string())
        );
        // Neither side is Chinese, so codes decide the order
        assert_eq!(
            smart_language_pair("안녕", "مرحبا"),
            ("مرحبا".to_string(), "안녕".to_string())
        );
    }

    #[test]
    fn test_detect_source_language() {
        let mut texts = vec!["Hello there"; 8];
        texts.extend(vec!["こんにちは"; 2]);
        assert_eq!(detect_source_language(&texts), "en, ja");
        assert_eq!(detect_source_language::<&str>(&[]), "unknown");
        assert_eq!(detect_source_language(&["123", "  "]), "unknown");
    }

    #[test]
    fn test_block_language() {
        assert_eq!(block_language(&["你好世界", "再见"]), Lang::Zh);
        assert_eq!(block_language(&["Hello world"]), Lang::En);
        assert_eq!(block_language(&["Hi 你好"]), Lang::Mixed);
    }
}
