use encoding_rs::{Encoding, GBK};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{KaocheError, Result};

/// Decode raw bytes: BOM first, then UTF-8, then GBK
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    debug!("Input is not valid UTF-8, falling back to GBK");
    let (text, _, had_errors) = GBK.decode(bytes);
    if had_errors {
        warn!("GBK decoding replaced invalid sequences");
    }
    text.into_owned()
}

/// Read a text file regardless of its legacy encoding
pub fn read_text_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(KaocheError::FileNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    Ok(decode_text(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_bom_stripped() {
        let bytes = [0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(decode_text(&bytes), "hi");
    }

    #[test]
    fn test_gbk_fallback() {
        let (encoded, _, _) = GBK.encode("你好");
        assert_eq!(decode_text(&encoded), "你好");
    }

    #[test]
    fn test_missing_file() {
        let err = read_text_file("/definitely/not/here.srt").unwrap_err();
        assert!(matches!(err, KaocheError::FileNotFound(_)));
    }
}
