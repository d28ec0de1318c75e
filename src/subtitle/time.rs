/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm`, `MM:SS.mmm` or ASS `H:MM:SS.cc` into milliseconds
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    let parts: Vec<&str> = value.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.trim().parse::<i64>().ok()?, m.trim().parse::<i64>().ok()?, *s),
        [m, s] => (0, m.trim().parse::<i64>().ok()?, *s),
        _ => return None,
    };

    let (whole, fraction) = match seconds.find([',', '.']) {
        Some(pos) => (&seconds[..pos], &seconds[pos + 1..]),
        None => (seconds, ""),
    };
    let secs = whole.trim().parse::<i64>().ok()?;

    let fraction = fraction.trim();
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut digits: String = fraction.chars().take(3).collect();
    while digits.len() < 3 {
        digits.push('0');
    }
    let millis = digits.parse::<i64>().ok()?;

    if minutes >= 60 || secs >= 60 || hours < 0 || minutes < 0 || secs < 0 {
        return None;
    }

    Some(((hours * 60 + minutes) * 60 + secs) * 1000 + millis)
}

fn split_ms(ms: i64) -> (i64, i64, i64, i64) {
    let ms = ms.max(0);
    (ms / 3_600_000, (ms % 3_600_000) / 60_000, (ms % 60_000) / 1_000, ms % 1_000)
}

/// Format milliseconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(ms: i64) -> String {
    let (h, m, s, millis) = split_ms(ms);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, millis)
}

/// Format milliseconds to WebVTT time format (HH:MM:SS.mmm)
pub fn format_vtt_time(ms: i64) -> String {
    let (h, m, s, millis) = split_ms(ms);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, millis)
}

/// Format milliseconds to ASS time format (H:MM:SS.cc)
pub fn format_ass_time(ms: i64) -> String {
    let total_cs = (ms.max(0) + 5) / 10;
    let h = total_cs / 360_000;
    let m = (total_cs % 360_000) / 6_000;
    let s = (total_cs % 6_000) / 100;
    let cs = total_cs % 100;
    format!("{}:{:02}:{:02}.{:02}", h, m, s, cs)
}

pub fn secs_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

pub fn ms_to_secs(ms: i64) -> f64 {
    ms as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0), "00:00:00,000");
        assert_eq!(format_srt_time(65_123), "00:01:05,123");
        assert_eq!(format_srt_time(3_661_500), "01:01:01,500");
    }

    #[test]
    fn test_format_ass_time() {
        assert_eq!(format_ass_time(1_500), "0:00:01.50");
        assert_eq!(format_ass_time(3_661_994), "1:01:01.99");
        assert_eq!(format_ass_time(59_996), "0:01:00.00");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(parse_timestamp("00:01:05,123"), Some(65_123));
        assert_eq!(parse_timestamp("00:01:05.123"), Some(65_123));
        assert_eq!(parse_timestamp("01:05.5"), Some(65_500));
        assert_eq!(parse_timestamp("0:00:01.50"), Some(1_500));
        assert_eq!(parse_timestamp("garbage"), None);
        assert_eq!(parse_timestamp("00:99:00,000"), None);
    }
}
