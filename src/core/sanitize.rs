// src/core/sanitize.rs

/// Collapse all whitespace runs (incl. NBSP and ideographic space) to single
/// spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for ch in s.chars() {
        if ch.is_whitespace() || ch == '\u{00A0}' {
            in_ws = true;
        } else {
            if in_ws && !out.is_empty() {
                out.push(' ');
            }
            in_ws = false;
            out.push(ch);
        }
    }
    out
}

/// Parse a count cell like "23,510", "8,500人" or "23510".
/// Returns None for dashes, placeholders and anything non-numeric;
/// a bad cell must not sink the whole record.
pub fn parse_count(s: &str) -> Option<u32> {
    let cleaned: String = s
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Extract the contents of the first full-width bracket pair ［…］.
pub fn fullwidth_bracketed(s: &str) -> Option<&str> {
    let start = s.find('［')?;
    let rest = &s[start + '［'.len_utf8()..];
    let end = rest.find('］')?;
    Some(&rest[..end])
}

/// Strip a trailing site suffix like " - <wiki name> | Gamerch" from a page
/// title. Cuts at the earliest "|" or " - " separator.
pub fn strip_title_suffix(s: &str) -> &str {
    let cut = [s.find(" | "), s.find(" - ")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(s.len());
    s[..cut].trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_ws_collapses_runs() {
        assert_eq!(normalize_ws("  a \t b\n\nc "), "a b c");
        assert_eq!(normalize_ws("a\u{00A0}\u{00A0}b"), "a b");
        assert_eq!(normalize_ws(""), "");
    }

    #[test]
    fn parse_count_variants() {
        assert_eq!(parse_count("23,510"), Some(23510));
        assert_eq!(parse_count("8,500人"), Some(8500));
        assert_eq!(parse_count(" 42 "), Some(42));
        assert_eq!(parse_count("-"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("n/a"), None);
    }

    #[test]
    fn fullwidth_brackets() {
        assert_eq!(fullwidth_bracketed("☆5［裏表アンビバレンス］HiMERU"), Some("裏表アンビバレンス"));
        assert_eq!(fullwidth_bracketed("no brackets"), None);
        assert_eq!(fullwidth_bracketed("open only ［x"), None);
    }

    #[test]
    fn title_suffix_stripped() {
        assert_eq!(strip_title_suffix("［名前］キャラ - wiki | Gamerch"), "［名前］キャラ");
        assert_eq!(strip_title_suffix("plain"), "plain");
    }
}
