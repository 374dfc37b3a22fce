//! Text cleanup for scraped field values.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static SPACE_BEFORE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.;:!?])").expect("valid punctuation regex"));

/// Longest entity body we try to decode (`&thinsp;` and friends fit easily).
const MAX_ENTITY_LEN: usize = 10;

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a single-line value such as a title or location.
pub fn normalize_line(input: &str) -> String {
    collapse_whitespace(&decode_entities(input))
}

/// Normalize a description, keeping paragraph breaks.
///
/// Whitespace inside each line is collapsed, runs of blank lines become one
/// paragraph break and stray spaces before punctuation are dropped.
pub fn normalize_description(input: &str) -> String {
    let decoded = decode_entities(input);

    let mut lines: Vec<String> = Vec::new();
    let mut pending_break = false;
    for line in decoded.lines() {
        let line = collapse_whitespace(line);
        if line.is_empty() {
            pending_break = !lines.is_empty();
            continue;
        }
        if pending_break {
            lines.push(String::new());
            pending_break = false;
        }
        lines.push(line);
    }

    SPACE_BEFORE_PUNCT_RE
        .replace_all(&lines.join("\n"), "$1")
        .into_owned()
}

/// Decode HTML character references (`&amp;`, `&auml;`, `&#228;`, `&#xE4;`).
///
/// Unknown or malformed references are left untouched.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        let decoded = after
            .find(';')
            .filter(|end| *end > 0 && *end <= MAX_ENTITY_LEN)
            .and_then(|end| decode_entity(&after[..end]).map(|s| (s, end)));

        match decoded {
            Some((replacement, end)) => {
                out.push_str(&replacement);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let s = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" | "ensp" | "emsp" | "thinsp" => " ",
        "shy" => "",
        "auml" => "ä",
        "Auml" => "Ä",
        "ouml" => "ö",
        "Ouml" => "Ö",
        "uuml" => "ü",
        "Uuml" => "Ü",
        "szlig" => "ß",
        "eacute" => "é",
        "egrave" => "è",
        "euro" => "€",
        "ndash" => "–",
        "mdash" => "—",
        "hellip" => "…",
        "bdquo" => "„",
        "ldquo" => "“",
        "rdquo" => "”",
        "sbquo" => "‚",
        "lsquo" => "‘",
        "rsquo" => "’",
        "laquo" => "«",
        "raquo" => "»",
        "middot" => "·",
        "bull" => "•",
        "copy" => "©",
        "reg" => "®",
        "deg" => "°",
        "sect" => "§",
        _ => return None,
    };
    Some(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_named_and_numeric_entities() {
        assert_eq!(
            decode_entities("Kinder &amp; Jugend &ndash; Gr&uuml;nanlage &#228; &#xE4;"),
            "Kinder & Jugend – Grünanlage ä ä"
        );
    }

    #[test]
    fn test_decode_leaves_unknown_references() {
        assert_eq!(decode_entities("A &unknown; B & C"), "A &unknown; B & C");
        assert_eq!(decode_entities("Tom&Jerry;"), "Tom&Jerry;");
    }

    #[test]
    fn test_decode_borrows_when_nothing_to_do() {
        assert!(matches!(decode_entities("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line("  Event \n\t Title&nbsp;2025 "), "Event Title 2025");
    }

    #[test]
    fn test_normalize_description_whitespace() {
        assert_eq!(
            normalize_description("Text  with   multiple spaces"),
            "Text with multiple spaces"
        );
    }

    #[test]
    fn test_normalize_description_paragraphs() {
        assert_eq!(
            normalize_description("\n\nFirst paragraph.\n\n\n  \nSecond paragraph.\n\n"),
            "First paragraph.\n\nSecond paragraph."
        );
    }

    #[test]
    fn test_normalize_description_punctuation_spacing() {
        assert_eq!(
            normalize_description("Text with spaces , and ; punctuation ."),
            "Text with spaces, and; punctuation."
        );
    }

    #[test]
    fn test_normalize_description_no_trailing_spaces() {
        let result = normalize_description("Line one   \nLine two  ");
        assert!(result.lines().all(|l| !l.ends_with(' ')));
    }
}
