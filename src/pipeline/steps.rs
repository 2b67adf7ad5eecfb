//! HTML step-text extraction: the single HTML part → numbered narration.
//!
//! The recorder writes each action as a text node of the form
//! `Step 3: User left click on "Save"`. The same prefix also appears on
//! caption lines that carry a `(MM/DD/YYYY H:MM:SS AM)` timestamp; those are
//! rejected outright so only the action descriptions survive.
//!
//! A description that itself contains a full date-time stamp is dropped
//! along with the captions.

use crate::error::Mht2MdError;
use crate::pipeline::mime::Container;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use tracing::{debug, info};

// Digits are ASCII only: `\d` would also match other Unicode decimal digits,
// which `u32::from_str` rejects.
static RE_STEP_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Step ([0-9]+):").unwrap());

static RE_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(?[0-9]{2}/[0-9]{2}/[0-9]{4} [0-9]{1,2}:[0-9]{2}:[0-9]{2} [APM]{2}\)?").unwrap()
});

/// Everything removed from an accepted line: the prefix, any timestamp, and
/// every run of non-ASCII characters.
static RE_STRIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^Step [0-9]+:",
        r"|\(?[0-9]{2}/[0-9]{2}/[0-9]{4} [0-9]{1,2}:[0-9]{2}:[0-9]{2} [APM]{2}\)?",
        r"|[^\x00-\x7F]+"
    ))
    .unwrap()
});

/// Elements whose text content is never narration.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "template"];

/// Step number → accumulated narration, iterated in ascending step order.
///
/// Every entry holds non-empty text: [`StepRecord::append`] ignores blank
/// fragments, so a step is either present with content or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepRecord(BTreeMap<u32, String>);

impl StepRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` to step `number`, space-separated, creating the entry if absent.
    pub fn append(&mut self, number: u32, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match self.0.entry(number) {
            btree_map::Entry::Occupied(mut e) => {
                let existing = e.get_mut();
                existing.push(' ');
                existing.push_str(text);
            }
            btree_map::Entry::Vacant(e) => {
                e.insert(text.to_string());
            }
        }
    }

    pub fn get(&self, number: u32) -> Option<&str> {
        self.0.get(&number).map(String::as_str)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.0.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Steps in ascending numeric order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(n, t)| (*n, t.as_str()))
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.keys().copied()
    }
}

impl<S: AsRef<str>> FromIterator<(u32, S)> for StepRecord {
    fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
        let mut record = StepRecord::new();
        for (n, text) in iter {
            record.append(n, text.as_ref());
        }
        record
    }
}

/// Decode the first `text/html` part of the container.
///
/// # Errors
/// [`Mht2MdError::NoHtmlPart`] if the container has no HTML part.
pub fn find_html(container: &Container) -> Result<String, Mht2MdError> {
    let part = container
        .parts()
        .iter()
        .find(|p| p.is_html())
        .ok_or(Mht2MdError::NoHtmlPart)?;
    let html = decode_html(part.payload(), part.charset());
    debug!("HTML part: {} bytes → {} chars", part.payload().len(), html.len());
    Ok(html)
}

/// Decode HTML bytes: BOM → declared charset → UTF-8.
///
/// Undecodable sequences are replaced rather than failing the conversion;
/// the replacement characters are non-ASCII and are stripped from step text
/// anyway.
pub fn decode_html(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| charset.and_then(|label| Encoding::for_label(label.trim().as_bytes())))
        .unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!("HTML contained bytes invalid in {}", encoding.name());
    }
    text.into_owned()
}

/// Collect the step narration from an HTML document.
pub fn extract_steps(html: &str) -> StepRecord {
    let mut steps = StepRecord::new();
    for text in stripped_strings(html) {
        if let Some((number, cleaned)) = parse_step_line(&text) {
            steps.append(number, &cleaned);
        }
    }
    info!("Found {} steps with content", steps.len());
    steps
}

/// Classify and clean one trimmed text node.
///
/// Returns `None` for lines without a `Step N:` prefix, lines carrying a
/// timestamp, step numbers that do not fit in `u32`, and lines that are
/// empty once cleaned.
pub fn parse_step_line(text: &str) -> Option<(u32, String)> {
    let caps = RE_STEP_PREFIX.captures(text)?;
    if RE_TIMESTAMP.is_match(text) {
        return None;
    }
    let number: u32 = caps[1].parse().ok()?;
    let cleaned = RE_STRIP.replace_all(text, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some((number, cleaned.to_string()))
    }
}

/// Non-empty trimmed text nodes in document order, skipping script/style.
fn stripped_strings(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.tree
        .root()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name().to_owned()))
                .is_some_and(|name| HIDDEN_ELEMENTS.iter().any(|h| *h == name));
            if hidden {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn timestamped_line_is_excluded() {
        assert_eq!(
            parse_step_line("Step 3: Click (01/02/2023 4:05:06 PM) button"),
            None
        );
        assert_eq!(
            parse_step_line("Step 3: Click button"),
            Some((3, "Click button".to_string()))
        );
    }

    #[test]
    fn step_number_must_be_ascii_digits() {
        assert_eq!(parse_step_line("Step \u{0661}\u{0662}: Click OK"), None);
        assert_eq!(parse_step_line("Step \u{FF13}: Click OK"), None);
        assert_eq!(
            parse_step_line("Step 12: Click OK"),
            Some((12, "Click OK".to_string()))
        );
    }

    #[test]
    fn non_step_lines_ignored() {
        assert_eq!(parse_step_line("Recorded Steps"), None);
        assert_eq!(parse_step_line("Previous Step 3: nope"), None);
        assert_eq!(parse_step_line("Step three: nope"), None);
        assert_eq!(parse_step_line("Step 4:"), None);
        assert_eq!(parse_step_line("Step 99999999999: overflow"), None);
    }

    #[test]
    fn non_ascii_runs_are_stripped() {
        assert_eq!(
            parse_step_line("Step 2: User left click on \u{201C}Save\u{201D} \u{200E}button"),
            Some((2, "User left click on Save button".to_string()))
        );
        assert_eq!(parse_step_line("Step 5: \u{00E9}\u{00E8}"), None);
    }

    #[test]
    fn fragments_for_same_step_concatenate_in_order() {
        let html = r#"<html><body>
            <p>Step 1: Open menu</p>
            <p>Step 2: Click Save</p>
            <div><span>Step 1: then pick File</span></div>
            <p>Step 2: (03/04/2023 10:11:12 AM) caption</p>
        </body></html>"#;
        let steps = extract_steps(html);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps.get(1), Some("Open menu then pick File"));
        assert_eq!(steps.get(2), Some("Click Save"));
    }

    #[test]
    fn rejected_only_steps_are_absent() {
        let html = "<p>Step 7: (01/02/2023 1:02:03 PM)</p><p>Step 8: \u{2014}</p>";
        let steps = extract_steps(html);
        assert!(steps.is_empty());
        assert!(!steps.contains(7));
        assert!(!steps.contains(8));
    }

    #[test]
    fn script_and_style_text_ignored() {
        let html = "<head><style>Step 1: css</style><script>Step 2: js</script></head>\
                    <body><p>Step 3: real</p><!-- Step 4: comment --></body>";
        let steps = extract_steps(html);
        assert_eq!(steps.numbers().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn entities_are_decoded_before_matching() {
        let steps = extract_steps("<p>Step&nbsp;1: a</p><p>Step 2: Tom &amp; Jerry</p>");
        // &nbsp; is not an ASCII space, so the prefix does not match.
        assert!(!steps.contains(1));
        assert_eq!(steps.get(2), Some("Tom & Jerry"));
    }

    #[test]
    fn record_iterates_in_numeric_order() {
        let steps: StepRecord = vec![(3, "c"), (1, "a"), (2, "b"), (10, "j")]
            .into_iter()
            .collect();
        let order: Vec<u32> = steps.numbers().collect();
        assert_eq!(order, vec![1, 2, 3, 10]);
    }

    #[test]
    fn append_ignores_blank_text() {
        let mut steps = StepRecord::new();
        steps.append(1, "   ");
        assert!(steps.is_empty());
        steps.append(1, " a ");
        steps.append(1, "b");
        assert_eq!(steps.get(1), Some("a b"));
    }

    #[test]
    fn decode_uses_declared_charset() {
        let bytes = b"<p>Step 1: caf\xe9</p>";
        assert_eq!(decode_html(bytes, Some("windows-1252")), "<p>Step 1: caf\u{e9}</p>");
        // Invalid UTF-8 is replaced, not rejected.
        assert!(decode_html(bytes, None).contains('\u{FFFD}'));
        // Unknown labels fall back to UTF-8.
        assert_eq!(decode_html(b"ok", Some("x-unknown")), "ok");
    }

    #[test]
    fn decode_prefers_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("Step 1: \u{e9}".as_bytes());
        assert_eq!(decode_html(&bytes, Some("windows-1252")), "Step 1: \u{e9}");
    }

    #[test]
    fn find_html_requires_html_part() {
        let raw = "Content-Type: multipart/related; boundary=b\n\n--b\nContent-Type: image/png\n\nx\n--b--\n";
        let container = crate::pipeline::mime::parse_container(raw.as_bytes()).unwrap();
        assert!(matches!(find_html(&container), Err(Mht2MdError::NoHtmlPart)));
    }
}
