//! MIME container reader: raw MHT bytes → ordered list of decoded parts.
//!
//! An MHT capture is a `multipart/related` message: one HTML document plus
//! the screenshots it references, each in its own part with a
//! `Content-Location` header. This reader only does what the later stages
//! need: split on boundaries (recursing into nested multiparts), read the
//! three headers we care about, and resolve the transfer encoding so that
//! downstream stages only ever see decoded bytes.
//!
//! Individual parts never fail here: missing headers degrade to an empty
//! content-type, and a base64 body that cannot be decoded even after
//! dropping stray bytes is kept as an empty payload carrying the decode
//! error, so the image stage can report it. Only a top-level message that is
//! not multipart at all is rejected.

use crate::error::Mht2MdError;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use tracing::{debug, warn};

/// Nested multiparts deeper than this are kept as opaque leaf parts.
const MAX_DEPTH: usize = 16;

/// Capture tools wrap base64 at arbitrary widths and are sloppy with padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// One leaf part of the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    content_type: String,
    charset: Option<String>,
    content_location: Option<String>,
    payload: Vec<u8>,
    decode_error: Option<String>,
}

impl Part {
    /// Lower-cased `type/subtype` without parameters; empty when the header is absent.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// `charset` parameter of the Content-Type header, if declared.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn content_location(&self) -> Option<&str> {
        self.content_location.as_deref()
    }

    /// Payload with the transfer encoding already resolved.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Why the transfer encoding could not be resolved, if it could not.
    pub fn decode_error(&self) -> Option<&str> {
        self.decode_error.as_deref()
    }

    pub fn is_html(&self) -> bool {
        self.content_type == "text/html"
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Parsed MHT container: leaf parts in depth-first physical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    parts: Vec<Part>,
}

impl Container {
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Image parts with a non-empty or undecodable payload, in container order.
    pub fn images(&self) -> impl Iterator<Item = &Part> {
        self.parts
            .iter()
            .filter(|p| p.is_image() && (!p.payload.is_empty() || p.decode_error.is_some()))
    }
}

/// Parse raw MHT bytes into a [`Container`].
///
/// # Errors
/// [`Mht2MdError::MalformedContainer`] when the top-level Content-Type is
/// not `multipart/*`, has no boundary, or the boundary never occurs.
pub fn parse_container(bytes: &[u8]) -> Result<Container, Mht2MdError> {
    let (head, body) = split_head_body(bytes);
    let headers = Headers::parse(head);

    let raw_type = headers
        .get("content-type")
        .ok_or_else(|| malformed("missing Content-Type header"))?;
    let content_type = ContentType::parse(raw_type);
    if !content_type.mime.starts_with("multipart/") {
        return Err(malformed(format!(
            "expected a multipart message, got '{}'",
            content_type.mime
        )));
    }
    let boundary = content_type
        .param("boundary")
        .filter(|b| !b.is_empty())
        .ok_or_else(|| malformed("multipart Content-Type has no boundary"))?;

    let sections = split_multipart(body, boundary)
        .ok_or_else(|| malformed(format!("boundary '{boundary}' not found in body")))?;

    let mut parts = Vec::new();
    for section in sections {
        walk(section, 1, &mut parts);
    }
    debug!("Parsed MHT container: {} parts", parts.len());
    Ok(Container { parts })
}

fn malformed(detail: impl Into<String>) -> Mht2MdError {
    Mht2MdError::MalformedContainer {
        detail: detail.into(),
    }
}

/// Depth-first walk of one body part, appending leaves to `out`.
fn walk(raw: &[u8], depth: usize, out: &mut Vec<Part>) {
    let (head, body) = split_head_body(raw);
    let headers = Headers::parse(head);
    let content_type = headers
        .get("content-type")
        .map(ContentType::parse)
        .unwrap_or_default();

    if content_type.mime.starts_with("multipart/") && depth < MAX_DEPTH {
        if let Some(children) = content_type
            .param("boundary")
            .filter(|b| !b.is_empty())
            .and_then(|b| split_multipart(body, b))
        {
            for child in children {
                walk(child, depth + 1, out);
            }
            return;
        }
        debug!("Nested multipart without usable boundary; keeping as leaf");
    }

    let encoding = headers
        .get("content-transfer-encoding")
        .map(|e| e.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let location = headers
        .get("content-location")
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);

    let (payload, decode_error) = match encoding.as_str() {
        "base64" => match decode_base64(body) {
            Ok(bytes) => (bytes, None),
            Err(e) => {
                warn!(
                    "Undecodable base64 payload in part {:?}: {}",
                    location.as_deref().unwrap_or(&content_type.mime),
                    e
                );
                (Vec::new(), Some(format!("invalid base64: {e}")))
            }
        },
        "quoted-printable" => (decode_quoted_printable(body), None),
        _ => (body.to_vec(), None),
    };

    out.push(Part {
        charset: content_type.param("charset").map(str::to_string),
        content_type: content_type.mime,
        content_location: location,
        payload,
        decode_error,
    });
}

// ── Header block ─────────────────────────────────────────────────────────

/// Split at the first empty line. A block without one is all headers.
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while pos < raw.len() {
        let end = raw[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .unwrap_or(raw.len());
        let line = &raw[pos..end];
        if line.is_empty() || line == b"\r" {
            let body_start = (end + 1).min(raw.len());
            return (&raw[..pos], &raw[body_start..]);
        }
        pos = end + 1;
    }
    (raw, &[])
}

/// Unfolded headers with lower-cased names, in order of appearance.
#[derive(Debug, Default)]
struct Headers(Vec<(String, String)>);

impl Headers {
    fn parse(head: &[u8]) -> Self {
        let text = String::from_utf8_lossy(head);
        let mut headers: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }
        Headers(headers)
    }

    /// First value for `name` (lower-case).
    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parsed Content-Type: `type/subtype` plus `name=value` parameters.
#[derive(Debug, Default)]
struct ContentType {
    mime: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    fn parse(value: &str) -> Self {
        let mut pieces = split_unquoted(value, ';').into_iter();
        let mime = pieces
            .next()
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let params = pieces
            .filter_map(|p| {
                let (name, value) = p.split_once('=')?;
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                Some((name.trim().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        ContentType { mime, params }
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Split on `sep` outside double quotes.
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                out.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

// ── Multipart body ───────────────────────────────────────────────────────

/// Split a multipart body into its sections.
///
/// The line break before each delimiter belongs to the delimiter. Preamble
/// and epilogue are dropped; a missing close delimiter keeps the last
/// section. Returns `None` when the boundary never appears.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Option<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut sections = Vec::new();
    let mut current: Option<usize> = None;
    let mut found = false;
    let mut pos = 0;

    while pos < body.len() {
        let end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .unwrap_or(body.len());
        let line = body[pos..end].trim_ascii_end();

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest == b"--";
            if rest.is_empty() || closing {
                found = true;
                if let Some(start) = current.take() {
                    sections.push(&body[start..content_end(body, start, pos)]);
                }
                if closing {
                    return Some(sections);
                }
                current = Some((end + 1).min(body.len()));
            }
        }
        pos = end + 1;
    }

    if !found {
        return None;
    }
    if let Some(start) = current {
        if start < body.len() {
            sections.push(&body[start..]);
        }
    }
    Some(sections)
}

/// End of a section that is followed by a delimiter line starting at `line_start`.
fn content_end(body: &[u8], start: usize, line_start: usize) -> usize {
    let mut end = line_start;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

// ── Transfer encodings ───────────────────────────────────────────────────

/// Decode base64, skipping every byte outside the alphabet.
///
/// Padding is ignored wherever it appears; only a leftover single character
/// (which cannot encode a byte) is an error.
fn decode_base64(body: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = body
        .iter()
        .copied()
        .filter(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
        .collect();
    let skipped = body
        .iter()
        .filter(|&&b| !b.is_ascii_whitespace() && b != b'=')
        .count()
        - compact.len();
    if skipped > 0 {
        debug!("Skipped {} stray bytes in base64 payload", skipped);
    }
    LENIENT_BASE64.decode(compact)
}

/// Decode quoted-printable. Malformed `=` escapes are kept literally.
fn decode_quoted_printable(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }
        match (body.get(i + 1).copied(), body.get(i + 2).copied()) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (Some(hi), Some(lo)) => match (hex_value(hi), hex_value(lo)) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            },
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
