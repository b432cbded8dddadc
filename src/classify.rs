//! Content sniffing: binary detection, text decoding, generated-code markers.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Bytes inspected by [`is_binary`].
pub const BINARY_SNIFF_LEN: usize = 4096;

/// Lines inspected by [`is_generated`].
const GENERATED_HEADER_LINES: usize = 5;

const GENERATED_MARKERS: &[&str] = &[
    "@generated",
    "generated code",
    "auto-generated",
    "autogenerated",
    "do not modify",
    "do not edit",
    "code generated by",
    "this file was generated",
];

/// Heuristic: content with a zero byte in its first 4096 bytes is binary.
///
/// # Examples
///
/// ```
/// use cartographer::classify::is_binary;
///
/// assert!(is_binary(b"PK\x03\x04\x00\x00"));
/// assert!(!is_binary(b"fn main() {}\n"));
/// ```
pub fn is_binary(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    window.contains(&0)
}

/// Whether the first five lines carry a generated-code marker.
pub fn is_generated(text: &str) -> bool {
    text.lines()
        .take(GENERATED_HEADER_LINES)
        .map(str::to_lowercase)
        .any(|line| GENERATED_MARKERS.iter().any(|marker| line.contains(marker)))
}

/// Text encodings tried by [`decode`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-16le")]
    Utf16Le,
    #[serde(rename = "latin-1")]
    Latin1,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Utf8 => write!(f, "utf-8"),
            TextEncoding::Utf16Le => write!(f, "utf-16le"),
            TextEncoding::Latin1 => write!(f, "latin-1"),
        }
    }
}

const DECODE_ORDER: [TextEncoding; 3] = [
    TextEncoding::Utf8,
    TextEncoding::Utf16Le,
    TextEncoding::Latin1,
];

impl TextEncoding {
    fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                std::str::from_utf8(bytes).ok().map(str::to_owned)
            }
            TextEncoding::Utf16Le => {
                let body = bytes.strip_prefix(b"\xFF\xFE")?;
                if body.len() % 2 != 0 {
                    return None;
                }
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).ok()
            }
            TextEncoding::Latin1 => {
                // Every byte is a code point; reject control bytes that text never carries.
                if bytes
                    .iter()
                    .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C))
                {
                    return None;
                }
                Some(bytes.iter().map(|&b| char::from(b)).collect())
            }
        }
    }
}

/// Decode bytes with the first encoding that accepts them.
///
/// # Examples
///
/// ```
/// use cartographer::classify::{decode, TextEncoding};
///
/// let (text, encoding) = decode(b"caf\xe9").unwrap();
/// assert_eq!(text, "café");
/// assert_eq!(encoding, TextEncoding::Latin1);
/// ```
pub fn decode(bytes: &[u8]) -> Option<(String, TextEncoding)> {
    DECODE_ORDER
        .iter()
        .find_map(|&encoding| encoding.decode(bytes).map(|text| (text, encoding)))
}

/// Why a file's content was left out of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge { size: u64, limit: u64 },
    Binary,
    Undecodable,
    Generated,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooLarge { size, limit } => {
                write!(f, "too large ({size} bytes, limit {limit})")
            }
            SkipReason::Binary => write!(f, "binary"),
            SkipReason::Undecodable => write!(f, "undecodable"),
            SkipReason::Generated => write!(f, "generated"),
        }
    }
}

/// Decoded file content ready to become a record.
#[derive(Debug, Clone)]
pub struct TextContent {
    pub text: String,
    pub encoding: TextEncoding,
    pub size: u64,
}

/// Outcome of classifying one file.
#[derive(Debug)]
pub enum Classification {
    Text(TextContent),
    Skipped(SkipReason),
}

/// Gates applied to a file's content.
#[derive(Debug, Clone, Copy)]
pub struct ContentRules {
    pub max_size: u64,
    pub skip_binary: bool,
    pub skip_generated: bool,
}

/// Run the read path for one file.
///
/// Size is checked from metadata before anything is read. The gates then
/// run in order (binary, decode, generated) and the first failing gate
/// decides the skip reason. IO errors are returned to the caller.
pub fn classify_file(path: &Path, rules: ContentRules) -> std::io::Result<Classification> {
    let size = std::fs::metadata(path)?.len();
    if size > rules.max_size {
        return Ok(Classification::Skipped(SkipReason::TooLarge {
            size,
            limit: rules.max_size,
        }));
    }

    let bytes = std::fs::read(path)?;
    Ok(classify_bytes(&bytes, rules))
}

/// Apply the content gates to bytes already in memory.
pub fn classify_bytes(bytes: &[u8], rules: ContentRules) -> Classification {
    let size = bytes.len() as u64;
    if size > rules.max_size {
        return Classification::Skipped(SkipReason::TooLarge {
            size,
            limit: rules.max_size,
        });
    }

    if rules.skip_binary && is_binary(bytes) {
        return Classification::Skipped(SkipReason::Binary);
    }

    let Some((text, encoding)) = decode(bytes) else {
        return Classification::Skipped(SkipReason::Undecodable);
    };

    if rules.skip_generated && is_generated(&text) {
        return Classification::Skipped(SkipReason::Generated);
    }

    Classification::Text(TextContent {
        text,
        encoding,
        size,
    })
}
