use csv::ReaderBuilder;
use encoding_rs::{Encoding, GB18030, GBK, UTF_8};
use tracing::debug;

use crate::error::{IngestError, IngestResult};

/// An ordered table of text cells with its (possibly synthesized) header row.
///
/// Invariant: every row has exactly `headers.len()` cells. The normalizer
/// upholds this when it builds the table; the decoder only produces raw rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

type DecodeFn = fn(&[u8]) -> Option<String>;

/// The fallback chain, tried in order until one decode succeeds. `gb2312` is
/// an alias of GBK in the WHATWG registry but stays a distinct entry so the
/// chain mirrors what the export tooling advertises. The byte-preserving
/// latin1 entry maps every byte to a code point and cannot fail, so the
/// chain always terminates with some text.
pub const ENCODING_CHAIN: &[(&str, DecodeFn)] = &[
    ("gbk", decode_gbk),
    ("gb2312", decode_gbk),
    ("gb18030", decode_gb18030),
    ("utf-8", decode_utf8),
    ("latin1", decode_latin1),
];

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|cow| cow.into_owned())
}

fn decode_gbk(bytes: &[u8]) -> Option<String> {
    decode_with(GBK, bytes)
}

fn decode_gb18030(bytes: &[u8]) -> Option<String> {
    decode_with(GB18030, bytes)
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    decode_with(UTF_8, bytes)
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Decode raw bytes into text via the fallback chain, returning the text and
/// the name of the encoding that accepted it. Success is judged purely on
/// text-decoding validity; row-shape problems found later never re-enter the
/// chain.
pub fn decode_text(bytes: &[u8]) -> (String, &'static str) {
    for &(name, decode) in ENCODING_CHAIN {
        if let Some(text) = decode(bytes) {
            debug!(encoding = name, "decoded {} bytes", bytes.len());
            return (text, name);
        }
    }
    // Unreachable: latin1 never fails. Kept as a defined escalation anyway.
    (decode_text_lenient(bytes), "gbk-lenient")
}

/// Lenient escalation: GBK with U+FFFD substitution instead of failure.
pub fn decode_text_lenient(bytes: &[u8]) -> String {
    let (text, _, _) = GBK.decode(bytes);
    text.into_owned()
}

/// Decode a CSV member's bytes into raw records (header row included, when
/// the file has one). Only comma-delimited text is supported; `flexible`
/// keeps ragged rows so the normalizer can repair their shape.
pub fn decode_rows(bytes: &[u8]) -> IngestResult<Vec<Vec<String>>> {
    let (text, _) = decode_text(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    if rows.is_empty() {
        return Err(IngestError::Decode("file contains no rows".into()));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "设备描述,加密\n未授权设备,否\n";

    fn assert_round_trip(bytes: &[u8], expected_encoding: &str) {
        let (text, encoding) = decode_text(bytes);
        assert_eq!(encoding, expected_encoding);
        assert_eq!(text, SAMPLE);
    }

    #[test]
    fn gbk_round_trip() {
        let (bytes, _, _) = GBK.encode(SAMPLE);
        assert_round_trip(&bytes, "gbk");
    }

    #[test]
    fn gb18030_round_trip() {
        // GBK accepts the GB18030 encoding of this text as well; the chain
        // order makes gbk win, which is the contract, not a bug.
        let (bytes, _, _) = GB18030.encode(SAMPLE);
        let (text, _) = decode_text(&bytes);
        assert_eq!(text, SAMPLE);
    }

    #[test]
    fn utf8_round_trip() {
        // "一" encodes as E4 B8 80; the 0x80 byte is not a legal GBK or
        // GB18030 lead, so the chain falls through to utf-8.
        let sample = "一,二\n三,四\n";
        let (text, encoding) = decode_text(sample.as_bytes());
        assert_eq!(encoding, "utf-8");
        assert_eq!(text, sample);
    }

    #[test]
    fn latin1_fallback_never_fails() {
        // 0xFF is not a valid lead byte in GBK, GB18030 or UTF-8.
        let bytes = [0xFF, b',', b'A', b'\n'];
        let (text, encoding) = decode_text(&bytes);
        assert_eq!(encoding, "latin1");
        assert_eq!(text, "ÿ,A\n");
    }

    #[test]
    fn rows_parse_from_decoded_text() {
        let rows = decode_rows("a,b\n1,2\n".as_bytes()).unwrap();
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn empty_file_is_a_decode_error() {
        assert!(matches!(
            decode_rows(b""),
            Err(IngestError::Decode(_))
        ));
    }

    #[test]
    fn lenient_variant_substitutes_replacement() {
        let text = decode_text_lenient(&[0xFF, b'x']);
        assert!(text.contains('\u{FFFD}'));
    }
}
