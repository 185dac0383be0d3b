//! Byte decoding with an ordered list of candidate encodings.

use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

use tablerag_core::{Error, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    /// Canonical name of the encoding that decoded cleanly.
    pub encoding: String,
}

/// Decode `bytes` with the first candidate that yields no malformed
/// sequence. Labels follow the WHATWG encoding names (`utf-8`, `gbk`,
/// `big5`, `gb18030`, ...).
pub fn decode_with_candidates(bytes: &[u8], candidates: &[String]) -> Result<DecodedText> {
    if candidates.is_empty() {
        return Err(Error::InvalidArgument("no candidate encodings given".into()));
    }

    let encodings: Vec<&'static Encoding> = candidates
        .iter()
        .map(|label| {
            Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| Error::InvalidArgument(format!("unknown encoding: {}", label)))
        })
        .collect::<Result<_>>()?;

    for encoding in encodings {
        let input = if encoding == UTF_8 {
            bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
        } else {
            bytes
        };

        match encoding.decode_without_bom_handling_and_without_replacement(input) {
            Some(text) => {
                return Ok(DecodedText {
                    text: text.into_owned(),
                    encoding: encoding.name().to_string(),
                })
            }
            None => debug!("Source is not valid {}", encoding.name()),
        }
    }

    Err(Error::Decode {
        attempted: candidates.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{BIG5, GBK};

    fn defaults() -> Vec<String> {
        ["utf-8", "gbk", "big5", "gb18030"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_utf8_first() {
        let decoded = decode_with_candidates("城市,年龄\n".as_bytes(), &defaults()).unwrap();
        assert_eq!(decoded.encoding, "UTF-8");
        assert_eq!(decoded.text, "城市,年龄\n");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"city\nNYC\n");
        let decoded = decode_with_candidates(&bytes, &defaults()).unwrap();
        assert_eq!(decoded.text, "city\nNYC\n");
    }

    #[test]
    fn test_falls_back_to_gbk() {
        let (bytes, _, had_errors) = GBK.encode("城市,年龄\n北京,30\n");
        assert!(!had_errors);
        let decoded = decode_with_candidates(&bytes, &defaults()).unwrap();
        assert_eq!(decoded.encoding, "GBK");
        assert_eq!(decoded.text, "城市,年龄\n北京,30\n");
    }

    #[test]
    fn test_candidate_order_is_respected() {
        let (bytes, _, _) = BIG5.encode("臺北");
        let candidates = vec!["big5".to_string(), "gbk".to_string()];
        let decoded = decode_with_candidates(&bytes, &candidates).unwrap();
        assert_eq!(decoded.encoding, "Big5");
    }

    #[test]
    fn test_all_candidates_fail() {
        let err = decode_with_candidates(b"a,b\n\xFF,1\n", &defaults()).unwrap_err();
        match err {
            Error::Decode { attempted } => assert_eq!(attempted, defaults()),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_label() {
        let err = decode_with_candidates(b"x", &["klingon".to_string()]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
