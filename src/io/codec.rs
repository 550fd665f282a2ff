// src/io/codec.rs
//
// Text <-> wire conversion for the terminal.
//
// Inbound blocks are decoded strictly as UTF-8. Blocks that are empty or not
// valid UTF-8 fall back to a hex rendering so binary traffic stays visible.
// Outbound text is encoded byte-exact, with no implicit line ending.

use std::fmt::Write as _;

/// Line break used to terminate hex renderings and status lines.
pub const LINE_BREAK: &str = "\r\n";

/// Result of decoding one inbound block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// Block was valid, non-empty UTF-8.
    Text(String),
    /// Block could not be decoded; two uppercase hex digits per byte.
    Hex(String),
}

impl Decoded {
    pub fn as_str(&self) -> &str {
        match self {
            Decoded::Text(s) | Decoded::Hex(s) => s,
        }
    }

    pub fn is_hex(&self) -> bool {
        matches!(self, Decoded::Hex(_))
    }
}

/// Decode an inbound block.
pub fn decode(bytes: &[u8]) -> Decoded {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.is_empty() => Decoded::Text(text.to_owned()),
        _ => Decoded::Hex(hex_line(bytes)),
    }
}

/// Encode outbound text exactly as given.
pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Render bytes as `"XX XX .. "` followed by a line break.
pub fn hex_line(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + LINE_BREAK.len());
    for b in bytes {
        let _ = write!(out, "{:02X} ", b);
    }
    out.push_str(LINE_BREAK);
    out
}

/// Short hex preview for diagnostics, truncated after `max` bytes.
pub fn hex_preview(bytes: &[u8], max: usize) -> String {
    let shown = &bytes[..bytes.len().min(max)];
    let mut out = shown
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > max {
        let _ = write!(out, " .. (+{} bytes)", bytes.len() - max);
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_text() {
        assert_eq!(decode(b"hello\r\n"), Decoded::Text("hello\r\n".to_string()));
        assert_eq!(
            decode("olá mundo".as_bytes()),
            Decoded::Text("olá mundo".to_string())
        );
    }

    #[test]
    fn test_decode_invalid_utf8_falls_back_to_hex() {
        let decoded = decode(&[0xFF, 0xFE, 0x00]);
        assert!(decoded.is_hex());
        assert_eq!(decoded.as_str(), "FF FE 00 \r\n");
    }

    #[test]
    fn test_decode_is_strict() {
        // Valid prefix followed by a truncated multi-byte sequence is not partially decoded
        let decoded = decode(&[b'o', b'k', 0xC3]);
        assert_eq!(decoded, Decoded::Hex("6F 6B C3 \r\n".to_string()));
    }

    #[test]
    fn test_decode_empty_is_hex() {
        assert_eq!(decode(&[]), Decoded::Hex("\r\n".to_string()));
    }

    #[test]
    fn test_encode_adds_no_line_ending() {
        assert_eq!(encode("AT"), b"AT".to_vec());
        assert_eq!(encode("ç"), vec![0xC3, 0xA7]);
        assert!(encode("").is_empty());
    }

    #[test]
    fn test_hex_preview_truncates() {
        assert_eq!(hex_preview(&[0xDE, 0xAD], 4), "DE AD");
        assert_eq!(hex_preview(&[1, 2, 3, 4, 5], 2), "01 02 .. (+3 bytes)");
    }

    proptest! {
        #[test]
        fn test_text_round_trips(text in "\\PC{1,200}") {
            prop_assert_eq!(decode(&encode(&text)), Decoded::Text(text));
        }

        #[test]
        fn test_invalid_utf8_renders_one_token_per_byte(
            bytes in proptest::collection::vec(any::<u8>(), 0..255).prop_map(|mut v| {
                // 0xFF never appears in UTF-8
                v.push(0xFF);
                v
            })
        ) {
            let decoded = decode(&bytes);
            prop_assert!(decoded.is_hex());
            let rendered = decoded.as_str();
            prop_assert!(rendered.ends_with(LINE_BREAK));
            let body = &rendered[..rendered.len() - LINE_BREAK.len()];
            let tokens: Vec<&str> = body.split_terminator(' ').collect();
            prop_assert_eq!(tokens.len(), bytes.len());
            for (token, byte) in tokens.iter().zip(&bytes) {
                prop_assert_eq!(token.len(), 2);
                prop_assert!(token.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
                prop_assert_eq!(u8::from_str_radix(token, 16).unwrap(), *byte);
            }
        }
    }
}
