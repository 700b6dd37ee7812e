/// Decode a plain-text upload, falling back to Latin-1 when the bytes are not valid UTF-8.
///
/// Latin-1 maps every byte to the code point of the same value, so the fallback cannot fail.
pub(super) fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim().to_string(),
        Err(error) => {
            tracing::debug!(
                valid_up_to = error.valid_up_to(),
                "Text is not valid UTF-8; decoding as Latin-1"
            );
            let decoded: String = bytes.iter().map(|&byte| char::from(byte)).collect();
            decoded.trim().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8_and_trims() {
        assert_eq!(decode_text("  héllo wörld \n".as_bytes()), "héllo wörld");
    }

    #[test]
    fn falls_back_to_latin1() {
        // "café" encoded as ISO-8859-1.
        let bytes = [b'c', b'a', b'f', 0xE9, b'\n'];
        assert_eq!(decode_text(&bytes), "café");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(decode_text(b""), "");
        assert_eq!(decode_text(b" \r\n\t"), "");
    }
}
