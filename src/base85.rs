//! Base85 (RFC 1924 / Python `base64.b85decode` alphabet) decoding.
//!
//! No crate in the reference pack provides this codec and its exact
//! alphabet/padding rules are load-bearing (the wire format is produced by
//! Python's `base64.b85decode`), so it is implemented directly rather than
//! risking a mismatched third-party alphabet. Self-contained, no ambient
//! concern (logging, config, retry) applies to it.

use crate::error::{ClientError, Result};

const ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";

pub fn decode(input: &str) -> Result<Vec<u8>> {
    let mut table = [None; 256];
    for (i, &b) in ALPHABET.iter().enumerate() {
        table[b as usize] = Some(i as u32);
    }

    let bytes: Vec<u8> = input.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let mut out = Vec::with_capacity(bytes.len() * 4 / 5 + 4);

    for chunk in bytes.chunks(5) {
        let mut value: u32 = 0;
        let mut used = 0;
        for &b in chunk {
            let digit = table[b as usize]
                .ok_or_else(|| ClientError::Protocol(format!("invalid base85 byte: {b:#x}")))?;
            value = value
                .checked_mul(85)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| ClientError::Protocol("base85 chunk overflow".into()))?;
            used += 1;
        }
        // Pad a short final group with the highest-value digit, matching
        // Python's b85decode padding behavior, then take `used - 1` bytes.
        for _ in used..5 {
            value = value
                .checked_mul(85)
                .and_then(|v| v.checked_add(84))
                .ok_or_else(|| ClientError::Protocol("base85 chunk overflow".into()))?;
        }
        let word = value.to_be_bytes();
        out.extend_from_slice(&word[..used.saturating_sub(1)]);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hand_rolled_encoder() {
        fn b85_encode(data: &[u8]) -> String {
            let mut out = String::new();
            for chunk in data.chunks(4) {
                let mut buf = [0u8; 4];
                buf[..chunk.len()].copy_from_slice(chunk);
                let value = u32::from_be_bytes(buf);
                let mut digits = [0u8; 5];
                let mut v = value;
                for slot in digits.iter_mut().rev() {
                    *slot = ALPHABET[(v % 85) as usize];
                    v /= 85;
                }
                let take = chunk.len() + 1;
                out.push_str(std::str::from_utf8(&digits[..take]).unwrap());
            }
            out
        }

        for input in [
            &b""[..],
            &b"A"[..],
            &b"AB"[..],
            &b"ABC"[..],
            &b"ABCD"[..],
            &b"ABCDE"[..],
            &b"hello world"[..],
            &b"\x00\x01\x02\x03\x04\x05\x06"[..],
        ] {
            let encoded = b85_encode(input);
            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded, input, "round trip failed for {input:?}");
        }
    }

    #[test]
    fn rejects_invalid_byte() {
        assert!(decode("\u{0}").is_err());
    }

    #[test]
    fn empty_input_decodes_to_empty_output() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }
}
