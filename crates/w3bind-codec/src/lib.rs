//! Decoding of self-describing key and signature encodings.
//!
//! Wallets and vaults publish keys and signatures as strings whose first
//! character (or `0x` prefix) names the byte encoding of the rest:
//!
//! | Input | Decoded as |
//! |-------|------------|
//! | `0x<hex>` | raw hex |
//! | `z<hex digits>` | hex, falling back to base58btc |
//! | `z<base58>` | base58btc (multibase) |
//! | anything else (signatures only) | standard base64 |
//!
//! Keys are tried against an ordered list of decoder strategies and the first
//! success wins. The order is part of the wire contract: certificates already
//! issued carry `z` + hex keys, so hex must be tried before base58.

mod error;

pub use error::{CodecError, Scheme};

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

/// Multibase prefix for base58btc.
pub const MULTIBASE_BASE58BTC: char = 'z';

const HEX_PREFIX: &str = "0x";

/// Standard alphabet, padding optional.
const SIGNATURE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A single way of turning a key string into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyDecoder {
    PrefixedHex,
    MultibaseHex,
    MultibaseBase58,
}

/// Strategies in the order they are attempted.
const KEY_DECODERS: [KeyDecoder; 3] = [
    KeyDecoder::PrefixedHex,
    KeyDecoder::MultibaseHex,
    KeyDecoder::MultibaseBase58,
];

impl KeyDecoder {
    fn scheme(self) -> Scheme {
        match self {
            Self::PrefixedHex => Scheme::PrefixedHex,
            Self::MultibaseHex => Scheme::MultibaseHex,
            Self::MultibaseBase58 => Scheme::Base58Btc,
        }
    }

    /// Returns `None` when the input is not shaped for this strategy.
    fn attempt(self, input: &str) -> Option<Result<Vec<u8>, String>> {
        match self {
            Self::PrefixedHex => {
                let rest = input.strip_prefix(HEX_PREFIX)?;
                Some(decode_hex(rest))
            }
            Self::MultibaseHex => {
                let rest = input.strip_prefix(MULTIBASE_BASE58BTC)?;
                is_hex_digits(rest).then(|| decode_hex(rest))
            }
            Self::MultibaseBase58 => {
                let rest = input.strip_prefix(MULTIBASE_BASE58BTC)?;
                Some(decode_base58(rest))
            }
        }
    }
}

fn is_hex_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("hex string must have even length".to_string());
    }
    hex::decode(s).map_err(|e| e.to_string())
}

fn decode_base58(s: &str) -> Result<Vec<u8>, String> {
    bs58::decode(s).into_vec().map_err(|e| e.to_string())
}

/// Decodes a published public key.
///
/// Accepts `0x` + hex, or the multibase `z` prefix followed by either hex
/// digits or base58btc.
///
/// # Errors
///
/// - [`CodecError::Empty`] for an empty input or a bare prefix.
/// - [`CodecError::MissingPrefix`] when no strategy recognizes the prefix.
/// - [`CodecError::AllSchemesFailed`] listing each attempted scheme and why
///   it failed.
pub fn decode_key(input: &str) -> Result<Vec<u8>, CodecError> {
    if input.is_empty() || input == HEX_PREFIX || input.len() == 1 {
        return Err(CodecError::Empty);
    }

    let mut attempts = Vec::new();
    for decoder in KEY_DECODERS {
        match decoder.attempt(input) {
            Some(Ok(bytes)) => return Ok(bytes),
            Some(Err(reason)) => attempts.push((decoder.scheme(), reason)),
            None => {}
        }
    }

    if attempts.is_empty() {
        Err(CodecError::MissingPrefix {
            expected: MULTIBASE_BASE58BTC,
        })
    } else {
        Err(CodecError::AllSchemesFailed { attempts })
    }
}

/// Decodes a wallet signature.
///
/// A `z` prefix selects base58btc for the remainder; anything else is
/// decoded whole as standard base64.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] naming the scheme that was attempted, or
/// [`CodecError::Empty`] for empty input.
pub fn decode_signature(input: &str) -> Result<Vec<u8>, CodecError> {
    if input.is_empty() {
        return Err(CodecError::Empty);
    }

    if let Some(rest) = input.strip_prefix(MULTIBASE_BASE58BTC) {
        if rest.is_empty() {
            return Err(CodecError::Empty);
        }
        return decode_base58(rest).map_err(|reason| CodecError::Decode {
            scheme: Scheme::Base58Btc,
            reason,
        });
    }

    SIGNATURE_BASE64
        .decode(input)
        .map_err(|e| CodecError::Decode {
            scheme: Scheme::Base64,
            reason: e.to_string(),
        })
}

/// Encodes bytes as multibase base58btc (`z` + base58).
pub fn encode_multibase_base58(bytes: &[u8]) -> String {
    format!("{MULTIBASE_BASE58BTC}{}", bs58::encode(bytes).into_string())
}

/// Encodes bytes as standard padded base64, the default signature encoding.
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: [u8; 11] = [1, 2, 3, 4, 5, 250, 251, 252, 253, 254, 255];

    #[test]
    fn base58_fixture_decodes_to_known_bytes() {
        let encoded = encode_multibase_base58(&FIXTURE);
        assert!(encoded.starts_with('z'));
        assert_eq!(decode_key(&encoded).unwrap(), FIXTURE);
        assert_eq!(decode_signature(&encoded).unwrap(), FIXTURE);
    }

    #[test]
    fn known_base58_literal() {
        assert_eq!(decode_key("zLdp").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_signature("zLdp").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn multibase_hex_key() {
        assert_eq!(decode_key("z0102ff").unwrap(), vec![0x01, 0x02, 0xff]);
        assert_eq!(decode_key("z0102FF").unwrap(), vec![0x01, 0x02, 0xff]);
    }

    #[test]
    fn prefixed_hex_key() {
        assert_eq!(decode_key("0x0102ff").unwrap(), vec![0x01, 0x02, 0xff]);
        let err = decode_key("0x012").unwrap_err();
        assert!(matches!(err, CodecError::AllSchemesFailed { .. }));
        assert!(err.to_string().contains("0x-hex"));
    }

    #[test]
    fn odd_hex_falls_back_to_base58() {
        // "abc" is odd-length hex but valid base58.
        let expected = bs58::decode("abc").into_vec().unwrap();
        assert_eq!(decode_key("zabc").unwrap(), expected);
    }

    #[test]
    fn both_schemes_fail_reports_both() {
        // '0' is not in the base58 alphabet and the length is odd.
        let err = decode_key("z012").unwrap_err();
        match &err {
            CodecError::AllSchemesFailed { attempts } => {
                let schemes: Vec<Scheme> = attempts.iter().map(|(s, _)| *s).collect();
                assert_eq!(schemes, vec![Scheme::MultibaseHex, Scheme::Base58Btc]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("hex"));
        assert!(message.contains("base58btc"));
    }

    #[test]
    fn key_without_prefix_is_rejected() {
        assert_eq!(
            decode_key("Qm123").unwrap_err(),
            CodecError::MissingPrefix { expected: 'z' }
        );
        assert_eq!(decode_key("").unwrap_err(), CodecError::Empty);
        assert_eq!(decode_key("z").unwrap_err(), CodecError::Empty);
    }

    #[test]
    fn base64_signature() {
        assert_eq!(decode_signature("AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_signature("AQIDBA==").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(decode_signature("AQIDBA").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(decode_signature(&encode_base64(&FIXTURE)).unwrap(), FIXTURE);
    }

    #[test]
    fn bad_signatures_name_their_scheme() {
        let err = decode_signature("not base64!").unwrap_err();
        assert!(matches!(
            err,
            CodecError::Decode {
                scheme: Scheme::Base64,
                ..
            }
        ));
        let err = decode_signature("z0OIl").unwrap_err();
        assert!(matches!(
            err,
            CodecError::Decode {
                scheme: Scheme::Base58Btc,
                ..
            }
        ));
    }
}
