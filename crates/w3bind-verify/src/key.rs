//! P-256 public-key import and ECDSA verification.

use p256::ecdsa::signature::Verifier as _;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;

/// Imports a P-256 public key from SPKI DER, falling back to a raw SEC1
/// point.
pub fn import_public_key(bytes: &[u8]) -> Option<VerifyingKey> {
    VerifyingKey::from_public_key_der(bytes)
        .ok()
        .or_else(|| VerifyingKey::from_sec1_bytes(bytes).ok())
}

/// Checks an ECDSA/SHA-256 signature over `payload`.
///
/// `signature` is either the 64-byte `r || s` form wallets produce or a DER
/// encoding.
pub fn verify_p256(key: &VerifyingKey, payload: &[u8], signature: &[u8]) -> bool {
    let parsed = Signature::from_slice(signature).or_else(|_| Signature::from_der(signature));
    match parsed {
        Ok(sig) => key.verify(payload, &sig).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer as _;
    use p256::ecdsa::SigningKey;
    use p256::pkcs8::EncodePublicKey;

    #[test]
    fn spki_and_sec1_both_import() {
        let signing = SigningKey::random(&mut rand::rngs::OsRng);
        let verifying = signing.verifying_key();

        let der = verifying.to_public_key_der().unwrap();
        assert_eq!(import_public_key(der.as_bytes()).as_ref(), Some(verifying));

        let sec1 = verifying.to_encoded_point(false);
        assert_eq!(import_public_key(sec1.as_bytes()).as_ref(), Some(verifying));

        assert!(import_public_key(&[1, 2, 3]).is_none());
    }

    #[test]
    fn raw_and_der_signatures_verify() {
        let signing = SigningKey::random(&mut rand::rngs::OsRng);
        let sig: Signature = signing.sign(b"hello");

        assert!(verify_p256(signing.verifying_key(), b"hello", &sig.to_bytes()));
        assert!(verify_p256(signing.verifying_key(), b"hello", sig.to_der().as_bytes()));
        assert!(!verify_p256(signing.verifying_key(), b"other", &sig.to_bytes()));
        assert!(!verify_p256(signing.verifying_key(), b"hello", &[0u8; 10]));
    }
}
