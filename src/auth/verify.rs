//! Wallet signature verification.
//!
//! Wallets sign an EIP-4361 style message with EIP-191 `personal_sign`.
//! The signer's address is recovered from the secp256k1 signature and
//! compared with the claimed wallet.

use super::nonce::{NonceError, NonceStore};
use crate::models::VerifyRequest;
use chrono::{DateTime, Utc};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

/// Length of an `0x`-prefixed 20-byte address.
pub const ADDRESS_LEN: usize = 42;

/// Length of an `r || s || v` signature in bytes.
pub const SIGNATURE_BYTES: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// The request itself is unusable (400).
    #[error("{0}")]
    Malformed(String),

    /// The request is well-formed but does not prove wallet ownership (401).
    #[error("{0}")]
    Rejected(String),
}

/// A verification request whose fields were all present and well-formed.
#[derive(Debug)]
pub struct SignedMessage<'a> {
    pub wallet: &'a str,
    pub signature: [u8; SIGNATURE_BYTES],
    pub message: &'a str,
    pub nonce: &'a str,
}

fn required<'a>(field: &'a Option<String>) -> Option<&'a str> {
    field.as_deref().filter(|v| !v.is_empty())
}

/// Check that `wallet` is `0x` followed by 40 hex digits.
pub fn validate_wallet(wallet: &str) -> Result<(), VerifyError> {
    if !wallet.starts_with("0x")
        || wallet.len() != ADDRESS_LEN
        || !wallet[2..].chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(VerifyError::Malformed("Invalid wallet address".to_string()));
    }
    Ok(())
}

/// Decode an `0x`-prefixed 65-byte hex signature.
pub fn parse_signature(signature: &str) -> Result<[u8; SIGNATURE_BYTES], VerifyError> {
    let hex_part = signature
        .strip_prefix("0x")
        .ok_or_else(|| VerifyError::Malformed("Invalid signature format".to_string()))?;

    let bytes = hex::decode(hex_part)
        .map_err(|_| VerifyError::Malformed("Invalid signature format".to_string()))?;

    bytes
        .try_into()
        .map_err(|_| VerifyError::Malformed("Invalid signature length".to_string()))
}

/// Check presence and format of every field.
///
/// Any missing field wins over format problems in the others.
pub fn validate_request(req: &VerifyRequest) -> Result<SignedMessage<'_>, VerifyError> {
    let (Some(wallet), Some(signature), Some(message), Some(nonce)) = (
        required(&req.wallet),
        required(&req.signature),
        required(&req.message),
        required(&req.nonce),
    ) else {
        return Err(VerifyError::Malformed("Missing required fields".to_string()));
    };

    validate_wallet(wallet)?;
    let signature = parse_signature(signature)?;

    Ok(SignedMessage {
        wallet,
        signature,
        message,
        nonce,
    })
}

/// Extract the value of the `Nonce:` line of a sign-in message.
pub fn message_nonce(message: &str) -> Option<&str> {
    message
        .lines()
        .find_map(|line| line.trim().strip_prefix("Nonce:"))
        .map(str::trim)
}

/// EIP-191 hash of a `personal_sign` message.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Checksum-free `0x` address of a public key.
pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Recover the signer address of a `personal_sign` signature.
pub fn recover_address(
    message: &[u8],
    signature: &[u8; SIGNATURE_BYTES],
) -> Result<String, VerifyError> {
    let invalid = || VerifyError::Rejected("Invalid signature".to_string());

    let v = match signature[64] {
        27 | 28 => signature[64] - 27,
        0 | 1 => signature[64],
        _ => return Err(invalid()),
    };
    let mut recovery_id = RecoveryId::from_byte(v).ok_or_else(invalid)?;
    let mut sig = Signature::from_slice(&signature[..64]).map_err(|_| invalid())?;

    // k256 only accepts low-s signatures; flipping s flips the y parity.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let hash = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&hash, &sig, recovery_id).map_err(|_| invalid())?;
    Ok(address_of(&key))
}

/// Verify a sign-in request and consume its nonce.
///
/// Returns the verified wallet address as submitted.
pub fn verify_signed_message(
    nonces: &NonceStore,
    req: &VerifyRequest,
    now: DateTime<Utc>,
) -> Result<String, VerifyError> {
    let signed = validate_request(req)?;

    if message_nonce(signed.message) != Some(signed.nonce) {
        return Err(VerifyError::Rejected(
            "Message does not contain the nonce".to_string(),
        ));
    }

    // Consumed before the signature check: a nonce gets exactly one attempt.
    nonces.consume(signed.nonce, now).map_err(|e| match e {
        NonceError::NotFound | NonceError::Expired => {
            VerifyError::Rejected("Nonce not found or expired".to_string())
        }
        NonceError::AlreadyUsed => VerifyError::Rejected("Nonce already used".to_string()),
    })?;

    let recovered = recover_address(signed.message.as_bytes(), &signed.signature)?;
    if !recovered.eq_ignore_ascii_case(signed.wallet) {
        return Err(VerifyError::Rejected("Invalid signature".to_string()));
    }

    Ok(signed.wallet.to_string())
}

/// Produce a `personal_sign` signature (`0x` + hex of `r || s || v`, with
/// `v` in 27/28).
pub fn sign_personal_message(key: &SigningKey, message: &str) -> Result<String, VerifyError> {
    let hash = personal_message_hash(message.as_bytes());
    let (sig, recid) = key
        .sign_prehash_recoverable(&hash)
        .map_err(|e| VerifyError::Rejected(format!("Signing failed: {}", e)))?;

    let mut bytes = sig.to_bytes().to_vec();
    bytes.push(27 + recid.to_byte());
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Sign-in message in EIP-4361 layout.
pub fn sign_in_message(domain: &str, wallet: &str, nonce: &str, issued_at: DateTime<Utc>) -> String {
    format!(
        "{domain} wants you to sign in with your Ethereum account:\n\
         {wallet}\n\
         \n\
         Sign in to fund campaigns.\n\
         \n\
         URI: https://{domain}\n\
         Version: 1\n\
         Chain ID: 1\n\
         Nonce: {nonce}\n\
         Issued At: {}",
        issued_at.to_rfc3339()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_signing_key() -> SigningKey {
        loop {
            let mut seed = [0u8; 32];
            rand::fill(&mut seed);
            if let Ok(key) = SigningKey::from_slice(&seed) {
                return key;
            }
        }
    }

    fn sign(key: &SigningKey, message: &str) -> String {
        sign_personal_message(key, message).unwrap()
    }

    fn signed_request(store: &NonceStore, now: DateTime<Utc>) -> (SigningKey, VerifyRequest) {
        let key = test_signing_key();
        let wallet = address_of(key.verifying_key());
        let nonce = store.issue(now);
        let message = sign_in_message("fund.example", &wallet, &nonce, now);
        let signature = sign(&key, &message);
        let req = VerifyRequest {
            wallet: Some(wallet),
            signature: Some(signature),
            message: Some(message),
            nonce: Some(nonce),
        };
        (key, req)
    }

    fn store() -> NonceStore {
        NonceStore::new(Duration::minutes(5))
    }

    #[test]
    fn test_personal_message_hash_known_vector() {
        // keccak256("\x19Ethereum Signed Message:\n11hello world")
        assert_eq!(
            hex::encode(personal_message_hash(b"hello world")),
            "d9eba16ed0ecae432b71fe008c98cc872bb4cc214d3220a36f365326cf807d68"
        );
    }

    #[test]
    fn test_address_of_known_key() {
        // Private key 1 maps to this well-known address.
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let key = SigningKey::from_slice(&secret).unwrap();
        assert_eq!(
            address_of(key.verifying_key()),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_verify_valid_signature() {
        let store = store();
        let now = Utc::now();
        let (_, req) = signed_request(&store, now);

        let wallet = verify_signed_message(&store, &req, now).unwrap();
        assert_eq!(Some(wallet), req.wallet);
    }

    #[test]
    fn test_verify_accepts_checksummed_wallet() {
        let store = store();
        let now = Utc::now();
        let (_, mut req) = signed_request(&store, now);
        let wallet = req.wallet.take().unwrap();
        req.wallet = Some(format!("0x{}", wallet[2..].to_uppercase()));

        assert!(verify_signed_message(&store, &req, now).is_ok());
    }

    #[test]
    fn test_verify_consumes_nonce() {
        let store = store();
        let now = Utc::now();
        let (_, req) = signed_request(&store, now);

        assert!(verify_signed_message(&store, &req, now).is_ok());
        assert_eq!(
            verify_signed_message(&store, &req, now),
            Err(VerifyError::Rejected("Nonce already used".to_string()))
        );
    }

    #[test]
    fn test_verify_rejects_wrong_signer() {
        let store = store();
        let now = Utc::now();
        let (_, mut req) = signed_request(&store, now);
        let other = test_signing_key();
        req.signature = Some(sign(&other, req.message.as_deref().unwrap()));

        assert_eq!(
            verify_signed_message(&store, &req, now),
            Err(VerifyError::Rejected("Invalid signature".to_string()))
        );
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let store = store();
        let now = Utc::now();
        let (_, mut req) = signed_request(&store, now);
        let tampered = req
            .message
            .as_deref()
            .unwrap()
            .replace("Sign in to fund campaigns.", "Transfer everything.");
        req.message = Some(tampered);

        assert!(matches!(
            verify_signed_message(&store, &req, now),
            Err(VerifyError::Rejected(_))
        ));
    }

    #[test]
    fn test_verify_rejects_unknown_nonce() {
        let store = store();
        let now = Utc::now();
        let key = test_signing_key();
        let wallet = address_of(key.verifying_key());
        let nonce = "f".repeat(64);
        let message = sign_in_message("fund.example", &wallet, &nonce, now);
        let req = VerifyRequest {
            signature: Some(sign(&key, &message)),
            wallet: Some(wallet),
            message: Some(message),
            nonce: Some(nonce),
        };

        assert_eq!(
            verify_signed_message(&store, &req, now),
            Err(VerifyError::Rejected("Nonce not found or expired".to_string()))
        );
    }

    #[test]
    fn test_verify_rejects_expired_nonce() {
        let store = store();
        let now = Utc::now();
        let (_, req) = signed_request(&store, now);

        assert_eq!(
            verify_signed_message(&store, &req, now + Duration::minutes(5)),
            Err(VerifyError::Rejected("Nonce not found or expired".to_string()))
        );
    }

    #[test]
    fn test_verify_rejects_message_with_other_nonce() {
        let store = store();
        let now = Utc::now();
        let (_, mut req) = signed_request(&store, now);
        req.nonce = Some(store.issue(now));

        assert_eq!(
            verify_signed_message(&store, &req, now),
            Err(VerifyError::Rejected(
                "Message does not contain the nonce".to_string()
            ))
        );
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let complete = VerifyRequest {
            wallet: Some("not-a-wallet".to_string()),
            signature: Some("not-a-signature".to_string()),
            message: Some("m".to_string()),
            nonce: Some("n".to_string()),
        };

        for field in 0..4 {
            let mut req = complete.clone();
            match field {
                0 => req.wallet = None,
                1 => req.signature = Some(String::new()),
                2 => req.message = None,
                _ => req.nonce = Some(String::new()),
            }
            assert_eq!(
                validate_request(&req).unwrap_err(),
                VerifyError::Malformed("Missing required fields".to_string())
            );
        }
    }

    #[test]
    fn test_validate_wallet() {
        assert!(validate_wallet("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf").is_ok());
        assert!(validate_wallet("7e5f4552091a69125d5dfcb7b8c2659029395bdf00").is_err());
        assert!(validate_wallet("0x7e5f4552091a69125d5dfcb7b8c2659029395bd").is_err());
        assert!(validate_wallet("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf0").is_err());
        assert!(validate_wallet("0xzz5f4552091a69125d5dfcb7b8c2659029395bdf").is_err());
    }

    #[test]
    fn test_parse_signature() {
        let good = format!("0x{}", "ab".repeat(65));
        assert!(parse_signature(&good).is_ok());
        assert!(parse_signature(&"ab".repeat(65)).is_err());
        assert!(parse_signature(&format!("0x{}", "ab".repeat(64))).is_err());
        assert!(parse_signature("0xnothex").is_err());
    }

    #[test]
    fn test_recover_rejects_bad_recovery_byte() {
        let mut signature = [1u8; SIGNATURE_BYTES];
        signature[64] = 5;
        assert!(matches!(
            recover_address(b"hello", &signature),
            Err(VerifyError::Rejected(_))
        ));
    }

    #[test]
    fn test_message_nonce() {
        let message = "example.com wants you to sign in\n0xabc\n\nNonce: 1234abcd\nIssued At: now";
        assert_eq!(message_nonce(message), Some("1234abcd"));
        assert_eq!(message_nonce("no nonce here"), None);
    }
}
