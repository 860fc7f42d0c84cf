//! Cryptographic operations for API keys and webhook payloads.
//!
//! - API key generation (typed prefix + base62 suffix) and keyed hashing
//! - HMAC-SHA256 payload signatures (`sha256=<hex>`)
//! - AES-256-GCM encryption/decryption for webhook secrets at rest

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::GatewayError;
use crate::models::ApiKeyType;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Length of the random base62 portion of a raw API key.
///
/// 43 characters over a 62-symbol alphabet carry just over 256 bits of
/// entropy, the base62 rendering of 32 random bytes.
pub const API_KEY_SUFFIX_LENGTH: usize = 43;

/// Length of a webhook signing secret in random bytes (hex-encoded for use).
pub const WEBHOOK_SECRET_BYTES: usize = 32;

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// API key material
// ---------------------------------------------------------------------------

/// Generate a new raw API key: `prefix(type)` + base62 suffix.
///
/// The plaintext key is shown once at creation and never persisted; only the
/// keyed hash is stored.
///
/// SECURITY: Uses `OsRng` directly from the operating system's CSPRNG.
pub fn generate_raw_key(key_type: ApiKeyType) -> String {
    use rand::distributions::Alphanumeric;
    use rand::rngs::OsRng;
    use rand::Rng;

    let suffix: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(API_KEY_SUFFIX_LENGTH)
        .map(char::from)
        .collect();

    format!("{}{suffix}", key_type.prefix())
}

/// Compute the keyed hash of a raw API key for storage and lookup.
///
/// HMAC-SHA256 under the server key secret, so a leaked key table cannot be
/// verified against without the secret. Returned hex-encoded.
pub fn hash_api_key(server_secret: &[u8], raw_key: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(server_secret)
        .expect("HMAC can take key of any size");
    mac.update(raw_key.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Generate a per-webhook signing secret (32 random bytes, hex-encoded).
pub fn generate_webhook_secret() -> String {
    use rand::rngs::OsRng;
    use rand::RngCore;

    let mut bytes = [0u8; WEBHOOK_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ---------------------------------------------------------------------------
// HMAC-SHA256 payload signing
// ---------------------------------------------------------------------------

/// Sign a delivery payload: `"sha256=" + hex(HMAC-SHA256(secret, body))`.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a payload signature using constant-time comparison.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let computed = sign_payload(secret, body);
    constant_time_eq(signature.as_bytes(), computed.as_bytes())
}

/// Constant-time byte comparison to prevent timing side-channels.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

// ---------------------------------------------------------------------------
// AES-256-GCM encryption for webhook secrets at rest
// ---------------------------------------------------------------------------

/// Encrypt a webhook secret to a base64 string for storage.
///
/// Format: base64(nonce || ciphertext || auth_tag)
pub fn encrypt_secret(plaintext: &str, key: &[u8]) -> Result<String, GatewayError> {
    if key.len() != 32 {
        return Err(GatewayError::Internal(format!(
            "Invalid encryption key length: expected 32 bytes, got {}",
            key.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    use rand::rngs::OsRng;
    use rand::RngCore;
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&result))
}

/// Decrypt a stored webhook secret back to plaintext.
pub fn decrypt_secret(encoded: &str, key: &[u8]) -> Result<String, GatewayError> {
    if key.len() != 32 {
        return Err(GatewayError::Internal(format!(
            "Invalid encryption key length: expected 32 bytes, got {}",
            key.len()
        )));
    }

    let encrypted = BASE64
        .decode(encoded)
        .map_err(|e| GatewayError::Internal(format!("Base64 decode failed: {e}")))?;

    if encrypted.len() < NONCE_SIZE + 1 {
        return Err(GatewayError::Internal(
            "Invalid encrypted secret format".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let nonce = Nonce::from_slice(&encrypted[..NONCE_SIZE]);
    let plaintext = cipher
        .decrypt(nonce, &encrypted[NONCE_SIZE..])
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| GatewayError::Internal(e.to_string()))
}
