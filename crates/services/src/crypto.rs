use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("encryption error: {0}")]
    Encryption(String),
    #[error("decryption error: {0}")]
    Decryption(String),
}

/// AES-256-GCM codec for chat payloads at rest. Wire format is
/// base64(nonce || ciphertext) with a random 12-byte nonce per
/// message. The key is mandatory configuration; there is deliberately
/// no generate-on-boot fallback, which would orphan all history on
/// restart.
pub struct MessageCodec {
    cipher: Aes256Gcm,
}

impl MessageCodec {
    /// Builds the codec from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::new(&bytes)
    }

    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "expected a 32-byte key, got {} bytes",
                key.len()
            )));
        }
        let key = Key::<Aes256Gcm>::clone_from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(&key),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut rng = rand::rng();
        let nonce_bytes: [u8; 12] = rng.random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);
        Ok(BASE64.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let data = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;

        if data.len() < 12 {
            return Err(CryptoError::Decryption("truncated payload".to_string()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Decryption(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(seed: u8) -> MessageCodec {
        MessageCodec::new(&[seed; 32]).unwrap()
    }

    #[test]
    fn round_trip() {
        let c = codec(1);
        let sealed = c.encrypt("hello room").unwrap();
        assert_ne!(sealed, "hello room");
        assert_eq!(c.decrypt(&sealed).unwrap(), "hello room");
    }

    #[test]
    fn round_trip_large_unicode() {
        let c = codec(2);
        let msg: String = "мпорevent🎤日本語 ".repeat(500).chars().take(5000).collect();
        assert_eq!(msg.chars().count(), 5000);
        let sealed = c.encrypt(&msg).unwrap();
        assert_eq!(c.decrypt(&sealed).unwrap(), msg);
    }

    #[test]
    fn rotated_key_fails_cleanly() {
        let sealed = codec(1).encrypt("secret").unwrap();
        assert!(matches!(
            codec(9).decrypt(&sealed),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn rejects_short_key() {
        assert!(MessageCodec::new(&[0u8; 16]).is_err());
    }

    #[test]
    fn rejects_garbage_payload() {
        assert!(codec(1).decrypt("not base64 at all!!").is_err());
        assert!(codec(1).decrypt("AAAA").is_err());
    }
}
