//! API key storage with optional password-based encryption.
//!
//! Encrypted values carry the `enc:` prefix followed by base64 of
//! `nonce || ciphertext` (AES-256-GCM). The key is derived from the user's
//! password with PBKDF2-HMAC-SHA256.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{KaocheError, Result};

pub const ENCRYPTED_PREFIX: &str = "enc:";
const SALT: &[u8] = b"kaoche_pro_salt_2024";
const PBKDF2_ROUNDS: u32 = 100_000;
const NONCE_LEN: usize = 12;
const CHECK_PLAINTEXT: &str = "kaoche-password-check";

/// Symmetric cipher bound to one password
pub struct KeyCipher {
    cipher: Aes256Gcm,
}

impl KeyCipher {
    pub fn new(password: &str) -> Self {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), SALT, PBKDF2_ROUNDS, &mut key);
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| KaocheError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut payload = nonce_bytes.to_vec();
        payload.extend_from_slice(&ciphertext);
        Ok(format!("{}{}", ENCRYPTED_PREFIX, STANDARD.encode(payload)))
    }

    pub fn decrypt(&self, value: &str) -> Result<String> {
        let encoded = value.strip_prefix(ENCRYPTED_PREFIX).ok_or_else(|| {
            KaocheError::Crypto("Value is not encrypted".to_string())
        })?;
        let payload = STANDARD
            .decode(encoded)
            .map_err(|e| KaocheError::Crypto(format!("Invalid encrypted value: {}", e)))?;
        if payload.len() <= NONCE_LEN {
            return Err(KaocheError::Crypto("Encrypted value too short".to_string()));
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| KaocheError::Crypto("Wrong password or corrupted key".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| KaocheError::Crypto(format!("Decrypted key is not UTF-8: {}", e)))
    }
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

fn reveal(value: &str, password: Option<&str>) -> Result<String> {
    if !is_encrypted(value) {
        return Ok(value.to_string());
    }
    let password = password.ok_or_else(|| {
        KaocheError::Crypto("API key is encrypted, a password is required".to_string())
    })?;
    KeyCipher::new(password).decrypt(value)
}

/// Resolve the key for a provider: provider entry first, then the shared key
pub fn get_api_key(config: &Config, password: Option<&str>, provider_id: Option<&str>) -> Result<String> {
    if let Some(id) = provider_id {
        if let Some(value) = config.api.keys.get(id).filter(|v| !v.is_empty()) {
            return reveal(value, password);
        }
    }
    reveal(&config.api.api_key, password)
}

/// Store a key, encrypting it when encryption is enabled
pub fn set_api_key(
    config: &mut Config,
    key: &str,
    password: Option<&str>,
    provider_id: Option<&str>,
) -> Result<()> {
    let stored = if config.encryption.enabled {
        let password = password.ok_or_else(|| {
            KaocheError::Crypto("Encryption is enabled, a password is required".to_string())
        })?;
        if !verify_password(config, password) {
            return Err(KaocheError::Crypto("Wrong password".to_string()));
        }
        KeyCipher::new(password).encrypt(key)?
    } else {
        key.to_string()
    };

    match provider_id {
        Some(id) => {
            config.api.keys.insert(id.to_string(), stored);
        }
        None => config.api.api_key = stored,
    }
    Ok(())
}

pub fn verify_password(config: &Config, password: &str) -> bool {
    match &config.encryption.check {
        Some(check) => KeyCipher::new(password)
            .decrypt(check)
            .map(|plain| plain == CHECK_PLAINTEXT)
            .unwrap_or(false),
        None => !config.encryption.enabled,
    }
}

/// Encrypt every stored key and remember a password verifier
pub fn enable_encryption(config: &mut Config, password: &str) -> Result<()> {
    if config.encryption.enabled {
        warn!("Encryption already enabled");
        return Ok(());
    }

    let cipher = KeyCipher::new(password);
    if !config.api.api_key.is_empty() && !is_encrypted(&config.api.api_key) {
        config.api.api_key = cipher.encrypt(&config.api.api_key)?;
    }
    for value in config.api.keys.values_mut() {
        if !value.is_empty() && !is_encrypted(value) {
            *value = cipher.encrypt(value)?;
        }
    }

    config.encryption.check = Some(cipher.encrypt(CHECK_PLAINTEXT)?);
    config.encryption.enabled = true;
    info!("API key encryption enabled");
    Ok(())
}

/// Decrypt every stored key back to plain text
pub fn disable_encryption(config: &mut Config, password: &str) -> Result<()> {
    if !config.encryption.enabled {
        return Ok(());
    }
    if !verify_password(config, password) {
        return Err(KaocheError::Crypto("Wrong password".to_string()));
    }

    let cipher = KeyCipher::new(password);
    if is_encrypted(&config.api.api_key) {
        config.api.api_key = cipher.decrypt(&config.api.api_key)?;
    }
    for value in config.api.keys.values_mut() {
        if is_encrypted(value) {
            *value = cipher.decrypt(value)?;
        }
    }

    config.encryption.enabled = false;
    config.encryption.check = None;
    info!("API key encryption disabled");
    Ok(())
}
