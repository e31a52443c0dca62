// Copyright (c) 2024-2025 Peter Szrnka
// Licensed under the MIT License. See LICENSE file for details.

//! Encrypted local store.
//!
//! Small string values (remembered usernames, UI preferences, the keystore
//! decryption hint) are encrypted with AES-256-GCM before they are written
//! to a JSON document on disk. This is session-convenience data, not a
//! security boundary that must fail closed: a missing key and an
//! undecryptable value both read back as the empty string.
//!
//! Each write uses a fresh random nonce, so encrypting the same plaintext
//! twice yields different ciphertext while always decrypting back to the
//! original.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Context, Result};
use base64::Engine;
use rand::RngCore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Nonce size for AES-256-GCM (96 bits).
const NONCE_SIZE: usize = 12;

/// File name of the persisted key/value document.
const STORE_FILE: &str = "secure-store.json";

/// File name of the generated store key.
const KEY_FILE: &str = "store.key";

/// Store key under which the last successfully used username is kept.
const LAST_USERNAME_KEY: &str = "last-username";

/// Encrypted key/value store persisted on disk.
pub struct SecureStorage {
    key: [u8; 32],
    store_path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl SecureStorage {
    /// Open the store in the given directory with an explicit key.
    ///
    /// The directory is created if needed; an existing store document is
    /// loaded. A document that cannot be parsed is treated as empty rather
    /// than reported, consistent with the degrade-to-default policy.
    pub fn open_with_key(dir: &Path, key: [u8; 32]) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        }

        let store_path = dir.join(STORE_FILE);
        let entries = match fs::read_to_string(&store_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable store document: {}", e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Ok(Self {
            key,
            store_path,
            entries,
        })
    }

    /// Open the store in the given directory, generating and persisting a
    /// key on first use.
    pub fn open(dir: &Path) -> Result<Self> {
        let key_path = dir.join(KEY_FILE);
        let key = if key_path.exists() {
            Self::load_key(&key_path)?
        } else {
            if !dir.exists() {
                fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create storage directory {}", dir.display())
                })?;
            }
            Self::generate_key(&key_path)?
        };
        Self::open_with_key(dir, key)
    }

    /// Open the store in the default location (`~/.gms-console`).
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::open(&home.join(".gms-console"))
    }

    fn load_key(path: &Path) -> Result<[u8; 32]> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read store key {}", path.display()))?;
        if bytes.len() != 32 {
            anyhow::bail!("Store key must be exactly 32 bytes, got {}", bytes.len());
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(key)
    }

    fn generate_key(path: &Path) -> Result<[u8; 32]> {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        fs::write(path, key)
            .with_context(|| format!("Failed to write store key {}", path.display()))?;
        Ok(key)
    }

    /// Encrypt `plaintext` and durably write it under `key`.
    pub fn set_item(&mut self, key: &str, plaintext: &str) -> Result<()> {
        let ciphertext = self.encrypt(plaintext)?;
        self.entries.insert(key.to_string(), ciphertext);
        self.flush()
    }

    /// Read and decrypt the value stored under `key`.
    ///
    /// Returns the empty string when the key is absent or the stored value
    /// cannot be decrypted. Decryption failures are logged but never
    /// surfaced to the caller.
    pub fn get_item(&self, key: &str) -> String {
        let Some(ciphertext) = self.entries.get(key) else {
            return String::new();
        };

        match self.decrypt(ciphertext) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!("Failed to decrypt stored value for '{}': {}", key, e);
                String::new()
            }
        }
    }

    /// Remove the value stored under `key`, if present.
    pub fn remove_item(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Drop every stored entry.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.flush()
    }

    /// Whether a value is stored under `key` (without decrypting it).
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remember the username of the last successful login.
    pub fn set_last_username(&mut self, username: &str) -> Result<()> {
        self.set_item(LAST_USERNAME_KEY, username)
    }

    /// The remembered username, or the empty string when none is stored
    /// (or it can no longer be decrypted).
    pub fn last_username(&self) -> String {
        self.get_item(LAST_USERNAME_KEY)
    }

    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| anyhow::anyhow!("AES cipher init failed: {e}"))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("AES encryption failed: {e}"))?;

        // Stored form: base64(nonce + ciphertext)
        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if combined.len() < NONCE_SIZE {
            anyhow::bail!("Ciphertext too short");
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| anyhow::anyhow!("AES cipher init failed: {e}"))?;

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("AES decryption failed: {e}"))?;

        String::from_utf8(plaintext).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in plaintext: {e}"))
    }

    fn flush(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.store_path, raw).with_context(|| {
            format!("Failed to write store document {}", self.store_path.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn test_missing_key_returns_empty_string() {
        let tmp = TempDir::new().unwrap();
        let store = SecureStorage::open_with_key(tmp.path(), test_key()).unwrap();

        assert_eq!(store.get_item("never-written"), "");
    }

    #[test]
    fn test_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut store = SecureStorage::open_with_key(tmp.path(), test_key()).unwrap();

        store.set_item("username", "admin@example.com").unwrap();
        assert_eq!(store.get_item("username"), "admin@example.com");
    }

    #[test]
    fn test_round_trip_empty_and_unicode() {
        let tmp = TempDir::new().unwrap();
        let mut store = SecureStorage::open_with_key(tmp.path(), test_key()).unwrap();

        store.set_item("empty", "").unwrap();
        store.set_item("unicode", "titkos érték 🔑").unwrap();

        assert_eq!(store.get_item("empty"), "");
        assert_eq!(store.get_item("unicode"), "titkos érték 🔑");
    }

    #[test]
    fn test_ciphertext_differs_across_writes() {
        let tmp = TempDir::new().unwrap();
        let mut store = SecureStorage::open_with_key(tmp.path(), test_key()).unwrap();

        store.set_item("a", "same-plaintext").unwrap();
        let first = store.entries.get("a").cloned().unwrap();

        store.set_item("a", "same-plaintext").unwrap();
        let second = store.entries.get("a").cloned().unwrap();

        // Fresh nonce per write
        assert_ne!(first, second);
        assert_eq!(store.get_item("a"), "same-plaintext");
    }

    #[test]
    fn test_corrupted_value_degrades_to_empty_string() {
        let tmp = TempDir::new().unwrap();
        let mut store = SecureStorage::open_with_key(tmp.path(), test_key()).unwrap();

        store.set_item("token", "value").unwrap();
        store
            .entries
            .insert("token".to_string(), "not-even-base64!!".to_string());

        assert_eq!(store.get_item("token"), "");
    }

    #[test]
    fn test_foreign_key_ciphertext_degrades_to_empty_string() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SecureStorage::open_with_key(tmp.path(), test_key()).unwrap();
        writer.set_item("token", "value").unwrap();

        // Same document, different key: decryption fails, reads as "".
        let reader = SecureStorage::open_with_key(tmp.path(), test_key()).unwrap();
        assert_eq!(reader.get_item("token"), "");
    }

    #[test]
    fn test_values_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let key = test_key();

        {
            let mut store = SecureStorage::open_with_key(tmp.path(), key).unwrap();
            store.set_item("remembered", "user-1").unwrap();
        }

        let store = SecureStorage::open_with_key(tmp.path(), key).unwrap();
        assert_eq!(store.get_item("remembered"), "user-1");
    }

    #[test]
    fn test_generated_key_survives_reopen() {
        let tmp = TempDir::new().unwrap();

        {
            let mut store = SecureStorage::open(tmp.path()).unwrap();
            store.set_item("k", "v").unwrap();
        }

        let store = SecureStorage::open(tmp.path()).unwrap();
        assert_eq!(store.get_item("k"), "v");
    }

    #[test]
    fn test_last_username_round_trip() {
        let tmp = TempDir::new().unwrap();
        let key = test_key();
        let mut store = SecureStorage::open_with_key(tmp.path(), key).unwrap();

        assert_eq!(store.last_username(), "");

        store.set_last_username("admin@example.com").unwrap();
        assert_eq!(store.last_username(), "admin@example.com");

        // Survives reopen, still encrypted at rest.
        let reopened = SecureStorage::open_with_key(tmp.path(), key).unwrap();
        assert_eq!(reopened.last_username(), "admin@example.com");
        assert_ne!(
            reopened.entries.get(LAST_USERNAME_KEY).unwrap(),
            "admin@example.com"
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let tmp = TempDir::new().unwrap();
        let mut store = SecureStorage::open_with_key(tmp.path(), test_key()).unwrap();

        store.set_item("a", "1").unwrap();
        store.set_item("b", "2").unwrap();

        store.remove_item("a").unwrap();
        assert_eq!(store.get_item("a"), "");
        assert!(store.contains("b"));

        store.clear().unwrap();
        assert_eq!(store.get_item("b"), "");
    }
}
