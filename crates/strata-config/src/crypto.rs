//! Encrypted configuration sources.
//!
//! An encrypted file holds a 12-byte nonce followed by the AES-GCM sealed
//! plaintext and tag. A 16-byte key selects AES-128-GCM, a 32-byte key
//! AES-256-GCM.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use ring::aead::{AES_128_GCM, AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use strata_core::{Result, StrataError};

use crate::options::LoadOptions;

/// Whether `path` must be decrypted before parsing: an AES key is configured
/// and the file name ends with the encrypted suffix. An empty suffix never
/// matches.
pub fn is_encrypted(options: &LoadOptions, path: &Path) -> bool {
    let Some(key) = options.aes_key() else {
        return false;
    };
    let suffix = options.encrypted_suffix();
    !key.is_empty() && !suffix.is_empty() && path.to_string_lossy().ends_with(suffix)
}

/// Plaintext view over an encrypted stream.
///
/// The whole ciphertext is read and authenticated up front, so a bad key or
/// a tampered file fails in [`AesReader::new`] rather than mid-read.
pub struct AesReader {
    plain: Cursor<Vec<u8>>,
}

impl AesReader {
    pub fn new(mut reader: impl Read, key: &[u8]) -> Result<Self> {
        let mut sealed = Vec::new();
        reader.read_to_end(&mut sealed)?;
        let plain = decrypt(key, &sealed)?;
        Ok(Self {
            plain: Cursor::new(plain),
        })
    }
}

impl Read for AesReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.plain.read(buf)
    }
}

/// Seal `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let key = sealing_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| decrypt_error("failed to generate nonce"))?;

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::empty(),
        &mut in_out,
    )
    .map_err(|_| decrypt_error("failed to seal plaintext"))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Open a nonce-prefixed AES-GCM payload.
pub fn decrypt(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    let key = sealing_key(key)?;
    if sealed.len() < NONCE_LEN + key.algorithm().tag_len() {
        return Err(decrypt_error("ciphertext is too short"));
    }

    let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| decrypt_error("malformed nonce"))?;

    let mut in_out = body.to_vec();
    let plain_len = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| decrypt_error("authentication failed (wrong key or corrupted file)"))?
        .len();
    in_out.truncate(plain_len);
    Ok(in_out)
}

/// Reject keys no AES-GCM variant accepts.
pub fn validate_key(key: &[u8]) -> Result<()> {
    match key.len() {
        0 => Err(StrataError::InvalidOption("aes key is empty".into())),
        16 | 32 => Ok(()),
        n => Err(StrataError::InvalidOption(format!(
            "aes key must be 16 or 32 bytes, got {n}"
        ))),
    }
}

fn sealing_key(key: &[u8]) -> Result<LessSafeKey> {
    validate_key(key)?;
    let algorithm = if key.len() == 16 {
        &AES_128_GCM
    } else {
        &AES_256_GCM
    };
    let unbound =
        UnboundKey::new(algorithm, key).map_err(|_| decrypt_error("rejected aes key"))?;
    Ok(LessSafeKey::new(unbound))
}

fn decrypt_error(reason: &str) -> StrataError {
    StrataError::Decrypt {
        path: PathBuf::new(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef";

    #[test]
    fn test_seal_then_open() {
        let sealed = encrypt(KEY, b"a: 1\n").unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"a: 1\n");

        let mut plain = String::new();
        AesReader::new(sealed.as_slice(), KEY)
            .unwrap()
            .read_to_string(&mut plain)
            .unwrap();
        assert_eq!(plain, "a: 1\n");
    }

    #[test]
    fn test_nonce_is_random() {
        let a = encrypt(KEY, b"same").unwrap();
        let b = encrypt(KEY, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt(KEY, b"secret: yes\n").unwrap();
        let err = AesReader::new(sealed.as_slice(), b"fedcba9876543210").err().unwrap();
        assert!(matches!(err, StrataError::Decrypt { .. }));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let err = decrypt(KEY, b"short").unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_validate_key_lengths() {
        assert!(validate_key(&[0u8; 16]).is_ok());
        assert!(validate_key(&[0u8; 32]).is_ok());
        assert!(matches!(validate_key(b""), Err(StrataError::InvalidOption(_))));
        assert!(matches!(validate_key(&[0u8; 24]), Err(StrataError::InvalidOption(_))));
    }

    #[test]
    fn test_is_encrypted_requires_key_and_suffix() {
        let plain = LoadOptions::new();
        assert!(!is_encrypted(&plain, Path::new("settings.yml.enc")));

        let keyed = LoadOptions::new().with_aes_key(KEY);
        assert!(is_encrypted(&keyed, Path::new("settings.yml.enc")));
        assert!(!is_encrypted(&keyed, Path::new("settings.yml")));

        let no_suffix = LoadOptions::new().with_aes_key(KEY).with_encrypted_suffix("");
        assert!(!is_encrypted(&no_suffix, Path::new("settings.yml.enc")));
        assert!(!is_encrypted(&no_suffix, Path::new("settings.yml")));

        let custom = LoadOptions::new().with_aes_key(KEY).with_encrypted_suffix(".sealed");
        assert!(is_encrypted(&custom, Path::new("db.toml.sealed")));
        assert!(!is_encrypted(&custom, Path::new("db.toml.enc")));
    }
}
