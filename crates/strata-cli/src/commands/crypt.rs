//! `strata encrypt` / `strata decrypt`.

use std::path::{Path, PathBuf};

use strata_config::crypto;
use strata_core::{Result, StrataError};
use tracing::info;

pub(super) fn cmd_encrypt(
    key: Option<&str>,
    suffix: &str,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let key = require_key(key)?;
    let output = match output {
        Some(path) => path,
        None => sealed_name(input, suffix)?,
    };

    let plain = std::fs::read(input).map_err(|e| StrataError::from_io(input, e))?;
    let sealed = crypto::encrypt(key.as_bytes(), &plain)?;
    std::fs::write(&output, sealed).map_err(|e| StrataError::from_io(&output, e))?;

    info!(input = %input.display(), output = %output.display(), "encrypted config file");
    println!("{}", output.display());
    Ok(())
}

pub(super) fn cmd_decrypt(
    key: Option<&str>,
    suffix: &str,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let key = require_key(key)?;
    let output = match output {
        Some(path) => path,
        None => opened_name(input, suffix)?,
    };

    let sealed = std::fs::read(input).map_err(|e| StrataError::from_io(input, e))?;
    let plain = crypto::decrypt(key.as_bytes(), &sealed).map_err(|e| e.at(input))?;
    std::fs::write(&output, plain).map_err(|e| StrataError::from_io(&output, e))?;

    info!(input = %input.display(), output = %output.display(), "decrypted config file");
    println!("{}", output.display());
    Ok(())
}

fn require_key(key: Option<&str>) -> Result<&str> {
    key.filter(|k| !k.is_empty()).ok_or_else(|| {
        StrataError::InvalidOption("an AES key is required (--aes-key or STRATA_AES_KEY)".into())
    })
}

/// `settings.yml` -> `settings.yml.enc`
fn sealed_name(input: &Path, suffix: &str) -> Result<PathBuf> {
    if suffix.is_empty() {
        return Err(StrataError::InvalidOption(
            "encrypted suffix is empty; pass --output".into(),
        ));
    }
    let mut name = input.as_os_str().to_owned();
    name.push(suffix);
    Ok(PathBuf::from(name))
}

/// `settings.yml.enc` -> `settings.yml`
fn opened_name(input: &Path, suffix: &str) -> Result<PathBuf> {
    let raw = input.to_string_lossy();
    match raw.strip_suffix(suffix) {
        Some(stripped) if !suffix.is_empty() && !stripped.is_empty() => {
            Ok(PathBuf::from(stripped))
        }
        _ => Err(StrataError::InvalidOption(format!(
            "{} does not end with {suffix:?}; pass --output",
            input.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef";

    #[test]
    fn test_default_output_names() {
        assert_eq!(
            sealed_name(Path::new("conf/settings.yml"), ".enc").unwrap(),
            PathBuf::from("conf/settings.yml.enc")
        );
        assert_eq!(
            opened_name(Path::new("conf/settings.yml.enc"), ".enc").unwrap(),
            PathBuf::from("conf/settings.yml")
        );
        assert!(opened_name(Path::new("settings.yml"), ".enc").is_err());
        assert!(sealed_name(Path::new("settings.yml"), "").is_err());
    }

    #[test]
    fn test_encrypt_then_decrypt_files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("settings.yml");
        std::fs::write(&plain, "password: hunter2\n").unwrap();

        cmd_encrypt(Some(KEY), ".enc", &plain, None).unwrap();
        let sealed = dir.path().join("settings.yml.enc");
        assert_ne!(std::fs::read(&sealed).unwrap(), b"password: hunter2\n");

        let restored = dir.path().join("restored.yml");
        cmd_decrypt(Some(KEY), ".enc", &sealed, Some(restored.clone())).unwrap();
        assert_eq!(std::fs::read_to_string(restored).unwrap(), "password: hunter2\n");
    }

    #[test]
    fn test_decrypt_with_wrong_key_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let sealed = dir.path().join("settings.yml.enc");
        std::fs::write(&sealed, crypto::encrypt(KEY.as_bytes(), b"a: 1\n").unwrap()).unwrap();

        let err = cmd_decrypt(Some("fedcba9876543210"), ".enc", &sealed, None).unwrap_err();
        match err {
            StrataError::Decrypt { path, .. } => assert_eq!(path, sealed),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_key() {
        let err = cmd_encrypt(None, ".enc", Path::new("settings.yml"), None).unwrap_err();
        assert!(matches!(err, StrataError::InvalidOption(_)));
    }
}
