//! Feeding configuration files into a [`Store`].

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use strata_core::{ConfigFormat, Result, StrataError};
use tracing::debug;

use crate::crypto::{self, AesReader};
use crate::options::LoadOptions;
use crate::store::Store;

/// How a file's content lands in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Discard the config layer and repopulate it from the file.
    Replace,
    /// Overlay the file onto the config layer.
    Merge,
}

/// Load one file into `store`, decrypting it first when the options mark it
/// as encrypted. Every error names `path`.
pub fn load_one(store: &mut Store, options: &LoadOptions, path: &Path, mode: LoadMode) -> Result<()> {
    let bytes = read_source(options, path)?;
    let format = ConfigFormat::from_path(path, options.encrypted_suffix())?;

    match mode {
        LoadMode::Replace => store.read_config(&bytes, format),
        LoadMode::Merge => store.merge_config(&bytes, format),
    }
    .map_err(|e| e.at(path))
}

/// Merge `chain` into `store` deepest include first, so the entry file
/// (`chain[0]`) is applied last and wins on conflicting keys.
///
/// Stops at the first failing file; files merged before it stay merged.
pub fn merge_chain(store: &mut Store, options: &LoadOptions, chain: &[PathBuf]) -> Result<()> {
    for path in chain.iter().rev() {
        load_one(store, options, path, LoadMode::Merge)?;
        debug!(file = %path.display(), "merged config file");
    }
    Ok(())
}

/// Open `path`, insisting on a regular file.
pub fn open_regular(path: &Path) -> Result<File> {
    let metadata = std::fs::metadata(path).map_err(|e| StrataError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(StrataError::NotAFile {
            path: path.to_path_buf(),
        });
    }
    File::open(path).map_err(|e| StrataError::from_io(path, e))
}

fn read_source(options: &LoadOptions, path: &Path) -> Result<Vec<u8>> {
    let file = open_regular(path)?;

    let mut reader: Box<dyn Read> = match options.aes_key() {
        Some(key) if crypto::is_encrypted(options, path) => {
            Box::new(AesReader::new(file, key).map_err(|e| e.at(path))?)
        }
        _ => Box::new(file),
    };

    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| StrataError::from_io(path, e))?;
    Ok(bytes)
}
