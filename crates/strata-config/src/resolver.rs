//! Include-chain resolution.
//!
//! A config file may name another file through its top-level `include` key;
//! that file may include a third, and so on. The chain is resolved
//! iteratively and stops at the first file without an include or at the
//! first include that points back into the chain.

use std::path::{Component, Path, PathBuf};

use strata_core::{Result, StrataError};
use tracing::warn;

use crate::loader::{self, LoadMode};
use crate::options::LoadOptions;
use crate::store::Store;

/// Key naming the next file of the chain.
pub const INCLUDE_KEY: &str = "include";

/// Walk the include chain starting at `entry`.
///
/// Returns absolute, normalized paths in discovery order, entry first, with
/// no duplicates. Include values are resolved against the entry file's
/// directory. Without [`LoadOptions::with_include`] the chain is just the
/// entry file.
pub fn resolve_chain(entry: &Path, options: &LoadOptions) -> Result<Vec<PathBuf>> {
    let entry = normalize(entry)?;
    let mut chain = vec![entry.clone()];
    if !options.include_enabled() {
        return Ok(chain);
    }

    let base_dir = entry.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut scratch = Store::new();
    let mut current = entry;

    loop {
        loader::load_one(&mut scratch, options, &current, LoadMode::Replace)?;

        let include = scratch.config_string(INCLUDE_KEY);
        if include.is_empty() {
            break;
        }

        let candidate = normalize(&base_dir.join(&include))?;
        if chain.contains(&candidate) {
            warn!(
                file = %current.display(),
                include = %candidate.display(),
                "include cycle detected, truncating chain"
            );
            break;
        }

        chain.push(candidate.clone());
        current = candidate;
    }

    Ok(chain)
}

/// Make `path` absolute and fold away `.` and `..` components without
/// touching the filesystem.
pub fn normalize(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| StrataError::from_io(path, e))?;

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_))
                );
                if !at_root {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_dots() {
        let p = normalize(Path::new("/etc/app/./conf/../settings.yml")).unwrap();
        assert_eq!(p, PathBuf::from("/etc/app/settings.yml"));

        let p = normalize(Path::new("/../x.yml")).unwrap();
        assert_eq!(p, PathBuf::from("/x.yml"));
    }

    #[test]
    fn test_normalize_makes_absolute() {
        let p = normalize(Path::new("settings.yml")).unwrap();
        assert!(p.is_absolute());
        assert!(p.ends_with("settings.yml"));
    }

    #[test]
    fn test_include_disabled_is_entry_only() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("settings.yml");
        std::fs::write(&entry, "include: base.yml\n").unwrap();

        let chain = resolve_chain(&entry, &LoadOptions::new()).unwrap();
        assert_eq!(chain, vec![normalize(&entry).unwrap()]);
    }

    #[test]
    fn test_chain_is_relative_to_entry_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let entry = dir.path().join("settings.yml");
        std::fs::write(&entry, "include: sub/a.yml\n").unwrap();
        // Resolved against the entry dir, not sub/.
        std::fs::write(dir.path().join("sub/a.yml"), "include: b.yml\n").unwrap();
        std::fs::write(dir.path().join("b.yml"), "k: v\n").unwrap();

        let chain = resolve_chain(&entry, &LoadOptions::new().with_include()).unwrap();
        let names: Vec<_> = chain
            .iter()
            .map(|p| p.strip_prefix(normalize(dir.path()).unwrap()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("settings.yml"),
                PathBuf::from("sub/a.yml"),
                PathBuf::from("b.yml")
            ]
        );
    }

    #[test]
    fn test_self_include_stops() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("settings.yml");
        std::fs::write(&entry, "include: ./settings.yml\na: 1\n").unwrap();

        let chain = resolve_chain(&entry, &LoadOptions::new().with_include()).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_missing_include_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("settings.yml");
        std::fs::write(&entry, "include: gone.yml\n").unwrap();

        let err = resolve_chain(&entry, &LoadOptions::new().with_include()).unwrap_err();
        match err {
            StrataError::NotFound { path } => assert!(path.ends_with("gone.yml")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
