//! Key/value media behind the flat store.
//!
//! A medium holds string values under string keys and enforces a byte quota,
//! counted as key length plus value length summed over all keys. A write that
//! would exceed the quota fails with [`MediumError::QuotaExceeded`] and leaves
//! the medium unchanged.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::MediumError;

/// Synchronous key/value storage with a byte quota.
pub trait FlatMedium: Send + Sync + 'static {
    /// Value stored under `key`. `Ok(None)` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, MediumError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// MUST be all-or-nothing: a failed write leaves the old value in place.
    fn set(&self, key: &str, value: &str) -> Result<(), MediumError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), MediumError>;

    /// Every stored key, sorted.
    fn keys(&self) -> Result<Vec<String>, MediumError>;

    /// Bytes counted against the quota.
    fn usage(&self) -> Result<u64, MediumError>;

    /// Configured quota in bytes.
    fn quota(&self) -> u64;
}

fn entry_size(key: &str, value_len: u64) -> u64 {
    key.len() as u64 + value_len
}

fn check_quota(
    key: &str,
    current: u64,
    old_len: Option<u64>,
    new_len: u64,
    quota: u64,
) -> Result<(), MediumError> {
    let without_old =
        old_len.map_or(current, |old| current.saturating_sub(entry_size(key, old)));
    let needed = without_old + entry_size(key, new_len);
    if needed > quota {
        return Err(MediumError::QuotaExceeded {
            key: key.to_owned(),
            needed,
            quota,
        });
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory medium for tests and ephemeral sessions.
#[derive(Debug)]
pub struct MemoryMedium {
    entries: Mutex<BTreeMap<String, String>>,
    quota: u64,
}

impl MemoryMedium {
    /// Empty medium with the given quota.
    #[must_use]
    pub const fn new(quota: u64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota,
        }
    }
}

impl FlatMedium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let mut entries = lock(&self.entries);
        let current: u64 = entries
            .iter()
            .map(|(k, v)| entry_size(k, v.len() as u64))
            .sum();
        let old = entries.get(key).map(|v| v.len() as u64);
        check_quota(key, current, old, value.len() as u64, self.quota)?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        Ok(lock(&self.entries).keys().cloned().collect())
    }

    fn usage(&self) -> Result<u64, MediumError> {
        Ok(lock(&self.entries)
            .iter()
            .map(|(k, v)| entry_size(k, v.len() as u64))
            .sum())
    }

    fn quota(&self) -> u64 {
        self.quota
    }
}

/// A directory of `<key>.json` files.
///
/// Writes go to a hidden temp file that is then renamed over the target, so a
/// crash never leaves a half-written collection. Characters outside
/// `[A-Za-z0-9._@-]` are percent-encoded in file names.
#[derive(Debug)]
pub struct DirMedium {
    root: PathBuf,
    quota: u64,
    write_lock: Mutex<()>,
}

const EXTENSION: &str = ".json";

impl DirMedium {
    /// Open (and create if needed) a medium rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`MediumError::Io`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>, quota: u64) -> Result<Self, MediumError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            quota,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}{EXTENSION}", encode_key(key)))
    }

    fn stored_len(path: &Path) -> Result<Option<u64>, MediumError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn entries(&self) -> Result<Vec<(String, u64)>, MediumError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            let Some(stem) = name.strip_suffix(EXTENSION) else {
                continue;
            };
            if let Some(key) = decode_key(stem) {
                entries.push((key, entry.metadata()?.len()));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

impl FlatMedium for DirMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let _guard = lock(&self.write_lock);
        let target = self.path_for(key);
        let current = self.usage()?;
        let old = Self::stored_len(&target)?;
        check_quota(key, current, old, value.len() as u64, self.quota)?;

        let tmp = self.root.join(format!(".{}.tmp", encode_key(key)));
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        let _guard = lock(&self.write_lock);
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        Ok(self.entries()?.into_iter().map(|(key, _)| key).collect())
    }

    fn usage(&self) -> Result<u64, MediumError> {
        Ok(self
            .entries()?
            .iter()
            .map(|(key, len)| entry_size(key, *len))
            .sum())
    }

    fn quota(&self) -> u64 {
        self.quota
    }
}

/// The medium chosen by configuration.
#[derive(Debug)]
pub enum AnyMedium {
    /// In memory.
    Memory(MemoryMedium),
    /// On disk.
    Dir(DirMedium),
}

impl FlatMedium for AnyMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        match self {
            Self::Memory(m) => m.get(key),
            Self::Dir(m) => m.get(key),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        match self {
            Self::Memory(m) => m.set(key, value),
            Self::Dir(m) => m.set(key, value),
        }
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        match self {
            Self::Memory(m) => m.remove(key),
            Self::Dir(m) => m.remove(key),
        }
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        match self {
            Self::Memory(m) => m.keys(),
            Self::Dir(m) => m.keys(),
        }
    }

    fn usage(&self) -> Result<u64, MediumError> {
        match self {
            Self::Memory(m) => m.usage(),
            Self::Dir(m) => m.usage(),
        }
    }

    fn quota(&self) -> u64 {
        match self {
            Self::Memory(m) => m.quota(),
            Self::Dir(m) => m.quota(),
        }
    }
}

fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-')
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if is_plain(c) && !(out.is_empty() && c == '.') {
            out.push(c);
        } else {
            let mut buf = [0_u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

fn decode_key(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        if b == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(b);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn exercise(medium: &dyn FlatMedium) {
        assert_eq!(medium.get("products").unwrap(), None);
        medium.set("products", "[]").unwrap();
        medium.set("profile_a@b.in", "{}").unwrap();
        assert_eq!(medium.get("products").unwrap().as_deref(), Some("[]"));
        assert_eq!(medium.keys().unwrap(), vec!["products", "profile_a@b.in"]);
        assert_eq!(medium.usage().unwrap(), (8 + 2) + (14 + 2));

        medium.remove("products").unwrap();
        medium.remove("products").unwrap();
        assert_eq!(medium.get("products").unwrap(), None);
        assert_eq!(medium.keys().unwrap(), vec!["profile_a@b.in"]);
    }

    #[test]
    fn test_memory_medium() {
        exercise(&MemoryMedium::new(1024));
    }

    #[test]
    fn test_dir_medium() {
        let dir = tempfile::tempdir().unwrap();
        let medium = DirMedium::open(dir.path().join("flat"), 1024).unwrap();
        exercise(&medium);
        assert!(medium.root().join("profile_a@b.in.json").exists());
    }

    #[test]
    fn test_quota_is_not_applied() {
        let medium = MemoryMedium::new(20);
        medium.set("users", "0123456789").unwrap();
        let err = medium.set("users", "0123456789abcdefghij").unwrap_err();
        assert!(matches!(err, MediumError::QuotaExceeded { needed: 25, quota: 20, .. }));
        assert_eq!(medium.get("users").unwrap().as_deref(), Some("0123456789"));

        // Replacing a value only counts the new size.
        medium.set("users", "0123456789abcde").unwrap();
    }

    #[test]
    fn test_dir_quota_is_not_applied() {
        let dir = tempfile::tempdir().unwrap();
        let medium = DirMedium::open(dir.path(), 10).unwrap();
        medium.set("k", "123").unwrap();
        assert!(medium.set("k", "0123456789").is_err());
        assert_eq!(medium.get("k").unwrap().as_deref(), Some("123"));
    }

    #[test]
    fn test_key_encoding() {
        assert_eq!(encode_key("profile_a@b.in"), "profile_a@b.in");
        assert_eq!(encode_key("a/b c"), "a%2Fb%20c");
        assert_eq!(encode_key(".hidden"), "%2Ehidden");
        for key in ["a/b c", ".hidden", "ünï", "plain"] {
            assert_eq!(decode_key(&encode_key(key)).as_deref(), Some(key));
        }
        assert_eq!(decode_key("bad%Z"), None);
    }
}
