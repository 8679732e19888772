// Persistent media for cache entries.
// A medium stores opaque text per (namespace, key); the store above it owns
// serialization, bounds, and error absorption.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;

use crate::lock::mutex_lock;

use super::key::CacheKey;
use super::paths;

const SOURCE: &str = "cache::medium";

/// A store-specific namespace plus schema version.
///
/// Bumping the version makes every entry written under the old version
/// invisible to lookups without deleting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    component: &'static str,
    version: u32,
}

impl Namespace {
    pub const fn new(component: &'static str, version: u32) -> Self {
        Self { component, version }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Prefix shared by every qualified name in this namespace.
    pub fn prefix(&self) -> String {
        format!("{}:v{}:", self.component, self.version)
    }

    /// Fully qualified name: `<component>:v<version>:<key>`.
    pub fn qualify(&self, key: &CacheKey) -> String {
        format!("{}{}", self.prefix(), key)
    }
}

/// Backing storage for cache entries.
///
/// Implementations may fail on any call; callers treat failure as a miss.
pub trait Medium: Send + Sync {
    fn read(&self, namespace: &Namespace, key: &CacheKey) -> io::Result<Option<String>>;

    fn write(&self, namespace: &Namespace, key: &CacheKey, contents: &str) -> io::Result<()>;

    fn remove(&self, namespace: &Namespace, key: &CacheKey) -> io::Result<()>;

    /// Every key currently stored under `namespace`.
    fn keys(&self, namespace: &Namespace) -> io::Result<Vec<CacheKey>>;
}

/// Filesystem medium: one file per entry, written atomically.
///
/// The first line of each file is the encoded key (keys never contain
/// control characters), the remainder is the record.
#[derive(Debug, Clone)]
pub struct DiskMedium {
    root: PathBuf,
}

impl DiskMedium {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Medium for DiskMedium {
    fn read(&self, namespace: &Namespace, key: &CacheKey) -> io::Result<Option<String>> {
        let path = paths::entry_path(&self.root, namespace, key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)?;
        match contents.split_once('\n') {
            Some((stored_key, body)) if stored_key == key.as_str() => Ok(Some(body.to_string())),
            _ => Ok(None),
        }
    }

    fn write(&self, namespace: &Namespace, key: &CacheKey, contents: &str) -> io::Result<()> {
        let path = paths::entry_path(&self.root, namespace, key);
        let mut text = String::with_capacity(key.as_str().len() + 1 + contents.len());
        text.push_str(key.as_str());
        text.push('\n');
        text.push_str(contents);
        write_atomic(&path, &text)
    }

    fn remove(&self, namespace: &Namespace, key: &CacheKey) -> io::Result<()> {
        let path = paths::entry_path(&self.root, namespace, key);
        match fs::remove_file(&path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    fn keys(&self, namespace: &Namespace) -> io::Result<Vec<CacheKey>> {
        let dir = paths::namespace_dir(&self.root, namespace);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(paths::ENTRY_EXTENSION) {
                continue;
            }
            // Another writer may have pruned the file since read_dir.
            if let Some(key) = read_key_line(&path)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

fn read_key_line(path: &Path) -> io::Result<Option<CacheKey>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut line = String::new();
    // Keys are short; cap the read so a corrupt file cannot pull in megabytes.
    BufReader::new(file.take(64 * 1024)).read_line(&mut line)?;
    match line.strip_suffix('\n') {
        Some(key) if !key.is_empty() => Ok(Some(CacheKey::from_encoded(key))),
        _ => Ok(None),
    }
}

/// Write a file atomically via a temp file in the same directory.
fn write_atomic(path: &Path, text: &str) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "entry path has no parent"))?;
    fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(text.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// In-process medium. Can be switched into a mode where every call fails,
/// which models disabled storage or an exhausted quota.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<BTreeMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium whose every operation fails.
    pub fn failing() -> Self {
        let medium = Self::default();
        medium.set_failing(true);
        medium
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Total number of entries across all namespaces.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store raw text under a key, bypassing record serialization.
    pub fn insert_raw(&self, namespace: &Namespace, key: &CacheKey, contents: &str) {
        mutex_lock(&self.entries, SOURCE, "insert_raw")
            .insert(namespace.qualify(key), contents.to_string());
    }

    fn check(&self) -> io::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(io::Error::other("storage unavailable"))
        } else {
            Ok(())
        }
    }
}

impl Medium for MemoryMedium {
    fn read(&self, namespace: &Namespace, key: &CacheKey) -> io::Result<Option<String>> {
        self.check()?;
        Ok(mutex_lock(&self.entries, SOURCE, "read")
            .get(&namespace.qualify(key))
            .cloned())
    }

    fn write(&self, namespace: &Namespace, key: &CacheKey, contents: &str) -> io::Result<()> {
        self.check()?;
        mutex_lock(&self.entries, SOURCE, "write")
            .insert(namespace.qualify(key), contents.to_string());
        Ok(())
    }

    fn remove(&self, namespace: &Namespace, key: &CacheKey) -> io::Result<()> {
        self.check()?;
        mutex_lock(&self.entries, SOURCE, "remove").remove(&namespace.qualify(key));
        Ok(())
    }

    fn keys(&self, namespace: &Namespace) -> io::Result<Vec<CacheKey>> {
        self.check()?;
        let prefix = namespace.prefix();
        Ok(mutex_lock(&self.entries, SOURCE, "keys")
            .keys()
            .filter_map(|name| name.strip_prefix(&prefix))
            .map(CacheKey::from_encoded)
            .collect())
    }
}
