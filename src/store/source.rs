use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use ahash::AHashMap;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Access control applied to a written object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    #[default]
    Private,
    PublicRead,
    BucketOwnerFullControl,
}

/// Transport-level metadata attached to a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub acl: Acl,
}

impl PutOptions {
    /// Publicly readable JSON, as used for district results.
    pub fn public_json() -> Self {
        Self { content_type: Some("text/json".into()), content_encoding: None, acl: Acl::PublicRead }
    }
}

/// An object read back from storage.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Arc<[u8]>,
    pub content_encoding: Option<String>,
    pub content_type: Option<String>,
}

impl StoredObject {
    #[inline]
    pub fn is_gzip(&self) -> bool {
        self.content_encoding.as_deref().is_some_and(|enc| enc.eq_ignore_ascii_case("gzip"))
    }
}

/// Object metadata without the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
}

/// Keyed object storage. A missing object is `Ok(None)`; every other
/// failure is an error and is not retried here.
pub trait ObjectStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoredObject>>;
    fn head(&self, key: &str) -> Result<Option<ObjectMeta>>;
    fn put(&self, key: &str, body: &[u8], options: &PutOptions) -> Result<()>;
    /// Keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    fn exists(&self, key: &str) -> Result<bool> { Ok(self.head(key)?.is_some()) }
}

/// Disk-backed store. Transport metadata lives in a `.meta.json` sidecar.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    fn full(&self, key: &str) -> PathBuf { self.root.join(key) }

    fn meta_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    fn read_options(path: &Path) -> Result<PutOptions> {
        match std::fs::read(Self::meta_path(path)) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("[store::disk] Bad metadata for {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PutOptions::default()),
            Err(e) => Err(e).with_context(|| format!("[store::disk] Failed to read metadata for {}", path.display())),
        }
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("[store::disk] Failed to list {}", dir.display())),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(&path, out)?;
            } else if !path.to_string_lossy().ends_with(".meta.json") {
                let rel = path.strip_prefix(&self.root)?;
                let key = rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStore for DiskStore {
    fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let path = self.full(key);
        let body = match std::fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("[store::disk] Failed to read {key}")),
        };
        let options = Self::read_options(&path)?;
        Ok(Some(StoredObject {
            body: Arc::from(body),
            content_encoding: options.content_encoding,
            content_type: options.content_type,
        }))
    }

    fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        match std::fs::metadata(self.full(key)) {
            Ok(meta) if meta.is_file() => Ok(Some(ObjectMeta { size: meta.len() })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("[store::disk] Failed to stat {key}")),
        }
    }

    fn put(&self, key: &str, body: &[u8], options: &PutOptions) -> Result<()> {
        let path = self.full(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("[store::disk] Failed to create directory {}", parent.display()))?;
        }
        std::fs::write(&path, body).with_context(|| format!("[store::disk] Failed to write {key}"))?;
        let meta = serde_json::to_vec(options)?;
        std::fs::write(Self::meta_path(&path), meta)
            .with_context(|| format!("[store::disk] Failed to write metadata for {key}"))?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.collect(&self.root, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

#[derive(Debug, Clone)]
struct MemObject {
    body: Arc<[u8]>,
    options: PutOptions,
}

/// In-memory store, keyed by full object key.
#[derive(Default)]
pub struct MemStore {
    objects: RwLock<AHashMap<String, MemObject>>,
}

impl MemStore {
    pub fn new() -> Self { Self::default() }

    /// Transport metadata of a stored object, for inspecting writes.
    pub fn options(&self, key: &str) -> Option<PutOptions> {
        self.objects.read().ok()?.get(key).map(|object| object.options.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl ObjectStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let objects = self.objects.read().map_err(|_| anyhow!("[store::mem] Lock poisoned"))?;
        Ok(objects.get(key).map(|object| StoredObject {
            body: object.body.clone(),
            content_encoding: object.options.content_encoding.clone(),
            content_type: object.options.content_type.clone(),
        }))
    }

    fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| anyhow!("[store::mem] Lock poisoned"))?;
        Ok(objects.get(key).map(|object| ObjectMeta { size: object.body.len() as u64 }))
    }

    fn put(&self, key: &str, body: &[u8], options: &PutOptions) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| anyhow!("[store::mem] Lock poisoned"))?;
        objects.insert(key.to_string(), MemObject { body: Arc::from(body), options: options.clone() });
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().map_err(|_| anyhow!("[store::mem] Lock poisoned"))?;
        let mut keys: Vec<String> = objects.keys().filter(|key| key.starts_with(prefix)).cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
