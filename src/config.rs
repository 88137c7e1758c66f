// Dotted-path configuration tree backed by a JSON file on disk, grounded on
// `config.py`'s get/set/is_set/save/reload contract. Guarded by a `RwLock`
// per the reference's "process-global, readers see a consistent tree" note.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// A dotted-path JSON settings tree, durably persisted as `<data_dir>/config.json`.
pub struct ConfigStore {
    path: PathBuf,
    tree: RwLock<Value>,
}

impl ConfigStore {
    /// Loads `<data_dir>/config.json` if present; a missing or malformed file
    /// silently yields an empty tree, matching the reference's `reload()`.
    pub fn load(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join("config.json");
        let tree = fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| Value::Object(Default::default()));
        Self {
            path,
            tree: RwLock::new(tree),
        }
    }

    /// An empty, in-memory store with no backing file; `save()` becomes a no-op.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            tree: RwLock::new(Value::Object(Default::default())),
        }
    }

    /// Traverses `key` ("a.b.c"), returning `default` if any intermediate
    /// segment is missing or not a map. When `save` is true and the path was
    /// missing, the default is written back before returning.
    pub fn get(&self, key: &str, default: Value, save: bool) -> Value {
        let segments: Vec<&str> = key.split('.').collect();
        {
            let tree = self.tree.read();
            if let Some(v) = lookup(&tree, &segments) {
                return v.clone();
            }
        }
        if save {
            self.set(key, Some(default.clone()), true);
        }
        default
    }

    /// Sets `key` to `value`, creating intermediate maps as needed.
    /// `value = None` deletes the leaf. `savefile` flushes to disk afterward.
    pub fn set(&self, key: &str, value: Option<Value>, savefile: bool) {
        let segments: Vec<&str> = key.split('.').collect();
        {
            let mut tree = self.tree.write();
            insert(&mut tree, &segments, value);
        }
        if savefile {
            self.save();
        }
    }

    /// Pure existence check; never mutates the tree.
    pub fn is_set(&self, key: &str) -> bool {
        let segments: Vec<&str> = key.split('.').collect();
        let tree = self.tree.read();
        lookup(&tree, &segments).is_some()
    }

    /// Pretty-prints the tree (indent 2) to the backing file. A no-op for
    /// in-memory stores with an empty path.
    pub fn save(&self) -> CoreResult<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tree = self.tree.read();
        let text = serde_json::to_string_pretty(&*tree).map_err(CoreError::Json)?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    /// Re-reads the backing file, silently tolerating any failure by keeping
    /// the current in-memory tree (matching the source's bare `except: pass`).
    pub fn reload(&self) {
        match fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => *self.tree.write() = value,
                Err(e) => warn!(error = %e, "config file is not valid JSON, keeping in-memory tree"),
            },
            Err(_) => {}
        }
    }
}

fn lookup<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for seg in segments {
        cur = cur.as_object()?.get(*seg)?;
    }
    Some(cur)
}

fn insert(root: &mut Value, segments: &[&str], value: Option<Value>) {
    if !root.is_object() {
        *root = Value::Object(Default::default());
    }
    let (last, prefix) = match segments.split_last() {
        Some(v) => v,
        None => return,
    };
    let mut cur = root;
    for seg in prefix {
        let map = cur.as_object_mut().expect("normalized to object above");
        cur = map
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if !cur.is_object() {
            *cur = Value::Object(Default::default());
        }
    }
    let map = cur.as_object_mut().expect("normalized to object above");
    match value {
        Some(v) => {
            map.insert(last.to_string(), v);
        }
        None => {
            map.remove(*last);
        }
    }
}

/// Resolves the data directory: `ONIONR_HOME`, then `DATA_DIR`, then `./data/`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(v) = std::env::var("ONIONR_HOME") {
        if !v.is_empty() {
            return PathBuf::from(v);
        }
    }
    if let Ok(v) = std::env::var("DATA_DIR") {
        if !v.is_empty() {
            return PathBuf::from(v);
        }
    }
    PathBuf::from("data/")
}
