// Plugin/event surface. The Python original dynamically `importlib`-loads a
// `main.py` per plugin; Rust has no equivalent without `dlopen`, which isn't
// grounded anywhere in this codebase. Instead, out-of-tree code registers a
// `Plugin` trait object ahead of time (e.g. from a `build.rs`-assembled
// registry, or simply `main()` wiring); the surface below only manages
// *which* registered plugins are enabled and dispatches their lifecycle
// events, the part of `onionrplugins.py` that is this crate's concern.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use regex::Regex;
use tracing::{error, info};

use crate::config::ConfigStore;
use crate::error::{CoreError, CoreResult};

/// Lifecycle events dispatched to a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Enable,
    Disable,
    Start,
    Stop,
}

/// The contract a registered out-of-tree module implements.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn on_event(&self, event: LifecycleEvent);
}

fn sanitize_name(name: &str) -> String {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| Regex::new("[^0-9a-zA-Z_]+").expect("static pattern is valid"));
    re.replace_all(&name.to_lowercase(), "").into_owned()
}

/// Discovers, enables, and dispatches lifecycle events to registered
/// plugins. Enabled-state lives in the config store under `plugins.enabled`
/// so it survives restarts.
pub struct PluginManager {
    data_dir: PathBuf,
    registry: Mutex<HashMap<String, Box<dyn Plugin>>>,
}

impl PluginManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Ensures `plugins.enabled` exists and the plugin directory is present.
    pub fn check(&self, config: &ConfigStore) -> CoreResult<()> {
        if !config.is_set("plugins.enabled") {
            config.set("plugins.enabled", Some(serde_json::json!([])), true);
        }
        std::fs::create_dir_all(self.plugins_dir())?;
        Ok(())
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.data_dir.join("plugins")
    }

    pub fn plugin_data_dir(&self, name: &str) -> PathBuf {
        self.plugins_dir().join(sanitize_name(name))
    }

    /// Registers an in-process plugin implementation under its own name.
    pub fn register(&self, plugin: Box<dyn Plugin>) {
        self.registry
            .lock()
            .insert(sanitize_name(plugin.name()), plugin);
    }

    /// A plugin "exists" if its data directory is present, matching the
    /// source's `os.path.isdir`-based `exists()`.
    pub fn exists(&self, name: &str) -> bool {
        self.plugin_data_dir(name).is_dir()
    }

    /// Discovers plugin directories directly under `plugins_dir()`, the
    /// on-disk counterpart to `onionrplugins.py`'s module discovery: each
    /// immediate child directory is a candidate plugin, named by the same
    /// `[0-9a-zA-Z_]+` sanitization `enable()`/`disable()` apply. Directories
    /// whose name needed sanitizing to become valid are skipped rather than
    /// silently renamed.
    pub fn discover(&self) -> Vec<String> {
        let root = self.plugins_dir();
        walkdir::WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| sanitize_name(name) == *name)
            .collect()
    }

    fn enabled_names(&self, config: &ConfigStore) -> Vec<String> {
        config
            .get("plugins.enabled", serde_json::json!([]), false)
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_enabled(&self, name: &str, config: &ConfigStore) -> bool {
        self.enabled_names(config).contains(&sanitize_name(name))
    }

    fn dispatch(&self, name: &str, event: LifecycleEvent) -> CoreResult<()> {
        let registry = self.registry.lock();
        let plugin = registry
            .get(&sanitize_name(name))
            .ok_or_else(|| CoreError::KeyNotKnown(format!("plugin not registered: {name}")))?;
        plugin.on_event(event);
        Ok(())
    }

    /// Enables `name`: dispatches `Enable`, and on success appends to
    /// `plugins.enabled` and dispatches `Start`. A dispatch failure leaves
    /// the plugin disabled (config untouched).
    pub fn enable(&self, name: &str, config: &ConfigStore) -> CoreResult<()> {
        let key = sanitize_name(name);
        if self.is_enabled(&key, config) {
            return Ok(());
        }
        if !self.exists(&key) {
            error!(name = %key, "enable requested for unknown plugin");
            let _ = self.disable(&key, config);
            return Err(CoreError::KeyNotKnown(key));
        }

        self.dispatch(&key, LifecycleEvent::Enable)?;

        let mut enabled = self.enabled_names(config);
        enabled.push(key.clone());
        config.set(
            "plugins.enabled",
            Some(serde_json::json!(enabled)),
            true,
        );
        self.dispatch(&key, LifecycleEvent::Start)?;
        info!(name = %key, "plugin enabled");
        Ok(())
    }

    /// Removes `name` from `plugins.enabled`, dispatching `Disable` then
    /// `Stop` if it was registered.
    pub fn disable(&self, name: &str, config: &ConfigStore) -> CoreResult<()> {
        let key = sanitize_name(name);
        let mut enabled = self.enabled_names(config);
        let was_enabled = enabled.iter().any(|n| n == &key);
        enabled.retain(|n| n != &key);
        config.set(
            "plugins.enabled",
            Some(serde_json::json!(enabled)),
            true,
        );
        if was_enabled && self.registry.lock().contains_key(&key) {
            self.dispatch(&key, LifecycleEvent::Disable)?;
            self.dispatch(&key, LifecycleEvent::Stop)?;
        }
        Ok(())
    }

    /// Stops then restarts every currently-enabled plugin, in order.
    pub fn reload(&self, config: &ConfigStore) -> CoreResult<()> {
        let enabled = self.enabled_names(config);
        for name in &enabled {
            if self.registry.lock().contains_key(name) {
                let _ = self.dispatch(name, LifecycleEvent::Stop);
            }
        }
        for name in &enabled {
            if self.registry.lock().contains_key(name) {
                self.dispatch(name, LifecycleEvent::Start)?;
            }
        }
        Ok(())
    }
}

pub fn plugin_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join("plugins").join(sanitize_name(name))
}
