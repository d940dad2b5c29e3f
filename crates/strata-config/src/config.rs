use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use strata_core::{ConfigFormat, Result, StrataError};
use tracing::{debug, error, info};

use crate::loader;
use crate::options::LoadOptions;
use crate::remote::ConfigServerClient;
use crate::resolver;
use crate::store::Store;
use crate::watch::{self, WatchControl};

/// Entry file name used by [`Config::load_from_dir`].
pub const DEFAULT_CONFIG_FILE_NAME: &str = "settings.yml";

static SHARED: LazyLock<Config> = LazyLock::new(Config::new);

struct Inner {
    store: Store,
    /// Set once a watch subscription has been started for this instance.
    armed: bool,
}

/// Thread-safe configuration instance.
///
/// Owns the [`Store`] behind a single read/write lock: getters take the read
/// lock, everything that mutates (including watch-triggered reloads) takes
/// the write lock. `Config` is a cheap handle; clones share one instance.
///
/// ```no_run
/// use strata_config::{Config, LoadOptions};
///
/// let cfg = Config::new();
/// cfg.load_from_file(
///     "/etc/app/settings.yml",
///     &LoadOptions::new()
///         .with_include()
///         .with_aes_key(b"0123456789abcdef")
///         .with_watch(None),
/// )?;
/// let port = cfg.get_int("server.port");
/// # Ok::<(), strata_core::StrataError>(())
/// ```
#[derive(Clone)]
pub struct Config {
    inner: Arc<RwLock<Inner>>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                store: Store::new(),
                armed: false,
            })),
        }
    }

    /// The process-wide default instance, created on first use. It is an
    /// ordinary instance with no synchronization beyond its own lock.
    pub fn shared() -> &'static Config {
        &SHARED
    }

    // ── Reads ──────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().store.get(key)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.inner.read().store.get_string(key)
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.inner.read().store.get_int(key)
    }

    pub fn get_uint(&self, key: &str) -> u64 {
        self.inner.read().store.get_uint(key)
    }

    pub fn get_float(&self, key: &str) -> f64 {
        self.inner.read().store.get_float(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.inner.read().store.get_bool(key)
    }

    pub fn get_duration(&self, key: &str) -> Duration {
        self.inner.read().store.get_duration(key)
    }

    pub fn get_string_slice(&self, key: &str) -> Vec<String> {
        self.inner.read().store.get_string_slice(key)
    }

    pub fn get_string_map(&self, key: &str) -> Map<String, Value> {
        self.inner.read().store.get_string_map(key)
    }

    pub fn get_string_map_string(&self, key: &str) -> Map<String, Value> {
        self.inner.read().store.get_string_map_string(key)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.inner.read().store.is_set(key)
    }

    pub fn all_settings(&self) -> Value {
        self.inner.read().store.all_settings()
    }

    pub fn all_keys(&self) -> Vec<String> {
        self.inner.read().store.all_keys()
    }

    /// Decode every setting into `T`.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T> {
        self.inner.read().store.unmarshal()
    }

    /// Decode the subtree at `key` into `T`.
    pub fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.inner.read().store.unmarshal_key(key)
    }

    /// Whether a watch subscription has been started for this instance.
    pub fn is_watching(&self) -> bool {
        self.inner.read().armed
    }

    // ── Writes ─────────────────────────────────────────────────

    /// Override `key`. Overrides win over every other source and survive
    /// reloads.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.inner.write().store.set(key, value);
    }

    pub fn set_default(&self, key: &str, value: impl Into<Value>) {
        self.inner.write().store.set_default(key, value);
    }

    /// Bind command-line flag values. Flags rank below [`Config::set`] and
    /// above file content.
    pub fn bind_flags<K, V>(&self, flags: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut inner = self.inner.write();
        for (key, value) in flags {
            let key = key.as_ref();
            if key.trim().is_empty() {
                return Err(StrataError::InvalidOption("flag name is empty".into()));
            }
            inner.store.bind_flag(key, value);
        }
        Ok(())
    }

    /// Replace the file-backed settings with one document.
    pub fn read_config(&self, mut input: impl Read, format: ConfigFormat) -> Result<()> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        self.inner.write().store.read_config(&bytes, format)
    }

    /// Overlay one document onto the file-backed settings.
    pub fn merge_config(&self, mut input: impl Read, format: ConfigFormat) -> Result<()> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        self.inner.write().store.merge_config(&bytes, format)
    }

    // ── File loading ───────────────────────────────────────────

    /// Load `settings.yml` from `dir`.
    pub fn load_from_dir(&self, dir: impl AsRef<Path>, options: &LoadOptions) -> Result<()> {
        self.load_from_file(dir.as_ref().join(DEFAULT_CONFIG_FILE_NAME), options)
    }

    /// Resolve the include chain of `entry`, merge it (entry file wins), and
    /// optionally start watching the chain for changes.
    ///
    /// The merge is staged on a fresh store and swapped in only when every
    /// file loaded, so a failed load leaves the current settings untouched.
    pub fn load_from_file(&self, entry: impl AsRef<Path>, options: &LoadOptions) -> Result<()> {
        let entry = entry.as_ref();
        let chain = self.load_chain(entry, options)?;

        if options.watch_enabled() {
            self.arm_watch(entry, chain, options)?;
        }
        Ok(())
    }

    fn load_chain(&self, entry: &Path, options: &LoadOptions) -> Result<Vec<PathBuf>> {
        options.validate()?;
        let entry = resolver::normalize(entry)?;
        loader::open_regular(&entry)?;

        let chain = resolver::resolve_chain(&entry, options)?;
        let mut staged = Store::new();
        loader::merge_chain(&mut staged, options, &chain)?;

        self.inner.write().store.replace_config(staged.into_config());
        info!(
            file = %entry.display(),
            include = options.include_enabled(),
            files = ?chain,
            "loaded config files"
        );
        Ok(chain)
    }

    fn arm_watch(&self, entry: &Path, chain: Vec<PathBuf>, options: &LoadOptions) -> Result<()> {
        {
            let mut inner = self.inner.write();
            if inner.armed {
                debug!(file = %entry.display(), "config watch already armed");
                return Ok(());
            }
            inner.armed = true;
        }

        let instance = Arc::downgrade(&self.inner);
        let entry = entry.to_path_buf();
        let options = options.clone();
        let spawned = watch::spawn(&chain, options.cancel_token().clone(), move |event| {
            reload_on_change(&instance, &entry, &options, event)
        });

        if let Err(e) = spawned {
            self.inner.write().armed = false;
            error!(error = %e, files = ?chain, "failed to watch config files");
            return Err(e);
        }
        Ok(())
    }

    // ── Single-file and remote loading ─────────────────────────

    /// Replace the file-backed settings with `path`, without include or
    /// decryption support.
    pub fn read_in_config(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut store = Store::new();
        loader::load_one(&mut store, &LoadOptions::new(), path, loader::LoadMode::Replace)?;
        self.inner.write().store.replace_config(store.into_config());
        Ok(())
    }

    /// Like [`Config::read_in_config`], but a failure is fatal.
    ///
    /// # Panics
    ///
    /// Panics when `path` cannot be read or parsed.
    pub fn load_settings(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if let Err(e) = self.read_in_config(path) {
            error!(file = %path.display(), error = %e, "fatal error reading config file");
            panic!("fatal error config file: {e}");
        }
    }

    /// Fetch `{url}/{app}/{profile}/{label}` from a config server and set
    /// every property it returns.
    pub async fn load_from_config_server(
        &self,
        url: &str,
        app: &str,
        profile: &str,
        label: &str,
    ) -> Result<()> {
        info!(url, app, profile, label, "load settings from remote");
        let mut server = ConfigServerClient::new(url, app, profile, label);
        server.fetch().await?;

        let mut inner = self.inner.write();
        server.map(|key, value| inner.store.set(key, value.clone()));
        Ok(())
    }

    /// Fetch from a config server and parse the string property `key` as a
    /// whole YAML document, replacing the file-backed settings.
    pub async fn load_from_config_server_with_raw_yaml(
        &self,
        url: &str,
        app: &str,
        profile: &str,
        label: &str,
        key: &str,
    ) -> Result<()> {
        info!(url, app, profile, label, key, "load raw settings from remote");
        let mut server = ConfigServerClient::new(url, app, profile, label);
        server.fetch().await?;

        let raw = server.get_string(key).ok_or_else(|| StrataError::RemoteKeyMissing {
            url: server.endpoint(),
            key: key.to_string(),
        })?;
        debug!(raw = %raw, "load raw cfg");

        self.inner
            .write()
            .store
            .read_config(raw.as_bytes(), ConfigFormat::Yaml)
            .map_err(|e| match e {
                StrataError::Parse { format, reason, .. } => StrataError::Parse {
                    origin: format!("{} key `{key}`", server.endpoint()),
                    format,
                    reason,
                },
                other => other,
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-run the whole load against the original entry file, then hand the
/// event to the caller's callback. Failures are logged; the watch survives.
fn reload_on_change(
    instance: &Weak<RwLock<Inner>>,
    entry: &Path,
    options: &LoadOptions,
    event: &notify::Event,
) -> WatchControl {
    let Some(inner) = instance.upgrade() else {
        return WatchControl::Stop;
    };
    let config = Config { inner };

    debug!(file = %entry.display(), paths = ?event.paths, "config file changed, reloading");
    let control = match config.load_chain(entry, options) {
        Ok(chain) => WatchControl::Retarget(chain),
        Err(e) => {
            error!(file = %entry.display(), error = %e, "file watcher auto reload settings");
            WatchControl::Continue
        }
    };

    if let Some(callback) = options.watch_callback() {
        callback(event);
    }
    control
}
