use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use strata_core::Result;

use crate::crypto;

/// Default suffix marking a file as encrypted.
pub const DEFAULT_ENCRYPTED_SUFFIX: &str = ".enc";

/// Invoked after every watch-triggered reload with the event that caused it.
pub type WatchCallback = Arc<dyn Fn(&notify::Event) + Send + Sync>;

/// Options for a single `load_from_file` call.
///
/// ```
/// use strata_config::LoadOptions;
///
/// let opts = LoadOptions::new()
///     .with_include()
///     .with_aes_key(b"0123456789abcdef")
///     .with_watch(None);
/// assert!(opts.include_enabled());
/// ```
#[derive(Clone)]
pub struct LoadOptions {
    enable_include: bool,
    aes_key: Option<Vec<u8>>,
    encrypted_suffix: String,
    watch: bool,
    watch_callback: Option<WatchCallback>,
    cancel: CancellationToken,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self {
            enable_include: false,
            aes_key: None,
            encrypted_suffix: DEFAULT_ENCRYPTED_SUFFIX.to_string(),
            watch: false,
            watch_callback: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Follow `include:` directives.
    pub fn with_include(mut self) -> Self {
        self.enable_include = true;
        self
    }

    /// Decrypt files ending with the encrypted suffix with this key.
    /// The key is validated when the options are applied.
    pub fn with_aes_key(mut self, key: impl AsRef<[u8]>) -> Self {
        self.aes_key = Some(key.as_ref().to_vec());
        self
    }

    /// Only files whose name ends with `suffix` are decrypted.
    pub fn with_encrypted_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.encrypted_suffix = suffix.into();
        self
    }

    /// Reload automatically when any file of the resolved chain changes.
    /// `callback` runs after each reload; pass `None` to only reload.
    ///
    /// The watch stops once every `Config` handle is dropped. A callback that
    /// captures a `Config` clone keeps the instance alive, so pair it with
    /// [`LoadOptions::with_cancel_token`] and cancel the token to stop it.
    pub fn with_watch(mut self, callback: Option<WatchCallback>) -> Self {
        self.watch = true;
        self.watch_callback = callback;
        self
    }

    /// Cancelling `token` stops the watch started by these options.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn include_enabled(&self) -> bool {
        self.enable_include
    }

    pub fn aes_key(&self) -> Option<&[u8]> {
        self.aes_key.as_deref()
    }

    pub fn encrypted_suffix(&self) -> &str {
        &self.encrypted_suffix
    }

    pub fn watch_enabled(&self) -> bool {
        self.watch
    }

    pub fn watch_callback(&self) -> Option<&WatchCallback> {
        self.watch_callback.as_ref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Reject option combinations that can never load anything.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(key) = &self.aes_key {
            crypto::validate_key(key)?;
        }
        Ok(())
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("enable_include", &self.enable_include)
            .field("aes_key", &self.aes_key.as_ref().map(|_| "<redacted>"))
            .field("encrypted_suffix", &self.encrypted_suffix)
            .field("watch", &self.watch)
            .field("watch_callback", &self.watch_callback.is_some())
            .finish()
    }
}
