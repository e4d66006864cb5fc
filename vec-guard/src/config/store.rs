//! Policy document storage
//!
//! The permission engine never touches the file system itself; it goes
//! through a [`ConfigStore`], which hosts can replace.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use vec_guard_api::{PermissionConfig, PermissionRule};

use super::lock::{DirLock, LockOptions};
use super::schema::validate;
use super::ConfigError;

/// File names searched for by [`FileConfigStore::discover`], in order
pub const CONFIG_FILE_NAMES: &[&str] = &[".vec-permissionsrc.json", ".vec-permissionsrc"];

/// Application directory used under the user config dir
pub const DEFAULT_APP_NAME: &str = "vec";

/// A change to the persisted rule list
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEdit {
    /// Append a rule at the end of the list
    Append(PermissionRule),
    /// Remove the rule with this id, if present
    Remove(String),
}

impl RuleEdit {
    fn apply(self, rules: &mut Vec<PermissionRule>) {
        match self {
            Self::Append(rule) => rules.push(rule),
            Self::Remove(id) => rules.retain(|rule| rule.id != id),
        }
    }
}

/// Storage for the policy document
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load and validate the document
    ///
    /// A store with no document yet yields the default policy.
    async fn try_load(&self) -> Result<PermissionConfig, ConfigError>;

    /// Load the document, falling back to the default policy on any failure
    async fn load(&self) -> PermissionConfig {
        match self.try_load().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Config loading failed, using defaults");
                PermissionConfig::default()
            }
        }
    }

    /// Validate and write the document
    async fn save(&self, config: &PermissionConfig) -> Result<(), ConfigError>;

    /// Apply an edit to the persisted rule list and return the written
    /// document
    ///
    /// An unreadable or invalid document is an error; it is never replaced
    /// by defaults here.
    async fn modify(&self, edit: RuleEdit) -> Result<PermissionConfig, ConfigError>;
}

// ============================================================================
// File-based Config Store
// ============================================================================

/// JSON policy file on disk
///
/// Writes go to a sibling temp file which is then renamed over the target.
/// [`modify`](ConfigStore::modify) and [`save`](ConfigStore::save) hold a
/// [`DirLock`] so concurrent processes do not lose each other's rules.
pub struct FileConfigStore {
    path: PathBuf,
    lock_options: LockOptions,
}

impl FileConfigStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock_options: LockOptions::default(),
        }
    }

    /// Override lock timing
    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    /// Store in the default location for an application
    ///
    /// `<config_dir>/<app_name>/permissions.json`
    pub fn default_for_app(app_name: &str) -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        Self::new(config_dir.join(app_name).join("permissions.json"))
    }

    /// Search `start_dir` and its ancestors for a policy file
    ///
    /// Falls back to [`default_for_app`](Self::default_for_app) when none is
    /// found.
    pub fn discover(start_dir: impl AsRef<Path>) -> Self {
        for dir in start_dir.as_ref().ancestors() {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    tracing::debug!(path = %candidate.display(), "Found policy file");
                    return Self::new(candidate);
                }
            }
        }
        Self::default_for_app(DEFAULT_APP_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Option<PermissionConfig>, ConfigError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let config: PermissionConfig = serde_json::from_str(&raw)?;
        validate(&config)?;
        Ok(Some(config))
    }

    async fn write_document(&self, config: &PermissionConfig) -> Result<(), ConfigError> {
        validate(config)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(config)?;
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn try_load(&self) -> Result<PermissionConfig, ConfigError> {
        match self.read_document().await? {
            Some(config) => Ok(config),
            None => {
                tracing::debug!(path = %self.path.display(), "No policy file, using defaults");
                Ok(PermissionConfig::default())
            }
        }
    }

    async fn save(&self, config: &PermissionConfig) -> Result<(), ConfigError> {
        validate(config)?;
        let _lock = DirLock::acquire(&self.path, self.lock_options).await?;
        self.write_document(config).await?;
        tracing::info!(path = %self.path.display(), rules = config.rules.len(), "Policy saved");
        Ok(())
    }

    async fn modify(&self, edit: RuleEdit) -> Result<PermissionConfig, ConfigError> {
        let _lock = DirLock::acquire(&self.path, self.lock_options).await?;

        let mut config = self.read_document().await?.unwrap_or_default();
        edit.apply(&mut config.rules);
        self.write_document(&config).await?;

        tracing::debug!(path = %self.path.display(), rules = config.rules.len(), "Rules persisted");
        Ok(config)
    }
}

impl std::fmt::Debug for FileConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigStore")
            .field("path", &self.path)
            .finish()
    }
}

// ============================================================================
// In-Memory Config Store
// ============================================================================

/// In-memory store for tests and ephemeral sessions
///
/// [`set_failing`](Self::set_failing) makes every write fail, to exercise
/// persistence-failure paths.
#[derive(Default)]
pub struct MemoryConfigStore {
    config: Mutex<PermissionConfig>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryConfigStore {
    /// Store holding the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `config`
    pub fn with_config(config: PermissionConfig) -> Self {
        Self {
            config: Mutex::new(config),
            ..Self::default()
        }
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current stored document
    pub async fn snapshot(&self) -> PermissionConfig {
        self.config.lock().await.clone()
    }

    fn check_writable(&self) -> Result<(), ConfigError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ConfigError::Io(std::io::Error::other("store unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn try_load(&self) -> Result<PermissionConfig, ConfigError> {
        let config = self.config.lock().await.clone();
        validate(&config)?;
        Ok(config)
    }

    async fn save(&self, config: &PermissionConfig) -> Result<(), ConfigError> {
        validate(config)?;
        self.check_writable()?;
        *self.config.lock().await = config.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn modify(&self, edit: RuleEdit) -> Result<PermissionConfig, ConfigError> {
        self.check_writable()?;
        let mut stored = self.config.lock().await;
        let mut config = stored.clone();
        edit.apply(&mut config.rules);
        validate(&config)?;
        *stored = config.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(config)
    }
}

impl std::fmt::Debug for MemoryConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfigStore")
            .field("failing", &self.failing.load(Ordering::SeqCst))
            .field("saves", &self.save_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vec_guard_api::{PermissionAction, PolicyMode};

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path().join("perms.json"));
        let config = store.try_load().await.unwrap();
        assert_eq!(config, PermissionConfig::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path().join("nested").join("perms.json"));

        let mut config = PermissionConfig::default();
        config.mode = PolicyMode::Permissive;
        config
            .rules
            .push(PermissionRule::allow(PermissionAction::FsRead, "/tmp/*"));
        store.save(&config).await.unwrap();

        assert_eq!(store.try_load().await.unwrap(), config);
        assert!(!DirLock::lock_path(store.path()).exists());

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"createdAt\""));
        assert!(raw.contains("\"fs.read\""));
    }

    #[tokio::test]
    async fn test_invalid_file_falls_back_on_load_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("perms.json");
        std::fs::write(&path, r#"{"version": "9.9", "rules": []}"#).unwrap();
        let store = FileConfigStore::new(&path);

        assert!(matches!(store.try_load().await, Err(ConfigError::Invalid(_))));
        assert_eq!(store.load().await, PermissionConfig::default());

        let rule = PermissionRule::allow(PermissionAction::FsRead, "*");
        assert!(store.modify(RuleEdit::Append(rule)).await.is_err());
        // The broken file is left alone
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("9.9"));
    }

    #[tokio::test]
    async fn test_unparsable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("perms.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = FileConfigStore::new(&path);
        assert!(matches!(store.try_load().await, Err(ConfigError::Parse(_))));
    }

    #[tokio::test]
    async fn test_save_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path().join("perms.json"));
        let config = PermissionConfig {
            version: "0.1".into(),
            ..Default::default()
        };
        assert!(store.save(&config).await.is_err());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_modify_append_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path().join("perms.json"));

        let first = PermissionRule::allow(PermissionAction::FsRead, "/a/*");
        let second = PermissionRule::deny(PermissionAction::FsWrite, "/b/*");
        store.modify(RuleEdit::Append(first.clone())).await.unwrap();
        let config = store.modify(RuleEdit::Append(second.clone())).await.unwrap();
        assert_eq!(config.rules, vec![first.clone(), second.clone()]);

        let config = store.modify(RuleEdit::Remove(first.id.clone())).await.unwrap();
        assert_eq!(config.rules, vec![second]);
        assert_eq!(store.try_load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_concurrent_modifications_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("perms.json");

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = FileConfigStore::new(&path);
            tasks.push(tokio::spawn(async move {
                let rule = PermissionRule::allow(PermissionAction::FsRead, format!("/p{}/*", i));
                store.modify(RuleEdit::Append(rule)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let config = FileConfigStore::new(&path).try_load().await.unwrap();
        assert_eq!(config.rules.len(), 8);
    }

    #[test]
    fn test_discover_walks_ancestors() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        let file = dir.path().join(".vec-permissionsrc.json");
        std::fs::write(&file, "{}").unwrap();

        let store = FileConfigStore::discover(&nested);
        assert_eq!(store.path(), file.as_path());
    }

    #[tokio::test]
    async fn test_memory_store_failure_switch() {
        let store = MemoryConfigStore::new();
        let rule = PermissionRule::allow(PermissionAction::FsRead, "*");

        store.set_failing(true);
        assert!(store.modify(RuleEdit::Append(rule.clone())).await.is_err());
        assert!(store.save(&PermissionConfig::default()).await.is_err());
        assert_eq!(store.save_count(), 0);

        store.set_failing(false);
        let config = store.modify(RuleEdit::Append(rule)).await.unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_ids() {
        let rule = PermissionRule::allow(PermissionAction::FsRead, "*");
        let mut config = PermissionConfig::default();
        config.rules.push(rule.clone());
        let store = MemoryConfigStore::with_config(config);

        assert!(matches!(
            store.modify(RuleEdit::Append(rule)).await,
            Err(ConfigError::Invalid(_))
        ));
        assert_eq!(store.snapshot().await.rules.len(), 1);
    }
}
