use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GrantError {
    #[error("grant store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("grant store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Interactive directory chooser. The core never talks to the user
/// directly; callers supply whatever surface they have.
pub trait AccessPrompt: Send + Sync {
    fn choose_directory(&self, initial: Option<&Path>) -> Option<PathBuf>;
}

/// Persisted record of a granted root. The device/inode pair pins the
/// grant to the directory itself; if the directory is replaced, the pair
/// no longer matches and the token is considered stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GrantToken {
    path: PathBuf,
    device: u64,
    inode: u64,
    created_at: DateTime<Utc>,
}

impl GrantToken {
    fn for_path(path: &Path) -> Result<Self, GrantError> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            device: meta.dev(),
            inode: meta.ino(),
            created_at: Utc::now(),
        })
    }
}

/// Brokers persistent access to a user-chosen root directory. Holds at
/// most one active grant; without one it degrades to the fallback root
/// with reduced capability. Persistence failures are logged and absorbed,
/// never propagated.
pub struct AccessBroker {
    store_path: PathBuf,
    fallback_root: PathBuf,
    root: PathBuf,
    has_grant: bool,
    elevated: bool,
}

impl AccessBroker {
    pub fn new(store_path: PathBuf, fallback_root: PathBuf) -> Self {
        let root = fallback_root.clone();
        Self {
            store_path,
            fallback_root,
            root,
            has_grant: false,
            elevated: false,
        }
    }

    pub fn with_defaults() -> Self {
        let fallback = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        Self::new(Self::default_store_path(), fallback)
    }

    pub fn default_store_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tidyscan")
            .join("grant.json")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_grant(&self) -> bool {
        self.has_grant
    }

    /// Whether the nested Library directory under the current root is
    /// readable. Refreshed by `check_access`.
    pub fn has_elevated_access(&self) -> bool {
        self.elevated
    }

    /// Loads the persisted grant and starts using its path. A token whose
    /// directory was replaced is transparently reissued; a token whose
    /// directory is gone, or no token at all, falls back to the default
    /// root. Returns whether a grant was restored.
    pub fn restore_access(&mut self) -> bool {
        let token = match self.load_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.use_fallback();
                return false;
            }
            Err(err) => {
                warn!("could not read access grant: {err}");
                self.use_fallback();
                return false;
            }
        };

        let meta = match fs::metadata(&token.path) {
            Ok(meta) => meta,
            Err(err) => {
                warn!("granted directory {} is unavailable: {err}", token.path.display());
                self.use_fallback();
                return false;
            }
        };

        if meta.dev() != token.device || meta.ino() != token.inode {
            debug!("grant for {} is stale, reissuing", token.path.display());
            match GrantToken::for_path(&token.path) {
                Ok(fresh) => {
                    if let Err(err) = self.save_token(&fresh) {
                        warn!("could not reissue access grant: {err}");
                    }
                }
                Err(err) => warn!("could not reissue access grant: {err}"),
            }
        }

        self.root = token.path;
        self.has_grant = true;
        self.check_access();
        true
    }

    /// Whether the current root is readable. Also refreshes the elevated
    /// indicator from the nested Library directory.
    pub fn check_access(&mut self) -> bool {
        let readable = is_readable_dir(&self.root);
        self.elevated = readable && is_readable_dir(&self.root.join("Library"));
        readable
    }

    /// Asks the prompt for a directory, seeded with `initial` or the
    /// current root; an approved choice is persisted and used immediately.
    /// Returns whether access is now available.
    pub fn request_access(&mut self, prompt: &dyn AccessPrompt, initial: Option<&Path>) -> bool {
        let seed = initial.unwrap_or(self.root.as_path());
        if let Some(chosen) = prompt.choose_directory(Some(seed)) {
            match GrantToken::for_path(&chosen) {
                Ok(token) => {
                    if let Err(err) = self.save_token(&token) {
                        warn!("could not persist access grant: {err}");
                    }
                    self.root = chosen;
                    self.has_grant = true;
                }
                Err(err) => {
                    warn!("chosen directory {} is not usable: {err}", chosen.display())
                }
            }
        }

        self.check_access()
    }

    /// Stops using the granted root. The path stays in place for the rest
    /// of the process; only the grant claim is dropped.
    pub fn release(&mut self) {
        if self.has_grant {
            debug!("releasing access to {}", self.root.display());
            self.has_grant = false;
        }
    }

    fn use_fallback(&mut self) {
        self.root = self.fallback_root.clone();
        self.has_grant = false;
        self.check_access();
    }

    fn load_token(&self) -> Result<Option<GrantToken>, GrantError> {
        if !self.store_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.store_path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save_token(&self, token: &GrantToken) -> Result<(), GrantError> {
        if let Some(parent) = self.store_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.store_path, serde_json::to_string_pretty(token)?)?;
        Ok(())
    }
}

impl Drop for AccessBroker {
    fn drop(&mut self) {
        self.release();
    }
}

fn is_readable_dir(path: &Path) -> bool {
    fs::read_dir(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockPrompt(Option<PathBuf>);

    impl AccessPrompt for MockPrompt {
        fn choose_directory(&self, _initial: Option<&Path>) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: PathBuf,
        fallback: PathBuf,
        granted: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("grant.json");
        let fallback = dir.path().join("home");
        let granted = dir.path().join("chosen");
        fs::create_dir(&fallback).unwrap();
        fs::create_dir(&granted).unwrap();
        Fixture {
            _dir: dir,
            store,
            fallback,
            granted,
        }
    }

    #[test]
    fn test_no_grant_falls_back() {
        let fx = fixture();
        let mut broker = AccessBroker::new(fx.store.clone(), fx.fallback.clone());

        assert!(!broker.restore_access());
        assert_eq!(broker.root(), fx.fallback.as_path());
        assert!(!broker.has_grant());
    }

    #[test]
    fn test_grant_round_trip_across_instances() {
        let fx = fixture();

        let mut first = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        assert!(first.request_access(&MockPrompt(Some(fx.granted.clone())), None));
        assert!(first.has_grant());
        drop(first);

        let mut second = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        assert!(second.restore_access());
        assert_eq!(second.root(), fx.granted.as_path());
        assert!(second.has_grant());
    }

    #[test]
    fn test_cancelled_prompt_keeps_fallback() {
        let fx = fixture();
        let mut broker = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        broker.restore_access();

        broker.request_access(&MockPrompt(None), None);
        assert!(!broker.has_grant());
        assert_eq!(broker.root(), fx.fallback.as_path());
        assert!(!fx.store.exists());
    }

    #[test]
    fn test_corrupt_store_falls_back() {
        let fx = fixture();
        fs::write(&fx.store, "not a token").unwrap();

        let mut broker = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        assert!(!broker.restore_access());
        assert_eq!(broker.root(), fx.fallback.as_path());
    }

    #[test]
    fn test_missing_granted_directory_falls_back() {
        let fx = fixture();
        let mut first = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        first.request_access(&MockPrompt(Some(fx.granted.clone())), None);
        drop(first);

        fs::remove_dir_all(&fx.granted).unwrap();
        let mut second = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        assert!(!second.restore_access());
        assert_eq!(second.root(), fx.fallback.as_path());
    }

    #[test]
    fn test_stale_grant_is_reissued() {
        let fx = fixture();
        let mut first = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        first.request_access(&MockPrompt(Some(fx.granted.clone())), None);
        drop(first);

        // Replace the directory so the stored inode no longer matches.
        fs::remove_dir_all(&fx.granted).unwrap();
        fs::create_dir(&fx.granted).unwrap();

        let mut second = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        assert!(second.restore_access());
        assert_eq!(second.root(), fx.granted.as_path());

        let reissued: GrantToken =
            serde_json::from_str(&fs::read_to_string(&fx.store).unwrap()).unwrap();
        let current = fs::metadata(&fx.granted).unwrap();
        assert_eq!(reissued.inode, current.ino());
        assert_eq!(reissued.device, current.dev());
    }

    struct EchoPrompt;

    impl AccessPrompt for EchoPrompt {
        fn choose_directory(&self, initial: Option<&Path>) -> Option<PathBuf> {
            initial.map(Path::to_path_buf)
        }
    }

    #[test]
    fn test_prompt_is_seeded_with_initial_or_current_root() {
        let fx = fixture();

        let mut seeded = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        assert!(seeded.request_access(&EchoPrompt, Some(fx.granted.as_path())));
        assert_eq!(seeded.root(), fx.granted.as_path());

        let mut unseeded = AccessBroker::new(fx.store.clone(), fx.fallback.clone());
        unseeded.request_access(&EchoPrompt, None);
        assert!(unseeded.has_grant());
        assert_eq!(unseeded.root(), fx.fallback.as_path());
    }

    #[test]
    fn test_elevated_access_requires_library() {
        let fx = fixture();
        let mut broker = AccessBroker::new(fx.store.clone(), fx.granted.clone());
        broker.restore_access();
        assert!(broker.check_access());
        assert!(!broker.has_elevated_access());

        fs::create_dir(fx.granted.join("Library")).unwrap();
        assert!(broker.check_access());
        assert!(broker.has_elevated_access());
    }
}
