use std::path::{Path, PathBuf};

use crate::api::VirtualMachine;
use crate::error::OnappError;

const CACHE_FILE_NAME: &str = ".onapp_cache.json";

/// File-backed snapshot of the remote VM listing, one file per OS user.
///
/// The cache is advisory: it exists to spare the resolver a full remote
/// listing on every lookup. It is written without locking; concurrent
/// invocations race last-writer-wins, which is tolerable because a stale
/// cache miss forces a remote refresh anyway.
pub struct VmCache {
    path: PathBuf,
}

impl VmCache {
    /// Cache at the fixed per-user location `~/.onapp_cache.json`.
    pub fn new() -> Self {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(CACHE_FILE_NAME);
        Self { path }
    }

    /// Cache at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. `CacheMissing` when the file doesn't exist (the
    /// expected steady state on first use), `CacheUnreadable` when it exists
    /// but can't be opened or parsed.
    pub fn load(&self) -> Result<Vec<VirtualMachine>, OnappError> {
        if !self.path.exists() {
            return Err(OnappError::CacheMissing);
        }
        let data = std::fs::read_to_string(&self.path).map_err(|e| OnappError::CacheUnreadable {
            message: format!("couldn't read {}: {e}", self.path.display()),
        })?;
        facet_json::from_str(&data).map_err(|e| OnappError::CacheUnreadable {
            message: format!("couldn't parse {}: {e}", self.path.display()),
        })
    }

    /// Overwrite the snapshot with the given records. Console and root
    /// passwords are cleared first, they must never reach disk.
    pub fn store(&self, vms: &[VirtualMachine]) -> Result<(), OnappError> {
        let mut scrubbed = vms.to_vec();
        for vm in &mut scrubbed {
            vm.initial_root_password.clear();
            vm.remote_access_password.clear();
        }
        let data = facet_json::to_string(&scrubbed).map_err(|e| OnappError::Decode {
            what: "cache snapshot".into(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, data).map_err(|e| OnappError::Io {
            context: format!("writing cache file {}", self.path.display()),
            source: e,
        })
    }

    /// Delete the snapshot if present. Idempotent.
    pub fn clear(&self) -> Result<(), OnappError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OnappError::Io {
                context: format!("deleting cache file {}", self.path.display()),
                source: e,
            }),
        }
    }
}

impl Default for VmCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vms() -> Vec<VirtualMachine> {
        vec![
            VirtualMachine {
                id: 1,
                label: "web-1".into(),
                hostname: "web-1.example.org".into(),
                booted: true,
                memory: 1024,
                user_id: 7,
                initial_root_password: "root-secret".into(),
                remote_access_password: "vnc-secret".into(),
                ..Default::default()
            },
            VirtualMachine {
                id: 2,
                label: "db-1".into(),
                hostname: "db-1.example.org".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn missing_cache_is_cache_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VmCache::at(dir.path().join("nonexistent.json"));
        assert!(matches!(cache.load(), Err(OnappError::CacheMissing)));
    }

    #[test]
    fn round_trip_strips_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VmCache::at(dir.path().join("cache.json"));

        cache.store(&sample_vms()).unwrap();
        let loaded = cache.load().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, 1);
        assert_eq!(loaded[0].label, "web-1");
        assert_eq!(loaded[0].hostname, "web-1.example.org");
        assert!(loaded[0].booted);
        assert_eq!(loaded[0].memory, 1024);
        assert_eq!(loaded[0].user_id, 7);
        // Sensitive fields must be empty regardless of what was stored
        assert!(loaded[0].initial_root_password.is_empty());
        assert!(loaded[0].remote_access_password.is_empty());
        assert_eq!(loaded[1].label, "db-1");
    }

    #[test]
    fn store_does_not_mutate_input() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VmCache::at(dir.path().join("cache.json"));
        let vms = sample_vms();
        cache.store(&vms).unwrap();
        assert_eq!(vms[0].initial_root_password, "root-secret");
    }

    #[test]
    fn store_overwrites_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VmCache::at(dir.path().join("cache.json"));
        cache.store(&sample_vms()).unwrap();
        cache
            .store(&[VirtualMachine {
                id: 99,
                label: "only".into(),
                ..Default::default()
            }])
            .unwrap();
        let loaded = cache.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 99);
    }

    #[test]
    fn garbage_cache_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json at all {{{").unwrap();
        let cache = VmCache::at(&path);
        assert!(matches!(cache.load(), Err(OnappError::CacheUnreadable { .. })));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VmCache::at(dir.path().join("cache.json"));
        cache.clear().unwrap(); // nothing there yet
        cache.store(&sample_vms()).unwrap();
        cache.clear().unwrap();
        cache.clear().unwrap();
        assert!(matches!(cache.load(), Err(OnappError::CacheMissing)));
    }
}
