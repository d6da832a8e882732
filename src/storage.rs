use crate::constants::{ADDRS_FILE, EXISTS_FILE};
use crate::error::{BotError, Result};
use crate::types::{CanonicalAddress, EventKey, PublishedEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Venue addresses resolved through the destination's own address search.
///
/// Keyed by `"<location>|<city>"`. Entries written by older runs under the
/// bare venue name are still honoured when their locality matches the city.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressCache {
    entries: BTreeMap<String, CanonicalAddress>,
}

impl AddressCache {
    pub fn key(location: &str, city: &str) -> String {
        format!("{location}|{city}")
    }

    pub fn get(&self, location: &str, city: &str) -> Option<&CanonicalAddress> {
        self.entries.get(&Self::key(location, city)).or_else(|| {
            self.entries
                .get(location)
                .filter(|legacy| legacy.locality == city)
        })
    }

    pub fn insert(&mut self, location: &str, city: &str, address: CanonicalAddress) {
        self.entries.insert(Self::key(location, city), address);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type EventMap = BTreeMap<EventKey, PublishedEvent>;

/// In-memory view of both caches for one run.
#[derive(Debug, Clone, Default)]
pub struct Caches {
    pub addresses: AddressCache,
    /// Events known from previous runs (`exists.json` as loaded).
    pub existing: EventMap,
    /// Events confirmed on the destination during this run; written back as `exists.json`.
    pub created: EventMap,
}

impl Caches {
    /// Carry forward earlier entries this run never reached, so a cut-short
    /// run does not forget them.
    pub fn keep_unvisited(&mut self) {
        for (key, event) in &self.existing {
            self.created.entry(key.clone()).or_insert_with(|| event.clone());
        }
    }
}

/// The two JSON cache files inside the config directory.
pub struct CacheStore {
    addrs_path: PathBuf,
    exists_path: PathBuf,
}

impl CacheStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            addrs_path: config_dir.join(ADDRS_FILE),
            exists_path: config_dir.join(EXISTS_FILE),
        }
    }

    pub fn addrs_path(&self) -> &Path {
        &self.addrs_path
    }

    pub fn exists_path(&self) -> &Path {
        &self.exists_path
    }

    /// Load both caches; missing or unreadable files start empty.
    pub fn load(&self) -> Caches {
        let addresses = AddressCache {
            entries: read_json_or_default(&self.addrs_path),
        };
        let existing: EventMap = read_json_or_default(&self.exists_path);
        info!(
            addresses = addresses.len(),
            events = existing.len(),
            "loaded caches"
        );
        Caches {
            addresses,
            existing,
            created: EventMap::new(),
        }
    }

    pub fn save_addresses(&self, caches: &Caches) -> Result<()> {
        write_private_json(&self.addrs_path, &caches.addresses.entries)
    }

    pub fn save_created(&self, caches: &Caches) -> Result<()> {
        write_private_json(&self.exists_path, &caches.created)
    }
}

pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cache file not readable, starting empty");
            return T::default();
        }
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "cache file is not valid JSON, starting empty");
        T::default()
    })
}

/// Write pretty JSON to a sibling temp file with mode 0600, then rename it over `path`.
pub fn write_private_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let data = serde_json::to_vec_pretty(value)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    tmp.write_all(&data)?;
    tmp.as_file().sync_all()?;
    restrict_permissions(tmp.path())?;
    tmp.persist(path).map_err(|e| BotError::Io(e.error))?;
    debug!(path = %path.display(), bytes = data.len(), "wrote cache file");
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
