//! The four logical documents (`Main`, `Current`, `Saved[id]`, `Scratch`)
//! behind a raw key-value backend, with typed access on top.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::core::display::NativeDisplay;
use crate::core::profile::{Profile, SavedProfile};
use crate::core::state::CurrentState;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentId {
    Main,
    Current,
    Saved(String),
    Scratch,
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Current => f.write_str("current"),
            Self::Saved(id) => write!(f, "saved:{}", id),
            Self::Scratch => f.write_str("scratch"),
        }
    }
}

/// Raw document storage. Every write replaces the whole document.
pub trait DocumentStore: Send {
    fn load_raw(&self, id: &DocumentId) -> Result<Option<String>>;
    fn store_raw(&mut self, id: &DocumentId, body: &str) -> Result<()>;
    fn remove(&mut self, id: &DocumentId) -> Result<()>;
    fn list_saved(&self) -> Result<Vec<String>>;
}

/// Documents as TOML files under one directory.
#[derive(Debug, Clone)]
pub struct TomlStore {
    dir: PathBuf,
}

impl TomlStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(dir.join("saved"))
            .context(format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn saved_dir(&self) -> PathBuf {
        self.dir.join("saved")
    }

    fn path(&self, id: &DocumentId) -> PathBuf {
        match id {
            DocumentId::Main => self.dir.join("main.toml"),
            DocumentId::Current => self.dir.join("current.toml"),
            DocumentId::Saved(id) => self.saved_dir().join(format!("{}.toml", id)),
            DocumentId::Scratch => self.dir.join("scratch.toml"),
        }
    }
}

impl DocumentStore for TomlStore {
    fn load_raw(&self, id: &DocumentId) -> Result<Option<String>> {
        let path = self.path(id);
        if !path.exists() {
            return Ok(None);
        }
        let body = fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))?;
        Ok(Some(body))
    }

    fn store_raw(&mut self, id: &DocumentId, body: &str) -> Result<()> {
        let path = self.path(id);
        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, body).context("Failed to write temporary file")?;
        fs::rename(&temp_path, &path).context("Failed to rename to final file")?;
        debug!(target: "altscreen::store", "Wrote {} to {}", id, path.display());
        Ok(())
    }

    fn remove(&mut self, id: &DocumentId) -> Result<()> {
        let path = self.path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context(format!("Failed to remove {}", path.display())),
        }
    }

    fn list_saved(&self) -> Result<Vec<String>> {
        let dir = self.saved_dir();
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).context(format!("Failed to list {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "toml")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-memory backend for tests and previews.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: BTreeMap<DocumentId, String>,
}

impl DocumentStore for MemoryStore {
    fn load_raw(&self, id: &DocumentId) -> Result<Option<String>> {
        Ok(self.docs.get(id).cloned())
    }

    fn store_raw(&mut self, id: &DocumentId, body: &str) -> Result<()> {
        self.docs.insert(id.clone(), body.to_string());
        Ok(())
    }

    fn remove(&mut self, id: &DocumentId) -> Result<()> {
        self.docs.remove(id);
        Ok(())
    }

    fn list_saved(&self) -> Result<Vec<String>> {
        Ok(self
            .docs
            .keys()
            .filter_map(|k| match k {
                DocumentId::Saved(id) => Some(id.clone()),
                _ => None,
            })
            .collect())
    }
}

/// Device-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainDocument {
    /// Physical panel metrics, captured once.
    pub native: Option<NativeDisplay>,
    /// Also write the `display_*_forced` settings that survive safe mode.
    pub safe_mode: bool,
    /// Leave a vendor home app running on a partial restart.
    pub keep_vendor_home: bool,
}

/// An edit in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing_id: Option<String>,
    #[serde(default)]
    pub profile: SavedProfile,
}

pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        bail!("Invalid profile id '{}'", id);
    }
    Ok(())
}

/// Typed accessor over a [`DocumentStore`].
pub struct ProfileStore {
    backend: Box<dyn DocumentStore>,
}

impl ProfileStore {
    pub fn new(backend: impl DocumentStore + 'static) -> Self {
        Self { backend: Box::new(backend) }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    fn read<T: DeserializeOwned>(&self, id: &DocumentId) -> Result<Option<T>> {
        match self.backend.load_raw(id)? {
            Some(body) => {
                let doc = toml::from_str(&body).context(format!("Failed to parse {}", id))?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&mut self, id: &DocumentId, doc: &T) -> Result<()> {
        let body = toml::to_string(doc).context(format!("Failed to serialize {}", id))?;
        self.backend.store_raw(id, &body)
    }

    pub fn main(&self) -> Result<MainDocument> {
        Ok(self.read(&DocumentId::Main)?.unwrap_or_default())
    }

    pub fn put_main(&mut self, main: &MainDocument) -> Result<()> {
        self.write(&DocumentId::Main, main)
    }

    /// The `Current` document, normalized. Absent means inactive.
    pub fn current(&self) -> Result<CurrentState> {
        let cur: Option<CurrentState> = self.read(&DocumentId::Current)?;
        Ok(cur.map(CurrentState::normalized).unwrap_or_else(CurrentState::inactive))
    }

    pub fn put_current(&mut self, current: &CurrentState) -> Result<()> {
        self.write(&DocumentId::Current, current)
    }

    pub fn saved(&self, id: &str) -> Result<Option<SavedProfile>> {
        validate_id(id)?;
        self.read(&DocumentId::Saved(id.to_string()))
    }

    pub fn put_saved(&mut self, id: &str, profile: &SavedProfile) -> Result<()> {
        validate_id(id)?;
        self.write(&DocumentId::Saved(id.to_string()), profile)
    }

    pub fn remove_saved(&mut self, id: &str) -> Result<()> {
        validate_id(id)?;
        self.backend.remove(&DocumentId::Saved(id.to_string()))
    }

    /// All saved profiles ordered by id. Unreadable entries are skipped.
    pub fn list(&self) -> Result<Vec<(String, SavedProfile)>> {
        let mut out = Vec::new();
        for id in self.backend.list_saved()? {
            match self.read::<SavedProfile>(&DocumentId::Saved(id.clone())) {
                Ok(Some(p)) => out.push((id, p)),
                Ok(None) => {}
                Err(e) => warn!(target: "altscreen::store", "Skipping profile {}: {:#}", id, e),
            }
        }
        Ok(out)
    }

    pub fn scratch(&self) -> Result<Option<ScratchDocument>> {
        self.read(&DocumentId::Scratch)
    }

    pub fn put_scratch(&mut self, scratch: &ScratchDocument) -> Result<()> {
        self.write(&DocumentId::Scratch, scratch)
    }

    /// Copy a saved profile (or defaults for a new one) into Scratch.
    pub fn begin_edit(&mut self, id: Option<&str>) -> Result<ScratchDocument> {
        let scratch = match id {
            Some(id) => {
                let profile = self.saved(id)?.context(format!("Profile {} not found", id))?;
                ScratchDocument { editing_id: Some(id.to_string()), profile }
            }
            None => ScratchDocument::default(),
        };
        self.put_scratch(&scratch)?;
        Ok(scratch)
    }

    /// Set `title` or one profile field in Scratch. The value is read with
    /// the type the field already has.
    pub fn set_scratch_field(&mut self, key: &str, value: &str) -> Result<ScratchDocument> {
        let mut scratch = self.scratch()?.context("No profile is being edited")?;
        if key == "title" {
            scratch.profile.title = value.to_string();
        } else {
            scratch.profile.settings = with_field(&scratch.profile.settings, key, value)?;
        }
        self.put_scratch(&scratch)?;
        debug!(target: "altscreen::store", "Scratch {} = {}", key, value);
        Ok(scratch)
    }

    /// Write Scratch back as a saved profile and clear it. Returns the id.
    pub fn commit_scratch(&mut self, title: Option<&str>) -> Result<String> {
        let mut scratch = self.scratch()?.context("No profile is being edited")?;
        if let Some(t) = title {
            scratch.profile.title = t.to_string();
        }
        if scratch.profile.title.trim().is_empty() {
            bail!("Profile title must not be empty");
        }
        let id = match scratch.editing_id.take() {
            Some(id) => id,
            None => self.new_id()?,
        };
        self.put_saved(&id, &scratch.profile)?;
        self.backend.remove(&DocumentId::Scratch)?;
        info!(target: "altscreen::store", "Saved profile {} ({})", id, scratch.profile.title);
        Ok(id)
    }

    /// Load a profile file into Scratch as a new profile and commit it.
    pub fn import<P: AsRef<Path>>(&mut self, path: P) -> Result<String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
        let profile: SavedProfile =
            toml::from_str(&content).context(format!("Failed to parse {}", path.display()))?;
        self.put_scratch(&ScratchDocument { editing_id: None, profile })?;
        self.commit_scratch(None)
    }

    fn new_id(&self) -> Result<String> {
        let mut ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .context("System clock before epoch")?;
        let existing = self.backend.list_saved()?;
        while existing.contains(&ms.to_string()) {
            ms += 1;
        }
        Ok(ms.to_string())
    }
}

fn with_field(profile: &Profile, key: &str, value: &str) -> Result<Profile> {
    let mut doc = toml::Table::try_from(profile).context("Failed to serialize profile")?;
    let parsed = match doc.get(key).context(format!("Unknown profile field {}", key))? {
        toml::Value::Boolean(_) => toml::Value::Boolean(
            value.parse().context(format!("{} expects true or false", key))?,
        ),
        toml::Value::Integer(_) => {
            toml::Value::Integer(value.parse().context(format!("{} expects a number", key))?)
        }
        toml::Value::String(_) => toml::Value::String(value.to_string()),
        _ => toml::from_str::<toml::Table>(&format!("v = {}", value))
            .ok()
            .and_then(|mut t| t.remove("v"))
            .context(format!("Invalid value for {}: {}", key, value))?,
    };
    doc.insert(key.to_string(), parsed);
    doc.try_into()
        .context(format!("Invalid value for {}: {}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::{Density, Overscan, UiRefresh};

    fn profile(title: &str) -> SavedProfile {
        SavedProfile {
            title: title.into(),
            settings: Profile { density: Density::Dpi(240), ..Default::default() },
        }
    }

    #[test]
    fn test_missing_current_is_inactive() {
        let store = ProfileStore::in_memory();
        assert!(!store.current().unwrap().is_active());
        assert_eq!(store.main().unwrap(), MainDocument::default());
    }

    #[test]
    fn test_edit_and_commit_new_profile() {
        let mut store = ProfileStore::in_memory();
        let mut scratch = store.begin_edit(None).unwrap();
        scratch.profile.settings.show_touches = true;
        store.put_scratch(&scratch).unwrap();

        let id = store.commit_scratch(Some("Desk")).unwrap();
        assert!(id.parse::<u128>().is_ok());
        assert!(store.scratch().unwrap().is_none());

        let saved = store.saved(&id).unwrap().unwrap();
        assert_eq!(saved.title, "Desk");
        assert!(saved.settings.show_touches);
    }

    #[test]
    fn test_set_scratch_fields_by_type() {
        let mut store = ProfileStore::in_memory();
        store.begin_edit(None).unwrap();
        store.set_scratch_field("title", "Big screen").unwrap();
        store.set_scratch_field("density", "320").unwrap();
        store.set_scratch_field("show_touches", "true").unwrap();
        store.set_scratch_field("ui_refresh", "activity-manager").unwrap();
        let scratch = store
            .set_scratch_field("overscan", "{ enabled = true, top = 10, bottom = 10 }")
            .unwrap();

        let p = &scratch.profile;
        assert_eq!(p.title, "Big screen");
        assert_eq!(p.settings.density, Density::Dpi(320));
        assert!(p.settings.show_touches);
        assert_eq!(p.settings.ui_refresh, UiRefresh::ActivityManager);
        assert_eq!(
            p.settings.overscan,
            Overscan { enabled: true, top: 10, bottom: 10, ..Default::default() }
        );
    }

    #[test]
    fn test_set_scratch_rejects_bad_input() {
        let mut store = ProfileStore::in_memory();
        assert!(store.set_scratch_field("density", "320").is_err());
        store.begin_edit(None).unwrap();
        assert!(store.set_scratch_field("no_such_field", "1").is_err());
        assert!(store.set_scratch_field("show_touches", "maybe").is_err());
        assert!(store.set_scratch_field("ui_refresh", "sideways").is_err());
        assert_eq!(store.scratch().unwrap().unwrap().profile, SavedProfile::default());
    }

    #[test]
    fn test_edit_existing_keeps_id() {
        let mut store = ProfileStore::in_memory();
        store.put_saved("100", &profile("TV")).unwrap();
        store.begin_edit(Some("100")).unwrap();
        assert_eq!(store.commit_scratch(Some("Television")).unwrap(), "100");
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.saved("100").unwrap().unwrap().title, "Television");
    }

    #[test]
    fn test_commit_requires_title() {
        let mut store = ProfileStore::in_memory();
        store.begin_edit(None).unwrap();
        assert!(store.commit_scratch(None).is_err());
        assert!(store.commit_scratch(Some("")).is_err());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let store = ProfileStore::in_memory();
        assert!(store.saved("../main").is_err());
        assert!(store.saved("").is_err());
    }

    #[test]
    fn test_toml_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProfileStore::new(TomlStore::open(dir.path()).unwrap());
        store.put_saved("2", &profile("B")).unwrap();
        store.put_saved("1", &profile("A")).unwrap();
        let ids: Vec<_> = store.list().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["1", "2"]);

        store.remove_saved("1").unwrap();
        store.remove_saved("1").unwrap();
        assert!(store.saved("1").unwrap().is_none());
        assert!(dir.path().join("saved/2.toml").exists());
        assert!(!dir.path().join("saved/2.toml.tmp").exists());
    }

    #[test]
    fn test_import_profile_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("desk.toml");
        fs::write(&file, "title = \"Desk\"\n[settings]\nresolution = \"1920x1080\"\ndensity = \"240\"\n").unwrap();

        let mut store = ProfileStore::in_memory();
        let id = store.import(&file).unwrap();
        let saved = store.saved(&id).unwrap().unwrap();
        assert_eq!(saved.title, "Desk");
        assert_eq!(saved.settings.density, Density::Dpi(240));
    }
}
