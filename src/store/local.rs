use directories::ProjectDirs;
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    decode_records, themes_from_map, EntryStore, Listener, Listeners, SentimentCache, StoreError,
    Subscription, ThemeStore,
};
use crate::date::to_storage_key;
use crate::model::{Entry, EntryMap, SentimentResult, Theme, ThemeId};

const JOURNAL_DIR: &str = ".gooddays";
const JOURNAL_FILE: &str = "journal.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalScope {
    Project,
    Global,
}

#[derive(Debug, Clone)]
pub struct JournalLocation {
    pub path: PathBuf,
    pub scope: JournalScope,
}

/// On-disk shape, one raw value per record.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct JournalFile {
    #[serde(default)]
    entries: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    themes: BTreeMap<ThemeId, serde_yaml::Value>,
    #[serde(default)]
    sentiment: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Default)]
struct Journal {
    entries: EntryMap,
    themes: BTreeMap<ThemeId, Theme>,
    sentiment: BTreeMap<String, SentimentResult>,
    // Records that failed to decode, written back untouched.
    unreadable: JournalFile,
}

impl Journal {
    fn from_file(file: JournalFile) -> Self {
        let (entries, bad_entries) = decode_records(file.entries, "entry");
        let (themes, bad_themes) = decode_records(file.themes, "theme");
        let (sentiment, bad_sentiment) = decode_records(file.sentiment, "sentiment result");
        Journal {
            entries,
            themes,
            sentiment,
            unreadable: JournalFile {
                entries: bad_entries,
                themes: bad_themes,
                sentiment: bad_sentiment,
            },
        }
    }

    fn to_file(&self) -> Result<JournalFile, StoreError> {
        let mut file = self.unreadable.clone();
        for (key, entry) in &self.entries {
            file.entries.insert(key.clone(), serde_yaml::to_value(entry)?);
        }
        for (id, theme) in &self.themes {
            file.themes.insert(id.clone(), serde_yaml::to_value(theme)?);
        }
        for (key, result) in &self.sentiment {
            file.sentiment.insert(key.clone(), serde_yaml::to_value(result)?);
        }
        Ok(file)
    }
}

/// On-device journal kept in a single YAML file.
pub struct LocalStore {
    location: JournalLocation,
    // Serializes read-modify-write cycles on the file.
    file_lock: Mutex<()>,
    entry_listeners: Listeners<EntryMap>,
    theme_listeners: Listeners<Vec<Theme>>,
}

pub fn init_project_journal(dir: &Path) -> Result<JournalLocation, StoreError> {
    let journal_dir = dir.join(JOURNAL_DIR);
    fs::create_dir_all(&journal_dir).map_err(|source| StoreError::Io {
        path: journal_dir.display().to_string(),
        source,
    })?;
    let location = JournalLocation {
        path: journal_dir.join(JOURNAL_FILE),
        scope: JournalScope::Project,
    };
    if !location.path.exists() {
        write_journal(&location.path, &Journal::default())?;
        tracing::info!(path = %location.path.display(), "created journal");
    }
    Ok(location)
}

/// Nearest project journal at or above `start`, else the per-user one.
pub fn locate_journal(start: &Path) -> Result<JournalLocation, StoreError> {
    if let Some(path) = find_project_journal(start) {
        return Ok(JournalLocation {
            path,
            scope: JournalScope::Project,
        });
    }
    Ok(JournalLocation {
        path: global_journal_path()?,
        scope: JournalScope::Global,
    })
}

fn find_project_journal(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(JOURNAL_DIR).join(JOURNAL_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_journal_path() -> Result<PathBuf, StoreError> {
    let dirs = ProjectDirs::from("", "", "gooddays").ok_or(StoreError::NoDataDir)?;
    Ok(dirs.data_dir().join(JOURNAL_FILE))
}

fn read_journal(path: &Path) -> Result<Journal, StoreError> {
    if !path.exists() {
        return Ok(Journal::default());
    }
    let data = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if data.trim().is_empty() {
        return Ok(Journal::default());
    }
    let file: JournalFile = serde_yaml::from_str(&data)?;
    Ok(Journal::from_file(file))
}

fn write_journal(path: &Path, journal: &Journal) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let serialized = serde_yaml::to_string(&journal.to_file()?)?;
    fs::write(path, serialized).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn generate_id() -> ThemeId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

impl LocalStore {
    pub fn open(location: JournalLocation) -> Self {
        LocalStore {
            location,
            file_lock: Mutex::new(()),
            entry_listeners: Listeners::new(),
            theme_listeners: Listeners::new(),
        }
    }

    pub fn location(&self) -> &JournalLocation {
        &self.location
    }

    fn load(&self) -> Result<Journal, StoreError> {
        let _guard = self.file_lock.lock();
        read_journal(&self.location.path)
    }

    fn update<R>(
        &self,
        f: impl FnOnce(&mut Journal) -> Result<R, StoreError>,
    ) -> Result<(R, Journal), StoreError> {
        let _guard = self.file_lock.lock();
        let mut journal = read_journal(&self.location.path)?;
        let out = f(&mut journal)?;
        write_journal(&self.location.path, &journal)?;
        Ok((out, journal))
    }
}

impl EntryStore for LocalStore {
    fn entries(&self) -> Result<EntryMap, StoreError> {
        Ok(self.load()?.entries)
    }

    fn subscribe_entries(&self, listener: Listener<EntryMap>) -> Result<Subscription, StoreError> {
        listener(&self.entries()?);
        Ok(self.entry_listeners.add(listener))
    }

    fn upsert(&self, entry: &Entry) -> Result<(), StoreError> {
        let ((), journal) = self.update(|journal| {
            journal.entries.insert(entry.storage_key(), entry.clone());
            Ok(())
        })?;
        self.entry_listeners.notify(&journal.entries);
        Ok(())
    }

    fn remove_entry(&self, date: &str) -> Result<(), StoreError> {
        let key = to_storage_key(date);
        let ((), journal) = self.update(|journal| {
            journal
                .entries
                .remove(&key)
                .map(|_| ())
                .ok_or_else(|| StoreError::EntryNotFound(date.to_string()))
        })?;
        self.entry_listeners.notify(&journal.entries);
        Ok(())
    }
}

impl ThemeStore for LocalStore {
    fn themes(&self) -> Result<Vec<Theme>, StoreError> {
        Ok(themes_from_map(self.load()?.themes))
    }

    fn subscribe_themes(&self, listener: Listener<Vec<Theme>>) -> Result<Subscription, StoreError> {
        listener(&self.themes()?);
        Ok(self.theme_listeners.add(listener))
    }

    fn save_theme(&self, theme: &Theme) -> Result<ThemeId, StoreError> {
        let mut theme = theme.clone().validated()?;
        let (id, journal) = self.update(|journal| {
            let id = match theme.id.take() {
                Some(id) if journal.themes.contains_key(&id) => id,
                Some(id) => return Err(StoreError::ThemeNotFound(id)),
                None => generate_id(),
            };
            journal.themes.insert(id.clone(), theme);
            Ok(id)
        })?;
        self.theme_listeners.notify(&themes_from_map(journal.themes));
        Ok(id)
    }

    fn delete_theme(&self, id: &str) -> Result<(), StoreError> {
        let ((), journal) = self.update(|journal| {
            journal
                .themes
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| StoreError::ThemeNotFound(id.to_string()))
        })?;
        self.theme_listeners.notify(&themes_from_map(journal.themes));
        Ok(())
    }
}

impl SentimentCache for LocalStore {
    fn load_sentiment(&self, window_key: &str) -> Result<Option<SentimentResult>, StoreError> {
        Ok(self.load()?.sentiment.remove(window_key))
    }

    fn save_sentiment(&self, window_key: &str, result: &SentimentResult) -> Result<(), StoreError> {
        self.update(|journal| {
            journal
                .sentiment
                .insert(window_key.to_string(), result.clone());
            Ok(())
        })?;
        Ok(())
    }
}
