//! Persistence seams. The rest of the crate only sees these traits; which
//! backend sits behind them is decided once, when the store is built.

mod fallback;
mod local;
mod remote;
mod subscription;

pub use fallback::{Backend, FallbackStore};
pub use local::{init_project_journal, locate_journal, JournalLocation, JournalScope, LocalStore};
pub use remote::RemoteStore;
pub use subscription::{Listeners, Subscription};

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use crate::model::{Entry, EntryMap, ModelError, SentimentResult, Theme, ThemeId};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed journal file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("malformed remote data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("remote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote store answered {status} for {path}")]
    Status { status: u16, path: String },
    #[error("remote store unreachable: {0}")]
    Unreachable(String),
    #[error("no data directory available")]
    NoDataDir,
    #[error("theme not found: {0}")]
    ThemeNotFound(ThemeId),
    #[error("no entry for {0}")]
    EntryNotFound(String),
    #[error(transparent)]
    Invalid(#[from] ModelError),
}

pub type Listener<T> = Box<dyn Fn(&T) + Send + Sync + 'static>;
pub(crate) type SharedListener<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

pub trait EntryStore {
    fn entries(&self) -> Result<EntryMap, StoreError>;
    /// Calls `listener` with the current entries now and after every change.
    fn subscribe_entries(&self, listener: Listener<EntryMap>) -> Result<Subscription, StoreError>;
    /// Replaces whatever is stored under the entry's date.
    fn upsert(&self, entry: &Entry) -> Result<(), StoreError>;
    fn remove_entry(&self, date: &str) -> Result<(), StoreError>;
}

pub trait ThemeStore {
    fn themes(&self) -> Result<Vec<Theme>, StoreError>;
    fn subscribe_themes(&self, listener: Listener<Vec<Theme>>) -> Result<Subscription, StoreError>;
    /// Creates the theme when it has no id, replaces it otherwise. Returns
    /// the id it is stored under.
    fn save_theme(&self, theme: &Theme) -> Result<ThemeId, StoreError>;
    fn delete_theme(&self, id: &str) -> Result<(), StoreError>;
}

pub trait SentimentCache {
    fn load_sentiment(&self, window_key: &str) -> Result<Option<SentimentResult>, StoreError>;
    fn save_sentiment(&self, window_key: &str, result: &SentimentResult) -> Result<(), StoreError>;
}

pub trait Store: EntryStore + ThemeStore + SentimentCache {}

impl<T: EntryStore + ThemeStore + SentimentCache> Store for T {}

/// Theme ids come from the map key, not the stored body.
pub(crate) fn themes_from_map<I>(raw: I) -> Vec<Theme>
where
    I: IntoIterator<Item = (String, Theme)>,
{
    raw.into_iter()
        .map(|(id, mut theme)| {
            theme.id = Some(id);
            theme
        })
        .collect()
}

/// Decodes each record on its own so one bad record does not hide the rest.
/// Returns the records that decoded and the raw values of those that did not.
pub(crate) fn decode_records<'de, T, V>(
    raw: BTreeMap<String, V>,
    kind: &'static str,
) -> (BTreeMap<String, T>, BTreeMap<String, V>)
where
    T: Deserialize<'de>,
    V: Deserializer<'de> + Clone,
    V::Error: Display,
{
    let mut decoded = BTreeMap::new();
    let mut rejected = BTreeMap::new();
    for (key, value) in raw {
        match T::deserialize(value.clone()) {
            Ok(record) => {
                decoded.insert(key, record);
            }
            Err(err) => {
                tracing::warn!(kind, key = %key, error = %err, "skipping malformed record");
                rejected.insert(key, value);
            }
        }
    }
    (decoded, rejected)
}

pub(crate) fn decode_entries<'de, V>(raw: BTreeMap<String, V>) -> EntryMap
where
    V: Deserializer<'de> + Clone,
    V::Error: Display,
{
    decode_records(raw, "entry").0
}

pub(crate) fn decode_themes<'de, V>(raw: BTreeMap<String, V>) -> Vec<Theme>
where
    V: Deserializer<'de> + Clone,
    V::Error: Display,
{
    let (themes, _): (BTreeMap<String, Theme>, _) = decode_records(raw, "theme");
    themes_from_map(themes)
}
