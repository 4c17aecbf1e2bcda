use std::fmt;

use super::{
    EntryStore, Listener, SentimentCache, Store, StoreError, Subscription, ThemeStore,
};
use crate::model::{Entry, EntryMap, SentimentResult, Theme, ThemeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Remote,
    Local,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Remote => write!(f, "remote"),
            Backend::Local => write!(f, "local"),
        }
    }
}

/// Uses the primary store when it comes up, the fallback otherwise. The
/// choice is made once, at construction.
pub struct FallbackStore {
    active: Box<dyn Store>,
    backend: Backend,
    user: Option<String>,
}

impl FallbackStore {
    pub fn connect<F>(
        primary: Option<Result<Box<dyn Store>, StoreError>>,
        fallback: F,
    ) -> Result<Self, StoreError>
    where
        F: FnOnce() -> Result<Box<dyn Store>, StoreError>,
    {
        let (active, backend) = match primary {
            Some(Ok(store)) => (store, Backend::Remote),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "remote store unavailable, falling back to local journal");
                (fallback()?, Backend::Local)
            }
            None => (fallback()?, Backend::Local),
        };
        tracing::info!(backend = %backend, "store ready");
        Ok(FallbackStore {
            active,
            backend,
            user: None,
        })
    }

    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Opaque id of the signed-in user, if any.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

impl EntryStore for FallbackStore {
    fn entries(&self) -> Result<EntryMap, StoreError> {
        self.active.entries()
    }

    fn subscribe_entries(&self, listener: Listener<EntryMap>) -> Result<Subscription, StoreError> {
        self.active.subscribe_entries(listener)
    }

    fn upsert(&self, entry: &Entry) -> Result<(), StoreError> {
        self.active.upsert(entry)
    }

    fn remove_entry(&self, date: &str) -> Result<(), StoreError> {
        self.active.remove_entry(date)
    }
}

impl ThemeStore for FallbackStore {
    fn themes(&self) -> Result<Vec<Theme>, StoreError> {
        self.active.themes()
    }

    fn subscribe_themes(&self, listener: Listener<Vec<Theme>>) -> Result<Subscription, StoreError> {
        self.active.subscribe_themes(listener)
    }

    fn save_theme(&self, theme: &Theme) -> Result<ThemeId, StoreError> {
        self.active.save_theme(theme)
    }

    fn delete_theme(&self, id: &str) -> Result<(), StoreError> {
        self.active.delete_theme(id)
    }
}

impl SentimentCache for FallbackStore {
    fn load_sentiment(&self, window_key: &str) -> Result<Option<SentimentResult>, StoreError> {
        self.active.load_sentiment(window_key)
    }

    fn save_sentiment(&self, window_key: &str, result: &SentimentResult) -> Result<(), StoreError> {
        self.active.save_sentiment(window_key, result)
    }
}
