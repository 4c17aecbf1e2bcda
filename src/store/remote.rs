use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::subscription::spawn_poller;
use super::{
    decode_entries, decode_themes, EntryStore, Listener, Listeners, SentimentCache,
    SharedListener, StoreError, Subscription, ThemeStore,
};
use crate::date::to_storage_key;
use crate::model::{Entry, EntryMap, SentimentResult, Theme, ThemeId};

const ENTRIES: &str = "moodData";
const THEMES: &str = "themes";
const SENTIMENT: &str = "sentimentData";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Realtime-database REST backend: each path is a JSON document at
/// `{base}/{path}.json`.
///
/// Subscribers get this handle's own writes right away, and everyone else's
/// on the next poll.
pub struct RemoteStore {
    endpoint: Endpoint,
    poll_interval: Duration,
    entry_listeners: Listeners<EntryMap>,
    theme_listeners: Listeners<Vec<Theme>>,
}

/// Everything needed to talk to the backend; cheap to clone into pollers.
#[derive(Clone)]
struct Endpoint {
    client: Client,
    base_url: String,
    auth: Option<String>,
}

#[derive(Deserialize)]
struct PushReply {
    name: String,
}

impl Endpoint {
    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path)
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        let request = self
            .client
            .get(self.url(""))
            .query(&[("shallow", "true")]);
        let response = self
            .with_auth(request)
            .send()
            .map_err(|err| StoreError::Unreachable(err.to_string()))?;
        check(response, "").map(|_| ())
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        let response = self.with_auth(self.client.get(self.url(path))).send()?;
        let body: Value = check(response, path)?.json()?;
        if body.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(body)?))
    }

    fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<(), StoreError> {
        let response = self
            .with_auth(self.client.put(self.url(path)).json(body))
            .send()?;
        check(response, path).map(|_| ())
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<String, StoreError> {
        let response = self
            .with_auth(self.client.post(self.url(path)).json(body))
            .send()?;
        let reply: PushReply = check(response, path)?.json()?;
        Ok(reply.name)
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let response = self.with_auth(self.client.delete(self.url(path))).send()?;
        check(response, path).map(|_| ())
    }

    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.get::<Value>(path)?.is_some())
    }

    fn entries(&self) -> Result<EntryMap, StoreError> {
        let raw: BTreeMap<String, Value> = self.get(ENTRIES)?.unwrap_or_default();
        Ok(decode_entries(raw))
    }

    fn themes(&self) -> Result<Vec<Theme>, StoreError> {
        let raw: BTreeMap<String, Value> = self.get(THEMES)?.unwrap_or_default();
        Ok(decode_themes(raw))
    }
}

impl RemoteStore {
    /// Builds the client and checks the backend answers within `timeout`.
    pub fn connect(
        base_url: impl Into<String>,
        auth: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = Endpoint {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        };
        endpoint.check_reachable()?;
        tracing::info!(url = %endpoint.base_url, "connected to remote store");
        Ok(RemoteStore {
            endpoint,
            poll_interval: DEFAULT_POLL_INTERVAL,
            entry_listeners: Listeners::new(),
            theme_listeners: Listeners::new(),
        })
    }

    /// How often subscriptions re-read the backend. Zero turns polling off.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn watch<T>(
        &self,
        name: &'static str,
        listeners: &Listeners<T>,
        listener: Listener<T>,
        fetch: fn(&Endpoint) -> Result<T, StoreError>,
    ) -> Result<Subscription, StoreError>
    where
        T: PartialEq + Send + 'static,
    {
        let current = fetch(&self.endpoint)?;
        let listener: SharedListener<T> = Arc::from(listener);
        listener(&current);

        let forward = Arc::clone(&listener);
        let subscription = listeners.add(Box::new(move |value: &T| forward(value)));
        if self.poll_interval.is_zero() {
            return Ok(subscription);
        }
        let endpoint = self.endpoint.clone();
        let poller = spawn_poller(
            name,
            self.poll_interval,
            current,
            move || fetch(&endpoint),
            listener,
        )?;
        Ok(subscription.also(move || drop(poller)))
    }

    fn notify_entries(&self) -> Result<(), StoreError> {
        if !self.entry_listeners.is_empty() {
            self.entry_listeners.notify(&self.endpoint.entries()?);
        }
        Ok(())
    }

    fn notify_themes(&self) -> Result<(), StoreError> {
        if !self.theme_listeners.is_empty() {
            self.theme_listeners.notify(&self.endpoint.themes()?);
        }
        Ok(())
    }
}

fn check(response: Response, path: &str) -> Result<Response, StoreError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(StoreError::Status {
            status: response.status().as_u16(),
            path: path.to_string(),
        })
    }
}

impl EntryStore for RemoteStore {
    fn entries(&self) -> Result<EntryMap, StoreError> {
        self.endpoint.entries()
    }

    fn subscribe_entries(&self, listener: Listener<EntryMap>) -> Result<Subscription, StoreError> {
        self.watch("entries", &self.entry_listeners, listener, Endpoint::entries)
    }

    fn upsert(&self, entry: &Entry) -> Result<(), StoreError> {
        self.endpoint
            .put(&format!("{}/{}", ENTRIES, entry.storage_key()), entry)?;
        self.notify_entries()
    }

    fn remove_entry(&self, date: &str) -> Result<(), StoreError> {
        let path = format!("{}/{}", ENTRIES, to_storage_key(date));
        if !self.endpoint.exists(&path)? {
            return Err(StoreError::EntryNotFound(date.to_string()));
        }
        self.endpoint.delete(&path)?;
        self.notify_entries()
    }
}

impl ThemeStore for RemoteStore {
    fn themes(&self) -> Result<Vec<Theme>, StoreError> {
        self.endpoint.themes()
    }

    fn subscribe_themes(&self, listener: Listener<Vec<Theme>>) -> Result<Subscription, StoreError> {
        self.watch("themes", &self.theme_listeners, listener, Endpoint::themes)
    }

    fn save_theme(&self, theme: &Theme) -> Result<ThemeId, StoreError> {
        let mut body = theme.clone().validated()?;
        let id = match body.id.take() {
            Some(id) => {
                let path = format!("{}/{}", THEMES, id);
                if !self.endpoint.exists(&path)? {
                    return Err(StoreError::ThemeNotFound(id));
                }
                self.endpoint.put(&path, &body)?;
                id
            }
            None => self.endpoint.post(THEMES, &body)?,
        };
        self.notify_themes()?;
        Ok(id)
    }

    fn delete_theme(&self, id: &str) -> Result<(), StoreError> {
        let path = format!("{}/{}", THEMES, id);
        if !self.endpoint.exists(&path)? {
            return Err(StoreError::ThemeNotFound(id.to_string()));
        }
        self.endpoint.delete(&path)?;
        self.notify_themes()
    }
}

impl SentimentCache for RemoteStore {
    fn load_sentiment(&self, window_key: &str) -> Result<Option<SentimentResult>, StoreError> {
        self.endpoint.get(&format!("{}/{}", SENTIMENT, window_key))
    }

    fn save_sentiment(&self, window_key: &str, result: &SentimentResult) -> Result<(), StoreError> {
        self.endpoint
            .put(&format!("{}/{}", SENTIMENT, window_key), result)
    }
}
