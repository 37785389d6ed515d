//! Scripted stand-in for the remote API.

use async_trait::async_trait;
use marvel_client::cache::CacheConfig;
use marvel_client::storage::{KeyValueStore, StorageContext};
use marvel_client::{Auth, ClientConfig, MarvelClient, Transport, TransportError};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use surf::Url;
use tokio::time::Instant;

type Responder = Box<dyn Fn(&Request) -> Result<String, TransportError> + Send + Sync>;
type Delay = Box<dyn Fn(&Request) -> Duration + Send + Sync>;

/// What the fake API saw.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub at: Instant,
}

impl Request {
    pub fn param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// `nameStartsWith`, empty when absent.
    pub fn prefix(&self) -> String {
        self.param("nameStartsWith").unwrap_or_default()
    }

    pub fn is_comics(&self) -> bool {
        self.url.path().ends_with("/comics")
    }
}

pub struct FakeApi {
    requests: Mutex<Vec<Request>>,
    responder: Responder,
    delay: Delay,
}

impl FakeApi {
    pub fn new(
        responder: impl Fn(&Request) -> Result<String, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(vec![]),
            responder: Box::new(responder),
            delay: Box::new(|_| Duration::ZERO),
        }
    }

    /// Serves a fixed roster, filtered by prefix like the real API.
    pub fn roster() -> Self {
        Self::new(|request| {
            if request.is_comics() {
                return Ok(envelope(json!([
                    {"id": 9999, "title": "Sample Comic",
                     "thumbnail": {"path": "http://example.com/comic", "extension": "jpg"},
                     "dates": [{"type": "onsaleDate", "date": "2020-01-01T00:00:00-0500"}]}
                ])));
            }
            let prefix = request.prefix().to_lowercase();
            let matching: Vec<_> = roster()
                .into_iter()
                .filter(|(_, name)| name.to_lowercase().starts_with(&prefix))
                .map(|(id, name)| json!({"id": id, "name": name}))
                .collect();
            Ok(envelope(json!(matching)))
        })
    }

    pub fn with_delay(
        mut self,
        delay: impl Fn(&Request) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn character_requests(&self) -> Vec<Request> {
        self.requests().into_iter().filter(|r| !r.is_comics()).collect()
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn get(&self, url: Url) -> Result<String, TransportError> {
        let request = Request {
            url,
            at: Instant::now(),
        };
        self.requests.lock().unwrap().push(request.clone());
        let delay = (self.delay)(&request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(&request)
    }
}

pub fn roster() -> Vec<(u64, &'static str)> {
    vec![
        (1011334, "3-D Man"),
        (1009610, "Spider-Man"),
        (1009608, "Spider-Woman"),
        (1009351, "Hulk"),
        (1009664, "Thor"),
    ]
}

pub fn envelope(results: serde_json::Value) -> String {
    json!({"code": 200, "data": {"results": results}}).to_string()
}

pub fn client_for(api: Arc<FakeApi>, store: &StorageContext) -> MarvelClient {
    let config = ClientConfig::new(
        "https://gateway.marvel.com/v1/",
        Auth::ApiKey {
            key: "test".to_string(),
        },
    );
    let store: Arc<dyn KeyValueStore> = Arc::new(store.clone());
    MarvelClient::with_cache(config, store, CacheConfig::default()).with_transport(api)
}
