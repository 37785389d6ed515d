use chrono::Utc;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// How requests prove who they come from.
///
/// The API accepts a bare key, or a timestamp plus an md5 of
/// `ts + private_key + public_key`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Auth {
    ApiKey {
        key: String,
    },
    Hash {
        public_key: String,
        private_key: String,
    },
}

impl Auth {
    /// Query parameters for a request made now.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        self.query_params_at(&Utc::now().timestamp_millis().to_string())
    }

    /// Query parameters for a request stamped with `ts`.
    pub fn query_params_at(&self, ts: &str) -> Vec<(&'static str, String)> {
        match self {
            Auth::ApiKey { key } => vec![("apikey", key.clone())],
            Auth::Hash {
                public_key,
                private_key,
            } => vec![
                ("ts", ts.to_string()),
                ("apikey", public_key.clone()),
                ("hash", sign(ts, private_key, public_key)),
            ],
        }
    }
}

// Keys stay out of debug output.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::ApiKey { .. } => f.write_str("Auth::ApiKey"),
            Auth::Hash { public_key, .. } => write!(f, "Auth::Hash({})", public_key),
        }
    }
}

/// Lowercase hex md5 of `ts + private_key + public_key`.
pub fn sign(ts: &str, private_key: &str, public_key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(ts.as_bytes());
    hasher.update(private_key.as_bytes());
    hasher.update(public_key.as_bytes());
    hex::encode(hasher.finalize())
}
