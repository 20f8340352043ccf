// etcd v2 keys API client
//
// Wraps `reqwest::Client` with etcd-specific URL construction, form
// encoding and response unwrapping. Every method returns the unwrapped
// `node` payload -- the `{action, node, prevNode}` envelope and etcd
// error bodies never reach the caller.

use reqwest::RequestBuilder;
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::node::{Node, normalize_key};
use crate::store::KvStore;
use crate::transport::TransportConfig;

/// Successful etcd response envelope.
#[derive(Debug, Deserialize)]
struct EtcdResponse {
    #[allow(dead_code)]
    action: String,
    node: Option<Node>,
}

/// etcd error body, returned with a 4xx/5xx status.
#[derive(Debug, Deserialize)]
struct EtcdErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    cause: String,
}

/// HTTP client for the etcd v2 keys API.
///
/// `base_url` is the etcd client URL (e.g. `http://127.0.0.1:4001`); keys
/// are addressed under `{base_url}/v2/keys`.
#[derive(Debug, Clone)]
pub struct EtcdClient {
    http: reqwest::Client,
    base_url: Url,
}

impl EtcdClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The etcd base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build the URL for a key: `{base}/v2/keys{key}`.
    pub(crate) fn keys_url(&self, key: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let key = normalize_key(key);
        Ok(Url::parse(&format!("{base}/v2/keys{key}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a request and unwrap the etcd envelope.
    async fn send(&self, key: &str, builder: RequestBuilder) -> Result<Node, Error> {
        let resp = builder.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(%status, body = %body, "etcd response");

        if !status.is_success() {
            return Err(parse_error(key, status.as_u16(), &body));
        }

        let envelope: EtcdResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&body)),
                body: body.clone(),
            }
        })?;

        Ok(envelope.node.unwrap_or_else(|| Node {
            key: normalize_key(key),
            ..Node::default()
        }))
    }

    async fn get(&self, key: &str, recursive: bool) -> Result<Node, Error> {
        let url = self.keys_url(key)?;
        debug!(recursive, "GET {}", url);

        let mut builder = self.http.get(url);
        if recursive {
            builder = builder.query(&[("recursive", "true")]);
        }
        self.send(key, builder).await
    }

    async fn put(&self, key: &str, form: &[(&str, &str)]) -> Result<Node, Error> {
        let url = self.keys_url(key)?;
        debug!("PUT {}", url);

        self.send(key, self.http.put(url).form(form)).await
    }

    async fn remove(&self, key: &str, recursive: bool) -> Result<(), Error> {
        let url = self.keys_url(key)?;
        debug!(recursive, "DELETE {}", url);

        let mut builder = self.http.delete(url);
        if recursive {
            builder = builder.query(&[("recursive", "true"), ("dir", "true")]);
        }
        self.send(key, builder).await.map(|_| ())
    }
}

/// Map an error response onto an [`Error`].
///
/// etcd reports its own conditions as a JSON body with an `errorCode`;
/// anything else (proxies, crashed members) is surfaced as `Http`.
fn parse_error(key: &str, status: u16, body: &str) -> Error {
    match serde_json::from_str::<EtcdErrorBody>(body) {
        Ok(err) => match Error::from_etcd(err.error_code, err.message, err.cause) {
            Error::CompareFailed { cause, .. } => Error::CompareFailed {
                key: normalize_key(key),
                cause,
            },
            other => other,
        },
        Err(_) => Error::Http {
            status,
            message: preview(body),
        },
    }
}

/// First 200 characters of a response body, for error messages.
fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

impl KvStore for EtcdClient {
    async fn read(&self, key: &str) -> Result<Node, Error> {
        self.get(key, false).await
    }

    async fn read_recursive(&self, key: &str) -> Result<Node, Error> {
        self.get(key, true).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<Node, Error> {
        self.put(key, &[("value", value)]).await
    }

    async fn write_if_value(&self, key: &str, value: &str, prev_value: &str) -> Result<Node, Error> {
        self.put(key, &[("value", value), ("prevValue", prev_value)])
            .await
    }

    async fn mkdir(&self, key: &str) -> Result<Node, Error> {
        self.put(key, &[("dir", "true")]).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.remove(key, false).await
    }

    async fn delete_recursive(&self, key: &str) -> Result<(), Error> {
        self.remove(key, true).await
    }

    async fn append(&self, dir: &str, value: &str) -> Result<Node, Error> {
        let url = self.keys_url(dir)?;
        debug!("POST {}", url);

        self.send(dir, self.http.post(url).form(&[("value", value)]))
            .await
    }
}
