use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{FactError, FactResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP reader for facts owned by one peer service.
///
/// The caller's `Authorization` header is forwarded untouched so the peer
/// authenticates and authorizes the lookup on its own. Requests are bounded
/// by the client timeout and never retried.
#[derive(Clone)]
pub struct FactFetcher {
    client: Client,
    base_url: Url,
    target: &'static str,
}

impl FactFetcher {
    pub fn new(target: &'static str, base_url: &str, timeout: Duration) -> FactResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FactError::Misconfigured {
                target,
                reason: err.to_string(),
            })?;
        Self::with_client(client, target, base_url)
    }

    pub fn with_client(client: Client, target: &'static str, base_url: &str) -> FactResult<Self> {
        let base_url = Url::parse(base_url).map_err(|err| FactError::Misconfigured {
            target,
            reason: format!("invalid base url '{base_url}': {err}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FactError::Misconfigured {
                target,
                reason: format!("base url '{base_url}' cannot carry a path"),
            });
        }
        Ok(Self {
            client,
            base_url,
            target,
        })
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET a JSON document at `segments` (each segment is percent-encoded).
    pub async fn fetch<T: DeserializeOwned>(&self, segments: &[&str], bearer: &str) -> FactResult<T> {
        let url = self.url(segments);
        let response = self.send(Method::GET, url.clone(), bearer).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.classify(status, &url));
        }
        let fact = response.json::<T>().await.map_err(|err| {
            warn!(target_service = self.target, %url, error = %err, "undecodable fact response");
            FactError::Unavailable {
                target: self.target,
                reason: "undecodable response".to_string(),
            }
        })?;
        debug!(target_service = self.target, %url, "fetched remote fact");
        Ok(fact)
    }

    /// HEAD `segments`: `Ok(true)` on 2xx, `Ok(false)` on 404, error otherwise.
    pub async fn probe(&self, segments: &[&str], bearer: &str) -> FactResult<bool> {
        let url = self.url(segments);
        let response = self.send(Method::HEAD, url.clone(), bearer).await?;
        let status = response.status();
        if status.is_success() {
            debug!(target_service = self.target, %url, "remote resource exists");
            return Ok(true);
        }
        match self.classify(status, &url) {
            FactError::NotFound { .. } => Ok(false),
            other => Err(other),
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, method: Method, url: Url, bearer: &str) -> FactResult<reqwest::Response> {
        self.client
            .request(method, url.clone())
            .header(AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(|err| {
                let reason = if err.is_timeout() {
                    "request timed out".to_string()
                } else if err.is_connect() {
                    "connection failed".to_string()
                } else {
                    err.to_string()
                };
                warn!(target_service = self.target, %url, %reason, "remote fact request failed");
                FactError::Unavailable {
                    target: self.target,
                    reason,
                }
            })
    }

    fn classify(&self, status: StatusCode, url: &Url) -> FactError {
        let err = match status {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => FactError::NotFound {
                target: self.target,
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FactError::Denied {
                target: self.target,
                status: status.as_u16(),
            },
            other => FactError::Unavailable {
                target: self.target,
                reason: format!("HTTP {}", other.as_u16()),
            },
        };
        warn!(target_service = self.target, %url, status = status.as_u16(), kind = err.kind(), "remote fact lookup rejected");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_segments_are_encoded() {
        let fetcher = FactFetcher::new("class-service", "http://class:4002/", DEFAULT_TIMEOUT).unwrap();
        let url = fetcher.url(&["subjects", "../admin"]);
        assert_eq!(url.as_str(), "http://class:4002/subjects/..%2Fadmin");
    }

    #[test]
    fn base_path_is_preserved() {
        let fetcher = FactFetcher::new("class-service", "http://gw/api/classes", DEFAULT_TIMEOUT).unwrap();
        let url = fetcher.url(&["subjects", "s1"]);
        assert_eq!(url.as_str(), "http://gw/api/classes/subjects/s1");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = FactFetcher::new("class-service", "not a url", DEFAULT_TIMEOUT).err().unwrap();
        assert!(matches!(err, FactError::Misconfigured { .. }));
    }
}
