// Diagram server HTTP client
//
// Wraps `reqwest::Client` with URL construction against the server root,
// status checking, and body decoding that keeps the raw payload around
// for diagnostics. The diagram payload is returned as untyped JSON;
// `pixwire-core` owns the snapshot schema.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const DIAGRAM_PATH: &str = "api/diagram";
const FEED_PATH: &str = "api/xlights/stream";

/// Raw HTTP client for the diagram server.
///
/// Every endpoint is resolved relative to the server root, so a server
/// mounted under a path prefix (`https://host/pixwire/`) works the same
/// as one at the origin.
pub struct DiagramClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DiagramClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
        }
    }

    /// The server root every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the server-sent controller feed.
    pub fn feed_url(&self) -> Result<Url, Error> {
        Ok(self.base_url.join(FEED_PATH)?)
    }

    // ── Diagram endpoints ────────────────────────────────────────────

    /// Fetch the saved diagram.
    ///
    /// The server answers `{}` when nothing has been saved yet; that is
    /// reported as `Ok(None)` so callers start from an empty store.
    pub async fn load_diagram(&self) -> Result<Option<Map<String, Value>>, Error> {
        let url = self.base_url.join(DIAGRAM_PATH)?;
        let value: Value = self.get(url).await?;

        match value {
            Value::Object(map) if map.is_empty() => {
                debug!("server has no saved diagram");
                Ok(None)
            }
            Value::Object(map) => Ok(Some(map)),
            other => Err(Error::Deserialization {
                message: "diagram payload is not a JSON object".into(),
                body: other.to_string(),
            }),
        }
    }

    /// Persist a diagram snapshot.
    pub async fn save_diagram<T: Serialize + ?Sized>(&self, diagram: &T) -> Result<(), Error> {
        let url = self.base_url.join(DIAGRAM_PATH)?;
        debug!(url = %url, "POST diagram");

        let resp = self.http.post(url).json(diagram).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    // ── Transport helpers ────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!(url = %url, "GET");
        let resp = self.http.get(url).send().await?;
        let resp = check_status(resp).await?;
        let body = resp.text().await?;
        trace!(len = body.len(), "response body received");
        parse_json(&body)
    }
}

/// Make sure the base path ends in `/` so relative joins keep the prefix.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Turn a non-success response into [`Error::Status`].
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        message,
    })
}

pub(crate) fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = normalize_base(Url::parse("http://localhost:3001/pixwire").unwrap());
        assert_eq!(url.as_str(), "http://localhost:3001/pixwire/");
        assert_eq!(
            url.join(DIAGRAM_PATH).unwrap().as_str(),
            "http://localhost:3001/pixwire/api/diagram"
        );
    }

    #[test]
    fn origin_url_is_untouched() {
        let url = normalize_base(Url::parse("http://localhost:3001").unwrap());
        assert_eq!(
            url.join(FEED_PATH).unwrap().as_str(),
            "http://localhost:3001/api/xlights/stream"
        );
    }

    #[test]
    fn parse_json_keeps_body_on_failure() {
        let err = parse_json::<Value>("{nope").unwrap_err();
        assert!(matches!(err, Error::Deserialization { ref body, .. } if body == "{nope"));
    }
}
