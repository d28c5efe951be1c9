//! Where the zone specification document comes from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, info};

use crate::error::WatchdogError;
use crate::spec::ZoneSetSpec;

/// Timeout for fetching a remote specification.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A specification source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    /// Local JSON file.
    File(PathBuf),
    /// Remote JSON document fetched once over HTTP(S).
    Remote(Url),
}

impl SpecSource {
    /// Build a remote source. Only `http` and `https` are accepted.
    pub fn remote(url: &str) -> Result<Self, WatchdogError> {
        let url = Url::parse(url)
            .map_err(|e| WatchdogError::RemoteFetch(format!("invalid URL {url:?}: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(SpecSource::Remote(url)),
            other => Err(WatchdogError::RemoteFetch(format!(
                "unsupported scheme {other:?}, only http and https are supported"
            ))),
        }
    }

    /// True for sources that can be watched for changes.
    pub fn is_watchable(&self) -> bool {
        matches!(self, SpecSource::File(_))
    }

    /// Load and parse the specification.
    pub async fn load(&self) -> Result<ZoneSetSpec, WatchdogError> {
        match self {
            SpecSource::File(path) => load_file(path),
            SpecSource::Remote(url) => fetch(url).await,
        }
    }
}

impl fmt::Display for SpecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecSource::File(path) => write!(f, "{}", path.display()),
            SpecSource::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Read and parse a local specification file.
pub fn load_file(path: &Path) -> Result<ZoneSetSpec, WatchdogError> {
    let bytes = std::fs::read(path).map_err(|e| WatchdogError::fs(path, e))?;
    let spec = ZoneSetSpec::from_slice(&bytes)?;
    debug!(path = %path.display(), roots = spec.len(), "Loaded zone specification");
    Ok(spec)
}

async fn fetch(url: &Url) -> Result<ZoneSetSpec, WatchdogError> {
    info!(%url, "Fetching remote zone specification");

    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    let spec = ZoneSetSpec::from_slice(&bytes)?;
    debug!(%url, roots = spec.len(), "Fetched zone specification");
    Ok(spec)
}
