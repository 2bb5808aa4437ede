//! Machine-image manifest retrieval and decoding.
//!
//! An import manifest is a small XML document describing the disk image:
//!
//! ```xml
//! <manifest>
//!   <file-format>VMDK</file-format>
//!   <import>
//!     <volume-size>4</volume-size>
//!   </import>
//! </manifest>
//! ```
//!
//! A JSON form (`{"fileFormat": "VMDK", "volumeSizeGb": 4}`) is accepted too.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The two manifest fields the importer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub file_format: String,
    /// Volume size in GiB. Sent as both the image byte count and the volume
    /// size of the import request.
    pub volume_size_gb: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "manifest")]
struct XmlManifest {
    #[serde(rename = "file-format")]
    file_format: String,
    import: XmlImport,
}

#[derive(Debug, Deserialize)]
struct XmlImport {
    #[serde(rename = "volume-size")]
    volume_size: u64,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("fetching manifest {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching manifest {url}: HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("reading manifest from response: {0}")]
    Read(#[source] reqwest::Error),

    #[error("deserializing XML manifest: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    #[error("deserializing JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid manifest: {0}")]
    Invalid(String),

    #[error("building HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ImageManifest {
    /// Decodes a manifest body, choosing JSON when it starts with `{` and XML otherwise.
    pub fn decode(body: &str) -> Result<Self, ManifestError> {
        let trimmed = body.trim_start();
        let manifest = if trimmed.starts_with('{') {
            serde_json::from_str::<ImageManifest>(trimmed)?
        } else {
            let xml: XmlManifest = quick_xml::de::from_str(trimmed)?;
            ImageManifest {
                file_format: xml.file_format,
                volume_size_gb: xml.import.volume_size,
            }
        };
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.file_format.trim().is_empty() {
            return Err(ManifestError::Invalid("file format is empty".into()));
        }
        if self.volume_size_gb == 0 {
            return Err(ManifestError::Invalid("volume size is zero".into()));
        }
        Ok(())
    }
}

/// Something that can turn a manifest URL into an [`ImageManifest`].
#[allow(async_fn_in_trait)]
pub trait ManifestSource {
    async fn fetch(&self, url: &str) -> Result<ImageManifest, ManifestError>;
}

/// Fetches manifests with a plain HTTP GET.
pub struct HttpManifestFetcher {
    client: Client,
}

impl HttpManifestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ManifestError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(ManifestError::Client)?;
        Ok(Self { client })
    }
}

impl ManifestSource for HttpManifestFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageManifest, ManifestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ManifestError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ManifestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(ManifestError::Read)?;
        debug!(url, bytes = body.len(), "fetched manifest");
        ImageManifest::decode(&body)
    }
}
