//! HTTP client for the compute service.
//!
//! [`ComputeClient`] is the seam the importer talks through; [`HttpComputeClient`]
//! speaks JSON over REST and maps throttling and error statuses to [`ClientError`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ClientError;
use super::types::{
    AvailabilityZone, DescribeAvailabilityZonesOutput, DescribeConversionTasksOutput,
    DescribeVolumesOutput, ImportVolumeOutput, ImportVolumeRequest,
};
use crate::waiter::{self, WaitError, WaiterConfig};

/// Typed access to the compute service.
///
/// `HttpComputeClient` is the production implementation; tests provide
/// scripted ones.
#[allow(async_fn_in_trait)]
pub trait ComputeClient {
    /// Region the client is bound to.
    fn region(&self) -> &str;

    /// Lists availability zones whose state equals `state`, in service order.
    async fn describe_availability_zones(
        &self,
        state: &str,
    ) -> Result<Vec<AvailabilityZone>, ClientError>;

    /// Submits an import-volume conversion task.
    async fn import_volume(
        &self,
        req: &ImportVolumeRequest,
    ) -> Result<ImportVolumeOutput, ClientError>;

    async fn describe_conversion_tasks(
        &self,
        task_ids: &[String],
    ) -> Result<DescribeConversionTasksOutput, ClientError>;

    async fn describe_volumes(
        &self,
        volume_ids: &[String],
    ) -> Result<DescribeVolumesOutput, ClientError>;

    /// Blocks until the volume is available, it fails, or `config` runs out
    /// of attempts.
    async fn wait_until_volume_available(
        &self,
        volume_id: &str,
        config: &WaiterConfig,
    ) -> Result<(), WaitError> {
        let ids = [volume_id.to_string()];
        let ids = &ids[..];
        waiter::wait(|| self.describe_volumes(ids), config).await
    }
}

/// JSON-over-HTTP compute client.
pub struct HttpComputeClient {
    client: Client,
    endpoint: String,
    region: String,
    access_token: Option<String>,
}

impl HttpComputeClient {
    pub fn with_endpoint(
        endpoint: String,
        region: String,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            region,
            access_token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        debug!(operation, region = %self.region, "sending request");

        let response = request.header("x-region", &self.region).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(1000);
            return Err(ClientError::Throttled {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| ClientError::Decode { operation, source })
    }
}

impl ComputeClient for HttpComputeClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_availability_zones(
        &self,
        state: &str,
    ) -> Result<Vec<AvailabilityZone>, ClientError> {
        let request = self
            .client
            .get(self.url("availability-zones"))
            .query(&[("state", state)]);
        let out: DescribeAvailabilityZonesOutput =
            self.send("DescribeAvailabilityZones", request).await?;
        Ok(out.availability_zones)
    }

    async fn import_volume(
        &self,
        req: &ImportVolumeRequest,
    ) -> Result<ImportVolumeOutput, ClientError> {
        let request = self.client.post(self.url("import-volume")).json(req);
        self.send("ImportVolume", request).await
    }

    async fn describe_conversion_tasks(
        &self,
        task_ids: &[String],
    ) -> Result<DescribeConversionTasksOutput, ClientError> {
        let request = self
            .client
            .get(self.url("conversion-tasks"))
            .query(&[("ids", task_ids.join(","))]);
        self.send("DescribeConversionTasks", request).await
    }

    async fn describe_volumes(
        &self,
        volume_ids: &[String],
    ) -> Result<DescribeVolumesOutput, ClientError> {
        let request = self
            .client
            .get(self.url("volumes"))
            .query(&[("ids", volume_ids.join(","))]);
        self.send("DescribeVolumes", request).await
    }
}
