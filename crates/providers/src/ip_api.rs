//! Network estimate via an IP geolocation lookup.

use crate::{LocationSource, ProviderError, Reading, SourceKind};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_URL: &str = "http://ip-api.com/json/";

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct IpApiSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl IpApiSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl LocationSource for IpApiSource {
    fn name(&self) -> &str {
        "ip-api"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::NetworkEstimate
    }

    async fn locate(&self, _timeout: Duration) -> Result<Reading, ProviderError> {
        info!("estimating location from public IP via {}", self.url);
        let resp = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout)
            } else {
                ProviderError::RequestFailed(e.to_string())
            }
        })?;
        if !resp.status().is_success() {
            return Err(ProviderError::RequestFailed(format!(
                "HTTP {} from {}",
                resp.status(),
                self.url
            )));
        }

        let parsed: IpApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        if parsed.status != "success" {
            info!(
                "ip lookup returned status {:?}: {}",
                parsed.status,
                parsed.message.as_deref().unwrap_or("no message")
            );
            return Err(ProviderError::NoFix);
        }
        let (Some(latitude), Some(longitude)) = (parsed.lat, parsed.lon) else {
            return Err(ProviderError::Malformed("ip-api: missing lat/lon".into()));
        };

        info!(
            "IP location found: {}, {}",
            parsed.city.as_deref().unwrap_or("?"),
            parsed.country.as_deref().unwrap_or("?")
        );
        Ok(Reading {
            latitude,
            longitude,
            provider: "ip-api".to_string(),
        })
    }
}
