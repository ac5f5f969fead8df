use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::Settings;
use crate::rows::{DomainRecord, TrackingRecord};
use crate::types::{
    CreateSendingDomainRequest, CreateSubaccountRequest, CreateTrackingDomainRequest,
    CreatedSendingDomain, CreatedSubaccount, CreatedTrackingDomain, DkimKeys, Envelope,
    SendingDomain, Subaccount, TrackingDomain,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const SUBACCOUNT_HEADER: &str = "X-MSYS-SUBACCOUNT";
const USER_AGENT: &str = concat!("sparky-sp/", env!("CARGO_PKG_VERSION"));

/// Outcome of a call that did not produce the expected response
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{status} : {body} in {:.3} seconds", .elapsed.as_secs_f64())]
    Status {
        status: StatusCode,
        body: String,
        elapsed: Duration,
    },
    #[error("connection error: {0}")]
    Transport(reqwest::Error),
    #[error("failed to parse response: {0}")]
    Decode(serde_json::Error),
    #[error("invalid API address {0:?}")]
    Address(String),
}

/// SparkPost REST client. One method per resource/verb, one HTTP call each.
#[derive(Debug, Clone)]
pub struct SparkPostClient {
    http_client: Client,
    base: Url,
    api_key: String,
}

impl SparkPostClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ApiError::Transport)?;

        let address = settings.base_url();
        let base = match Url::parse(&address) {
            Ok(url) if !url.cannot_be_a_base() => url,
            _ => return Err(ApiError::Address(address)),
        };

        Ok(Self {
            http_client,
            base,
            api_key: settings.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Build a request for `/api/v1/<segments>`. Each segment is
    /// percent-encoded, so a domain can never add path segments or a query.
    fn request(
        &self,
        method: Method,
        segments: &[&str],
        subaccount: Option<u64>,
    ) -> Result<RequestBuilder, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Address(self.base.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        debug!(%method, %url, ?subaccount, "sending request");

        let mut request = self
            .http_client
            .request(method, url)
            .header(header::AUTHORIZATION, &self.api_key)
            .header(header::ACCEPT, "application/json");
        if let Some(id) = subaccount {
            request = request.header(SUBACCOUNT_HEADER, id.to_string());
        }
        Ok(request)
    }

    /// Send a request, returning the body only when the status is `expected`
    async fn send(&self, request: RequestBuilder, expected: StatusCode) -> Result<Vec<u8>, ApiError> {
        let started = Instant::now();
        let response = request.send().await.map_err(ApiError::Transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(ApiError::Transport)?;
        let elapsed = started.elapsed();
        debug!(%status, elapsed_ms = elapsed.as_millis() as u64, "response received");

        if status != expected {
            return Err(ApiError::Status {
                status,
                body: render_body(&body),
                elapsed,
            });
        }
        Ok(body.to_vec())
    }

    async fn send_results<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(request, StatusCode::OK).await?;
        serde_json::from_slice::<Envelope<T>>(&body)
            .map(|envelope| envelope.results)
            .map_err(ApiError::Decode)
    }

    pub async fn create_subaccount(&self, name: &str) -> Result<CreatedSubaccount, ApiError> {
        let request = self
            .request(Method::POST, &["subaccounts"], None)?
            .json(&CreateSubaccountRequest::new(name));
        self.send_results(request).await
    }

    pub async fn get_subaccount(&self, id: u64) -> Result<Subaccount, ApiError> {
        let request = self.request(Method::GET, &["subaccounts", &id.to_string()], None)?;
        self.send_results(request).await
    }

    pub async fn list_subaccounts(&self) -> Result<Vec<Subaccount>, ApiError> {
        let request = self.request(Method::GET, &["subaccounts"], None)?;
        self.send_results(request).await
    }

    /// Create a sending domain. Supplied DKIM keys replace key generation.
    pub async fn create_sending_domain(
        &self,
        record: &DomainRecord,
    ) -> Result<CreatedSendingDomain, ApiError> {
        let dkim = record.dkim.as_ref().map(|keys| DkimKeys {
            private: &keys.private,
            public: &keys.public,
            selector: &keys.selector,
            signing_domain: keys.signing_domain.as_deref(),
            headers: keys.headers.as_deref(),
        });
        let body = CreateSendingDomainRequest {
            domain: &record.domain,
            generate_dkim: dkim.is_none(),
            dkim,
            tracking_domain: record.tracking_domain.as_deref(),
        };

        let request = self
            .request(Method::POST, &["sending-domains"], Some(record.subaccount_id))?
            .json(&body);
        self.send_results(request).await
    }

    pub async fn get_sending_domain(
        &self,
        subaccount_id: u64,
        domain: &str,
    ) -> Result<SendingDomain, ApiError> {
        let request = self.request(Method::GET, &["sending-domains", domain], Some(subaccount_id))?;
        self.send_results(request).await
    }

    /// Delete a sending domain. The API answers 204 on success, never 200.
    pub async fn delete_sending_domain(&self, subaccount_id: u64, domain: &str) -> Result<(), ApiError> {
        let request =
            self.request(Method::DELETE, &["sending-domains", domain], Some(subaccount_id))?;
        self.send(request, StatusCode::NO_CONTENT).await?;
        Ok(())
    }

    pub async fn create_tracking_domain(
        &self,
        record: &TrackingRecord,
    ) -> Result<CreatedTrackingDomain, ApiError> {
        let body = CreateTrackingDomainRequest {
            domain: &record.domain,
            port: record.port,
            secure: record.secure,
            default: record.default,
        };
        let request = self
            .request(Method::POST, &["tracking-domains"], Some(record.subaccount_id))?
            .json(&body);
        self.send_results(request).await
    }

    pub async fn get_tracking_domain(
        &self,
        subaccount_id: u64,
        domain: &str,
    ) -> Result<TrackingDomain, ApiError> {
        let request = self.request(Method::GET, &["tracking-domains", domain], Some(subaccount_id))?;
        self.send_results(request).await
    }

    /// Delete a tracking domain. Success is 204 only.
    pub async fn delete_tracking_domain(&self, subaccount_id: u64, domain: &str) -> Result<(), ApiError> {
        let request =
            self.request(Method::DELETE, &["tracking-domains", domain], Some(subaccount_id))?;
        self.send(request, StatusCode::NO_CONTENT).await?;
        Ok(())
    }
}

/// Pretty-print JSON error bodies; anything else is shown as text
fn render_body(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(json) => serde_json::to_string_pretty(&json)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned()),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}
