//! HTTP client for a FHIR R4 server.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use catheter_watchdog_core::source::{merge_patient_ids, CatheterDataSource, SourceResult};
use catheter_watchdog_core::{CatheterRecord, FhirConfig, PatientId};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::bundle::{catheter_record_from_bundle, discovery_resources, parse_bundle};
use crate::{FhirError, FhirResult};

const FHIR_JSON: &str = "application/fhir+json";

/// FHIR REST data source.
pub struct FhirClient {
    base_url: Url,
    http: reqwest::Client,
    config: FhirConfig,
}

impl FhirClient {
    /// Create a client for the configured server.
    pub fn new(config: &FhirConfig) -> FhirResult<Self> {
        // Trailing slash so that `join` appends instead of replacing the
        // last path segment.
        let base = format!("{}/", config.server.trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|e| FhirError::InvalidUrl(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            http,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET {base}/metadata`; succeeds when the server answers 2xx.
    pub async fn check_server_status(&self) -> FhirResult<()> {
        let url = self.endpoint("metadata")?;
        self.get_text(url).await.map(|_| ())
    }

    /// First discovery page: catheter devices with their patients included.
    pub fn discovery_url(&self) -> FhirResult<Url> {
        let mut url = self.endpoint("Device")?;
        url.query_pairs_mut()
            .append_pair("type", &self.config.device_type)
            .append_pair("_include", "Device:patient")
            .append_pair("_count", &self.config.page_size.to_string());
        Ok(url)
    }

    /// Catheter devices for one patient, most recently updated first.
    pub fn device_url(&self, patient_id: &str) -> FhirResult<Url> {
        let mut url = self.endpoint("Device")?;
        url.query_pairs_mut()
            .append_pair("patient", patient_id)
            .append_pair("type", &self.config.device_type)
            .append_pair("_sort", "-_lastUpdated");
        Ok(url)
    }

    /// Resolve a `next` link; relative links are taken against the base.
    pub fn resolve_link(&self, link: &str) -> FhirResult<Url> {
        self.base_url
            .join(link)
            .map_err(|e| FhirError::InvalidUrl(e.to_string()))
    }

    fn endpoint(&self, path: &str) -> FhirResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| FhirError::InvalidUrl(e.to_string()))
    }

    async fn get_text(&self, url: Url) -> FhirResult<String> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FhirError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    async fn discover(&self) -> FhirResult<BTreeSet<PatientId>> {
        let device_code = self.config.device_code.as_deref();
        let mut resources = Vec::new();
        let mut next = Some(self.discovery_url()?);
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages >= self.config.max_pages {
                warn!(max_pages = self.config.max_pages, "page limit reached, stopping discovery");
                break;
            }

            let page = match self.get_text(url).await.and_then(|body| parse_bundle(&body)) {
                Ok(page) => page,
                // A broken later page keeps what was already collected.
                Err(e) if pages > 0 => {
                    warn!(error = %e, page = pages + 1, "error fetching next page");
                    break;
                }
                Err(e) => return Err(e),
            };
            pages += 1;

            resources.extend(discovery_resources(&page, device_code));
            next = page.next_link().map(|link| self.resolve_link(link)).transpose()?;
        }

        let ids = merge_patient_ids(&resources);
        info!(patients = ids.len(), pages, "discovery complete");
        Ok(ids)
    }
}

#[async_trait]
impl CatheterDataSource for FhirClient {
    async fn discover_catheter_patients(&self) -> SourceResult<BTreeSet<PatientId>> {
        if let Err(e) = self.check_server_status().await {
            warn!(error = %e, server = %self.base_url, "FHIR server status check failed");
            return Ok(BTreeSet::new());
        }
        Ok(self.discover().await?)
    }

    async fn fetch_catheter_record(
        &self,
        patient_id: &str,
    ) -> SourceResult<Option<CatheterRecord>> {
        let url = self.device_url(patient_id)?;
        let body = self.get_text(url).await?;
        let bundle = parse_bundle(&body)?;
        Ok(catheter_record_from_bundle(
            patient_id,
            &bundle,
            self.config.device_code.as_deref(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &str) -> FhirClient {
        let config = FhirConfig {
            server: server.to_string(),
            page_size: 10,
            ..FhirConfig::default()
        };
        FhirClient::new(&config).unwrap()
    }

    #[test]
    fn test_discovery_url() {
        let client = client("https://hapi.fhir.org/baseR4");
        assert_eq!(
            client.discovery_url().unwrap().as_str(),
            "https://hapi.fhir.org/baseR4/Device?type=catheter&_include=Device%3Apatient&_count=10"
        );
    }

    #[test]
    fn test_device_url_escapes_id() {
        let client = client("https://hapi.fhir.org/baseR4/");
        assert_eq!(
            client.device_url("a b&c").unwrap().as_str(),
            "https://hapi.fhir.org/baseR4/Device?patient=a+b%26c&type=catheter&_sort=-_lastUpdated"
        );
    }

    #[test]
    fn test_resolve_links() {
        let client = client("https://r4.smarthealthit.org");
        assert_eq!(
            client.resolve_link("https://r4.smarthealthit.org/Device?page=2").unwrap().as_str(),
            "https://r4.smarthealthit.org/Device?page=2"
        );
        assert_eq!(
            client.resolve_link("/Device?_count=10&page=2").unwrap().as_str(),
            "https://r4.smarthealthit.org/Device?_count=10&page=2"
        );
    }

    #[test]
    fn test_invalid_server_url() {
        let config = FhirConfig {
            server: "not a url".into(),
            ..FhirConfig::default()
        };
        assert!(matches!(FhirClient::new(&config), Err(FhirError::InvalidUrl(_))));
    }
}
