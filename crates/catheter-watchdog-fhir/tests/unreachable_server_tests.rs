//! Behaviour against a server that is not there.
//!
//! Port 9 (discard) on loopback refuses connections, so these run offline.

use catheter_watchdog_core::source::{CatheterDataSource, SourceError};
use catheter_watchdog_core::FhirConfig;
use catheter_watchdog_fhir::FhirClient;

fn offline_client() -> FhirClient {
    let config = FhirConfig {
        server: "http://127.0.0.1:9/fhir".into(),
        request_timeout_secs: 2,
        ..FhirConfig::default()
    };
    FhirClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_status_check_fails() {
    assert!(offline_client().check_server_status().await.is_err());
}

#[tokio::test]
async fn test_discovery_degrades_to_empty_set() {
    let patients = offline_client().discover_catheter_patients().await.unwrap();
    assert!(patients.is_empty());
}

#[tokio::test]
async fn test_fetch_reports_unreachable() {
    let err = offline_client()
        .fetch_catheter_record("patient-001")
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::DataSourceUnreachable(_)));
}
