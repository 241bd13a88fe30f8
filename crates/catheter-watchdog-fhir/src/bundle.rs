//! FHIR Bundle parsing.
//!
//! Only the fields the watchdog reads are modelled; everything else in the
//! resources is ignored.

use catheter_watchdog_core::schedule::parse_insertion_time;
use catheter_watchdog_core::source::DiscoveredResource;
use catheter_watchdog_core::CatheterRecord;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{FhirError, FhirResult};

/// SNOMED CT coding system URI.
pub const SNOMED_SYSTEM: &str = "http://snomed.info/sct";

/// SNOMED CT concept for a urinary catheter.
pub const URINARY_CATHETER_CODE: &str = "303620002";

const UNKNOWN_DEVICE_REFERENCE: &str = "Device/unknown";

/// A searchset Bundle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
    #[serde(default)]
    pub link: Vec<BundleLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleEntry {
    pub resource: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

/// The slice of a Device resource the watchdog uses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceResource {
    pub id: Option<String>,
    pub meta: Option<Meta>,
    pub patient: Option<Reference>,
    #[serde(rename = "type")]
    pub device_type: Option<CodeableConcept>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reference {
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Coding {
    pub system: Option<String>,
    pub code: Option<String>,
}

impl DeviceResource {
    /// Whether the device type carries the given SNOMED CT code.
    pub fn has_snomed_code(&self, code: &str) -> bool {
        self.device_type.as_ref().is_some_and(|t| {
            t.coding.iter().any(|c| {
                c.system.as_deref() == Some(SNOMED_SYSTEM) && c.code.as_deref() == Some(code)
            })
        })
    }

    /// True when there is no filter or the type carries the filter code.
    pub fn matches_filter(&self, device_code: Option<&str>) -> bool {
        device_code.map_or(true, |code| self.has_snomed_code(code))
    }

    /// `Device/{id}`, or a placeholder if the server omitted the id.
    pub fn reference(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => format!("Device/{}", id),
            _ => UNKNOWN_DEVICE_REFERENCE.to_string(),
        }
    }
}

impl Bundle {
    /// URL of the next page, if any.
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
    }

    /// Entry resources of the given `resourceType`.
    fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Value> {
        self.entry
            .iter()
            .filter_map(|e| e.resource.as_ref())
            .filter(move |r| r.get("resourceType").and_then(Value::as_str) == Some(resource_type))
    }
}

/// Parse a Bundle from a response body.
pub fn parse_bundle(json: &str) -> FhirResult<Bundle> {
    let bundle: Bundle = serde_json::from_str(json)?;
    Ok(bundle)
}

/// Reduce a discovery page to patient-identifying entries.
///
/// Device entries contribute their patient reference. Patient entries are
/// taken as-is, except under a `device_code` filter: `_include` brings in the
/// patients of every catheter device, so only back-references from matching
/// devices count then. Entries that do not parse are skipped.
pub fn discovery_resources(bundle: &Bundle, device_code: Option<&str>) -> Vec<DiscoveredResource> {
    let mut resources = Vec::new();

    for resource in bundle.entry.iter().filter_map(|e| e.resource.as_ref()) {
        match resource.get("resourceType").and_then(Value::as_str) {
            Some("Patient") if device_code.is_none() => {
                if let Some(id) = resource.get("id").and_then(Value::as_str) {
                    resources.push(DiscoveredResource::Patient { id: id.to_string() });
                }
            }
            Some("Device") => {
                let device = match DeviceResource::deserialize(resource) {
                    Ok(device) => device,
                    Err(e) => {
                        warn!(error = %e, "skipping device entry");
                        continue;
                    }
                };
                if !device.matches_filter(device_code) {
                    debug!(device = %device.reference(), "device type does not match filter");
                    continue;
                }
                resources.push(DiscoveredResource::Device {
                    patient_reference: device.patient.and_then(|p| p.reference),
                });
            }
            _ => {}
        }
    }

    resources
}

/// Catheter record from a `Device?patient=` search.
///
/// Picks the most recently updated Device that passes `device_code`, since
/// `meta.lastUpdated` stands in for the insertion time. Devices without it
/// are ignored. Unparseable timestamps rank below every valid one, and are
/// only returned when nothing better exists so the schedule check can
/// report them. Ties keep the first listed entry.
pub fn catheter_record_from_bundle(
    patient_id: &str,
    bundle: &Bundle,
    device_code: Option<&str>,
) -> FhirResult<Option<CatheterRecord>> {
    let mut latest: Option<(Option<DateTime<FixedOffset>>, DeviceResource, String)> = None;

    for resource in bundle.resources_of_type("Device") {
        let device = DeviceResource::deserialize(resource)
            .map_err(|e| FhirError::Shape(format!("Device for patient {}: {}", patient_id, e)))?;

        if !device.matches_filter(device_code) {
            debug!(patient_id, device = %device.reference(), "device type does not match filter");
            continue;
        }
        let Some(updated) = device.meta.as_ref().and_then(|m| m.last_updated.clone()) else {
            debug!(patient_id, device = %device.reference(), "device has no meta.lastUpdated");
            continue;
        };

        let key = parse_insertion_time(&updated).ok();
        if latest.as_ref().map_or(true, |(best, _, _)| key > *best) {
            latest = Some((key, device, updated));
        }
    }

    Ok(latest.map(|(_, device, inserted_at)| {
        CatheterRecord::new(patient_id, inserted_at, device.reference())
    }))
}
