//! Patient discovery merging.
//!
//! A discovery response may name a patient directly or through a device's
//! back-reference. Both shapes fold into one identifier set.

use std::collections::BTreeSet;

use crate::models::PatientId;

const PATIENT_SEGMENT: &str = "Patient/";

/// One entry of a discovery response, reduced to what identifies a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveredResource {
    /// A patient record
    Patient { id: String },
    /// A device record with its patient reference, if any
    Device { patient_reference: Option<String> },
}

impl DiscoveredResource {
    /// Patient identifier carried by this entry, if any.
    pub fn patient_id(&self) -> Option<&str> {
        match self {
            DiscoveredResource::Patient { id } => Some(id.as_str()).filter(|id| !id.is_empty()),
            DiscoveredResource::Device { patient_reference } => patient_reference
                .as_deref()
                .and_then(patient_id_from_reference),
        }
    }
}

/// Extract the id from a patient reference.
///
/// Accepts relative (`Patient/123`), versioned (`Patient/123/_history/2`)
/// and absolute (`https://host/fhir/Patient/123`) forms.
pub fn patient_id_from_reference(reference: &str) -> Option<&str> {
    let rest = if let Some(rest) = reference.strip_prefix(PATIENT_SEGMENT) {
        rest
    } else {
        let idx = reference.find("/Patient/")?;
        &reference[idx + 1 + PATIENT_SEGMENT.len()..]
    };

    rest.split('/').next().filter(|id| !id.is_empty())
}

/// Merge discovery entries into a deduplicated, ordered identifier set.
pub fn merge_patient_ids<'a, I>(resources: I) -> BTreeSet<PatientId>
where
    I: IntoIterator<Item = &'a DiscoveredResource>,
{
    resources
        .into_iter()
        .filter_map(|r| r.patient_id())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_forms() {
        assert_eq!(patient_id_from_reference("Patient/123"), Some("123"));
        assert_eq!(patient_id_from_reference("Patient/123/_history/2"), Some("123"));
        assert_eq!(
            patient_id_from_reference("https://hapi.fhir.org/baseR4/Patient/abc"),
            Some("abc")
        );
        assert_eq!(patient_id_from_reference("Practitioner/9"), None);
        assert_eq!(patient_id_from_reference("Patient/"), None);
        assert_eq!(patient_id_from_reference(""), None);
    }

    #[test]
    fn test_merge_both_shapes() {
        let resources = vec![
            DiscoveredResource::Patient { id: "X".into() },
            DiscoveredResource::Device {
                patient_reference: Some("Patient/Y".into()),
            },
            DiscoveredResource::Device {
                patient_reference: Some("Patient/X".into()),
            },
        ];

        let ids = merge_patient_ids(&resources);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("X"));
        assert!(ids.contains("Y"));
    }

    #[test]
    fn test_merge_skips_unusable_entries() {
        let resources = vec![
            DiscoveredResource::Patient { id: String::new() },
            DiscoveredResource::Device { patient_reference: None },
            DiscoveredResource::Device {
                patient_reference: Some("Group/1".into()),
            },
        ];
        assert!(merge_patient_ids(&resources).is_empty());
    }
}
