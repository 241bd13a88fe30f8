//! Property tests for the calculator, classifier and discovery merge.

use catheter_watchdog_core::models::CatheterStatus;
use catheter_watchdog_core::schedule::{hours_since_insertion, ProtocolThresholds};
use catheter_watchdog_core::source::{merge_patient_ids, DiscoveredResource};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

proptest! {
    #[test]
    fn elapsed_matches_offset(minutes in 0i64..(60 * 24 * 365)) {
        let inserted = (now() - Duration::minutes(minutes)).to_rfc3339();
        let hours = hours_since_insertion(&inserted, now()).unwrap();
        prop_assert!((hours - minutes as f64 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn elapsed_is_monotonic(a in 0i64..1_000_000, b in 0i64..1_000_000) {
        let (earlier, later) = if a >= b { (a, b) } else { (b, a) };
        let t_earlier = (now() - Duration::seconds(earlier)).to_rfc3339();
        let t_later = (now() - Duration::seconds(later)).to_rfc3339();
        let h_earlier = hours_since_insertion(&t_earlier, now()).unwrap();
        let h_later = hours_since_insertion(&t_later, now()).unwrap();
        prop_assert!(h_earlier >= h_later);
    }

    #[test]
    fn classifier_is_total_and_consistent(
        hours in -1_000.0f64..1_000.0,
        interval in 1.0f64..500.0,
        window_frac in 0.0f64..0.99,
    ) {
        let thresholds = ProtocolThresholds::new(interval, interval * window_frac);
        let status = thresholds.classify(Some(hours));
        let expected = if hours >= interval {
            CatheterStatus::Overdue
        } else if hours >= interval - interval * window_frac {
            CatheterStatus::Borderline
        } else {
            CatheterStatus::Ok
        };
        prop_assert_eq!(status, expected);
        prop_assert_ne!(status, CatheterStatus::Unknown);
        prop_assert_ne!(status, CatheterStatus::NoData);
    }

    #[test]
    fn interval_itself_is_overdue(interval in 1.0f64..500.0, window in 0.0f64..1.0) {
        let thresholds = ProtocolThresholds::new(interval, window);
        prop_assert_eq!(thresholds.classify(Some(interval)), CatheterStatus::Overdue);
    }

    #[test]
    fn merged_ids_are_unique(ids in proptest::collection::vec("[a-z0-9]{1,6}", 0..20)) {
        let resources: Vec<DiscoveredResource> = ids
            .iter()
            .flat_map(|id| {
                [
                    DiscoveredResource::Patient { id: id.clone() },
                    DiscoveredResource::Device {
                        patient_reference: Some(format!("Patient/{}", id)),
                    },
                ]
            })
            .collect();

        let merged = merge_patient_ids(&resources);
        let mut expected = ids.clone();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(merged.into_iter().collect::<Vec<_>>(), expected);
    }
}
