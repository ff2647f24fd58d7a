//! Contract status evaluation.
//!
//! Pure functions over `(contract, now)` -- no clock reads, no side
//! effects. Display code calls this on every render, so corrupt stored
//! dates degrade to a safe status with a warning instead of erroring.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Contract, RawStatus};

/// Days before expiry at which a contract counts as `Expiring` (inclusive).
pub const EXPIRING_WINDOW_DAYS: i64 = 30;

/// Computed lifecycle state of a contract at an evaluation instant.
///
/// Never stored; exactly one value holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveStatus {
    Active,
    Expiring,
    Expired,
    Breached,
}

/// Result of evaluating a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvaluation {
    pub status: EffectiveStatus,

    /// Set when stored dates violate `start_date <= end_date`.
    pub integrity_warning: Option<String>,
}

/// Evaluate a contract's effective status at `now`.
///
/// A raw `breached` flag dominates all date logic. The exact end instant
/// no longer protects (`now == end_date` is `Expired`); exactly
/// [`EXPIRING_WINDOW_DAYS`] remaining is `Expiring`.
pub fn evaluate(contract: &Contract, now: DateTime<Utc>) -> StatusEvaluation {
    if contract.raw_status == RawStatus::Breached {
        return StatusEvaluation {
            status: EffectiveStatus::Breached,
            integrity_warning: None,
        };
    }

    if contract.end_date < contract.start_date {
        return StatusEvaluation {
            status: EffectiveStatus::Expired,
            integrity_warning: Some(format!(
                "contract {} has end_date {} before start_date {}",
                contract.id, contract.end_date, contract.start_date
            )),
        };
    }

    let status = if now >= contract.end_date {
        EffectiveStatus::Expired
    } else if contract.end_date - now <= Duration::days(EXPIRING_WINDOW_DAYS) {
        EffectiveStatus::Expiring
    } else {
        EffectiveStatus::Active
    };

    StatusEvaluation {
        status,
        integrity_warning: None,
    }
}

/// Convenience wrapper returning just the status.
pub fn effective_status(contract: &Contract, now: DateTime<Utc>) -> EffectiveStatus {
    evaluate(contract, now).status
}

/// Whole days until expiry, negative once expired.
pub fn days_until_expiry(contract: &Contract, now: DateTime<Utc>) -> i64 {
    (contract.end_date - now).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RepresentationType;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn make_contract(start: DateTime<Utc>, end: DateTime<Utc>) -> Contract {
        Contract::new(
            "agent-1",
            "client-1",
            RepresentationType::Buyer,
            start,
            end,
            start,
        )
    }

    fn base_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn far_from_expiry_is_active() {
        let now = base_now();
        let contract = make_contract(now - Duration::days(10), now + Duration::days(31));
        assert_eq!(effective_status(&contract, now), EffectiveStatus::Active);
    }

    #[test]
    fn exactly_thirty_days_is_expiring() {
        let now = base_now();
        let contract = make_contract(now - Duration::days(10), now + Duration::days(30));
        assert_eq!(effective_status(&contract, now), EffectiveStatus::Expiring);
    }

    #[test]
    fn just_over_thirty_days_is_active() {
        let now = base_now();
        let contract = make_contract(
            now - Duration::days(10),
            now + Duration::days(30) + Duration::hours(1),
        );
        assert_eq!(effective_status(&contract, now), EffectiveStatus::Active);
    }

    #[test]
    fn end_instant_is_expired() {
        let now = base_now();
        let contract = make_contract(now - Duration::days(90), now);
        assert_eq!(effective_status(&contract, now), EffectiveStatus::Expired);
    }

    #[test]
    fn past_end_is_expired() {
        let now = base_now();
        let contract = make_contract(now - Duration::days(90), now - Duration::days(1));
        assert_eq!(effective_status(&contract, now), EffectiveStatus::Expired);
    }

    #[test]
    fn breach_flag_dominates_dates() {
        let now = base_now();
        let mut contract = make_contract(now - Duration::days(10), now + Duration::days(60));
        contract.raw_status = RawStatus::Breached;
        assert_eq!(effective_status(&contract, now), EffectiveStatus::Breached);
    }

    #[test]
    fn corrupt_dates_degrade_to_expired_with_warning() {
        let now = base_now();
        let contract = make_contract(now + Duration::days(10), now - Duration::days(10));
        let eval = evaluate(&contract, now);
        assert_eq!(eval.status, EffectiveStatus::Expired);
        assert!(eval.integrity_warning.is_some());
    }

    proptest! {
        #[test]
        fn status_is_total_and_breach_dominant(
            start_offset in -2000i64..2000,
            end_offset in -2000i64..2000,
            now_offset in -2000i64..2000,
            breached in any::<bool>(),
        ) {
            let epoch = base_now();
            let mut contract = make_contract(
                epoch + Duration::days(start_offset),
                epoch + Duration::days(end_offset),
            );
            if breached {
                contract.raw_status = RawStatus::Breached;
            }
            let now = epoch + Duration::days(now_offset);
            let eval = evaluate(&contract, now);

            prop_assert!(matches!(
                eval.status,
                EffectiveStatus::Active
                    | EffectiveStatus::Expiring
                    | EffectiveStatus::Expired
                    | EffectiveStatus::Breached
            ));
            if breached {
                prop_assert_eq!(eval.status, EffectiveStatus::Breached);
            } else {
                prop_assert_ne!(eval.status, EffectiveStatus::Breached);
            }
        }
    }
}
