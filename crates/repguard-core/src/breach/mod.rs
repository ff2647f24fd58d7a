//! Breach signal detection.
//!
//! Matches external transaction evidence against a contract's protection
//! window and emits candidate breaches for human review. Detection is pure;
//! persistence-side dedup and notification belong to the alert manager.
//! A candidate is never auto-resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::Severity;
use crate::contract::{effective_status, Contract, EffectiveStatus, RepresentationType};

/// Side of a transaction observed in evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSide {
    Purchase,
    Sale,
}

/// A transaction record from the external evidence feed.
///
/// `client_ref` has already been matched to a client id by the feed;
/// `transaction_ref` is the feed's stable identifier for the record and
/// forms the dedup key together with the contract id. Records arrive
/// unordered and may repeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub client_ref: String,

    pub transaction_ref: String,

    pub transaction_date: DateTime<Utc>,

    pub side: TransactionSide,

    /// Agent who handled the transaction; `None` means unrepresented.
    pub transacting_agent: Option<String>,

    pub property_ref: String,
}

/// A candidate breach to be recorded as an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachCandidate {
    pub contract_id: String,

    /// Identity used to suppress duplicate alerts for the same evidence.
    pub dedup_key: String,

    /// Always `High` or `Medium` for breach candidates.
    pub severity: Severity,

    pub title: String,

    pub description: String,
}

/// Evaluate one evidence record against one contract.
///
/// Returns a candidate when the contract currently protects the client
/// (`Active` or `Expiring`), the transaction date falls inside the
/// protection window (inclusive), and the transacting agent is absent or
/// not the owning agent. Severity is `High` when the representation type
/// covers the transaction side, `Medium` otherwise.
pub fn detect(
    contract: &Contract,
    evidence: &EvidenceRecord,
    now: DateTime<Utc>,
) -> Option<BreachCandidate> {
    if evidence.client_ref != contract.client_id {
        return None;
    }

    match effective_status(contract, now) {
        EffectiveStatus::Active | EffectiveStatus::Expiring => {}
        _ => return None,
    }

    if !contract.protection_window_contains(evidence.transaction_date) {
        return None;
    }

    if evidence.transacting_agent.as_deref() == Some(contract.agent_id.as_str()) {
        return None;
    }

    let severity = if side_matches(contract.representation, evidence.side) {
        Severity::High
    } else {
        Severity::Medium
    };

    let side_label = match evidence.side {
        TransactionSide::Purchase => "purchase",
        TransactionSide::Sale => "sale",
    };
    let agent_label = match &evidence.transacting_agent {
        Some(agent) => format!("through agent {agent}"),
        None => "with no representing agent on record".to_string(),
    };

    Some(BreachCandidate {
        contract_id: contract.id.clone(),
        dedup_key: dedup_key(&contract.id, &evidence.transaction_ref),
        severity,
        title: format!("Possible bypass: client {side_label}"),
        description: format!(
            "Client {} completed a {side_label} of {} on {} {agent_label}, inside the protection window of contract {}.",
            contract.client_id,
            evidence.property_ref,
            evidence.transaction_date.format("%Y-%m-%d"),
            contract.id,
        ),
    })
}

/// Dedup key for a (contract, evidence transaction) pair.
pub fn dedup_key(contract_id: &str, transaction_ref: &str) -> String {
    format!("breach:{contract_id}:{transaction_ref}")
}

fn side_matches(representation: RepresentationType, side: TransactionSide) -> bool {
    match representation {
        RepresentationType::Buyer => side == TransactionSide::Purchase,
        RepresentationType::Seller => side == TransactionSide::Sale,
        RepresentationType::Dual => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RawStatus;
    use chrono::Duration;

    fn make_contract(representation: RepresentationType, now: DateTime<Utc>) -> Contract {
        Contract::new(
            "agent-1",
            "client-1",
            representation,
            now - Duration::days(30),
            now + Duration::days(60),
            now - Duration::days(30),
        )
    }

    fn make_evidence(side: TransactionSide, now: DateTime<Utc>) -> EvidenceRecord {
        EvidenceRecord {
            client_ref: "client-1".to_string(),
            transaction_ref: "tx-100".to_string(),
            transaction_date: now - Duration::days(2),
            side,
            transacting_agent: Some("rival-agent".to_string()),
            property_ref: "parcel-55".to_string(),
        }
    }

    #[test]
    fn matching_side_is_high_severity() {
        let now = Utc::now();
        let contract = make_contract(RepresentationType::Buyer, now);
        let evidence = make_evidence(TransactionSide::Purchase, now);

        let candidate = detect(&contract, &evidence, now).unwrap();
        assert_eq!(candidate.severity, Severity::High);
        assert_eq!(candidate.dedup_key, dedup_key(&contract.id, "tx-100"));
    }

    #[test]
    fn cross_side_is_medium_severity() {
        let now = Utc::now();
        let contract = make_contract(RepresentationType::Buyer, now);
        let evidence = make_evidence(TransactionSide::Sale, now);

        let candidate = detect(&contract, &evidence, now).unwrap();
        assert_eq!(candidate.severity, Severity::Medium);
    }

    #[test]
    fn dual_representation_matches_either_side() {
        let now = Utc::now();
        let contract = make_contract(RepresentationType::Dual, now);

        for side in [TransactionSide::Purchase, TransactionSide::Sale] {
            let candidate = detect(&contract, &make_evidence(side, now), now).unwrap();
            assert_eq!(candidate.severity, Severity::High);
        }
    }

    #[test]
    fn unrepresented_transaction_is_a_candidate() {
        let now = Utc::now();
        let contract = make_contract(RepresentationType::Seller, now);
        let mut evidence = make_evidence(TransactionSide::Sale, now);
        evidence.transacting_agent = None;

        assert!(detect(&contract, &evidence, now).is_some());
    }

    #[test]
    fn own_agent_transaction_is_not_a_candidate() {
        let now = Utc::now();
        let contract = make_contract(RepresentationType::Seller, now);
        let mut evidence = make_evidence(TransactionSide::Sale, now);
        evidence.transacting_agent = Some("agent-1".to_string());

        assert!(detect(&contract, &evidence, now).is_none());
    }

    #[test]
    fn other_client_is_not_matched() {
        let now = Utc::now();
        let contract = make_contract(RepresentationType::Seller, now);
        let mut evidence = make_evidence(TransactionSide::Sale, now);
        evidence.client_ref = "client-2".to_string();

        assert!(detect(&contract, &evidence, now).is_none());
    }

    #[test]
    fn transaction_outside_window_is_not_matched() {
        let now = Utc::now();
        let contract = make_contract(RepresentationType::Seller, now);
        let mut evidence = make_evidence(TransactionSide::Sale, now);
        evidence.transaction_date = contract.start_date - Duration::days(1);

        assert!(detect(&contract, &evidence, now).is_none());
    }

    #[test]
    fn expired_contract_is_not_matched() {
        let now = Utc::now();
        let mut contract = make_contract(RepresentationType::Seller, now);
        contract.end_date = now - Duration::days(1);
        let mut evidence = make_evidence(TransactionSide::Sale, now);
        evidence.transaction_date = now - Duration::days(10);

        assert!(detect(&contract, &evidence, now).is_none());
    }

    #[test]
    fn breached_contract_is_not_rematched() {
        let now = Utc::now();
        let mut contract = make_contract(RepresentationType::Seller, now);
        contract.raw_status = RawStatus::Breached;
        let evidence = make_evidence(TransactionSide::Sale, now);

        assert!(detect(&contract, &evidence, now).is_none());
    }
}
