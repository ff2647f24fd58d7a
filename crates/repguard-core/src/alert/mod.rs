//! Alert model and manager.
//!
//! Alerts record candidate breaches, expiration warnings, and
//! informational notices. Raising is idempotent per dedup key: a live
//! duplicate returns the existing alert unmodified and callers treat that
//! as success. Only a human action resolves an alert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::breach::{detect, BreachCandidate, EvidenceRecord};
use crate::contract::{effective_status, Contract, EffectiveStatus};
use crate::error::{CoreError, Result};
use crate::events::EngineEvent;
use crate::notify::{NotificationRequest, Notifier};
use crate::reminder::NotificationMethod;
use crate::storage::ContractDb;

/// Kind of alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Breach,
    Expiration,
    Informational,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A recorded alert. Retained indefinitely for compliance history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,

    /// Absent for alerts not tied to a contract.
    pub contract_id: Option<String>,

    pub agent_id: String,

    pub kind: AlertKind,

    pub severity: Severity,

    pub title: String,

    pub description: String,

    /// Identity preventing duplicate live alerts for one logical event.
    pub dedup_key: String,

    pub is_read: bool,

    pub created_at: DateTime<Utc>,

    pub resolved_at: Option<DateTime<Utc>>,
}

/// Result of raising an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaiseOutcome {
    pub alert: Alert,

    /// False when an unresolved duplicate already existed.
    pub created: bool,
}

/// Result of ingesting a batch of evidence records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub records_seen: usize,
    pub candidates: usize,
    pub alerts_raised: usize,
    pub duplicates_suppressed: usize,
    pub events: Vec<EngineEvent>,
}

/// Result of resolving an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveOutcome {
    pub alert: Alert,
    pub events: Vec<EngineEvent>,
}

/// Result of an expiration sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    pub contracts_checked: usize,
    pub alerts_raised: usize,
    pub events: Vec<EngineEvent>,
}

/// Manager for alert creation, dedup, and read/resolved state.
pub struct AlertManager<'a> {
    db: &'a ContractDb,
    notifier: &'a dyn Notifier,
}

impl<'a> AlertManager<'a> {
    pub fn new(db: &'a ContractDb, notifier: &'a dyn Notifier) -> Self {
        Self { db, notifier }
    }

    /// Raise an alert, idempotent by dedup key.
    ///
    /// Returns the existing alert with `created = false` when a live
    /// duplicate exists. Breach and expiration alerts also enqueue a
    /// notification; notification failure never fails the raise.
    pub fn raise(&self, draft: Alert) -> Result<RaiseOutcome> {
        let inserted = self.db.insert_alert_if_absent(&draft)?;

        if !inserted {
            let existing = self
                .db
                .find_live_alert(&draft.dedup_key)?
                .ok_or_else(|| CoreError::not_found("alert", draft.dedup_key.clone()))?;
            return Ok(RaiseOutcome {
                alert: existing,
                created: false,
            });
        }

        if matches!(draft.kind, AlertKind::Breach | AlertKind::Expiration) {
            self.notify_for_alert(&draft);
        }

        Ok(RaiseOutcome {
            alert: draft,
            created: true,
        })
    }

    /// Raise a breach alert from a detector candidate.
    pub fn raise_breach(
        &self,
        contract: &Contract,
        candidate: &BreachCandidate,
        now: DateTime<Utc>,
    ) -> Result<RaiseOutcome> {
        self.raise(
            Alert {
                id: Uuid::new_v4().to_string(),
                contract_id: Some(contract.id.clone()),
                agent_id: contract.agent_id.clone(),
                kind: AlertKind::Breach,
                severity: candidate.severity,
                title: candidate.title.clone(),
                description: candidate.description.clone(),
                dedup_key: candidate.dedup_key.clone(),
                is_read: false,
                created_at: now,
                resolved_at: None,
            })
    }

    /// Run the breach detector over a batch of evidence records.
    ///
    /// Records are matched against the live contracts of the referenced
    /// client; each candidate is raised with dedup, so re-ingesting the
    /// same feed is harmless.
    pub fn ingest_evidence(
        &self,
        records: &[EvidenceRecord],
        now: DateTime<Utc>,
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        for record in records {
            summary.records_seen += 1;

            for contract in self.db.contracts_for_client(&record.client_ref)? {
                let Some(candidate) = detect(&contract, record, now) else {
                    continue;
                };
                summary.candidates += 1;

                let outcome = self.raise_breach(&contract, &candidate, now)?;
                if outcome.created {
                    summary.alerts_raised += 1;
                    summary.events.push(EngineEvent::AlertRaised {
                        alert_id: outcome.alert.id.clone(),
                        contract_id: outcome.alert.contract_id.clone(),
                        kind: outcome.alert.kind,
                        severity: outcome.alert.severity,
                        at: now,
                    });
                } else {
                    summary.duplicates_suppressed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Raise expiration alerts for every contract currently `Expiring`.
    ///
    /// Dedup-keyed on the contract's end date: re-sweeping is a no-op
    /// while the alert is unresolved, and a renewal (new end date) allows
    /// a fresh warning for the new window.
    pub fn sweep_expirations(&self, agent_id: &str, now: DateTime<Utc>) -> Result<SweepSummary> {
        let mut summary = SweepSummary::default();

        for contract in self.db.list_contracts(agent_id, false)? {
            summary.contracts_checked += 1;

            if effective_status(&contract, now) != EffectiveStatus::Expiring {
                continue;
            }

            let days_left = crate::contract::status::days_until_expiry(&contract, now);
            let outcome = self.raise(
                Alert {
                    id: Uuid::new_v4().to_string(),
                    contract_id: Some(contract.id.clone()),
                    agent_id: contract.agent_id.clone(),
                    kind: AlertKind::Expiration,
                    severity: Severity::Medium,
                    title: format!("Contract expires in {days_left} days"),
                    description: format!(
                        "Contract {} with client {} ends on {}.",
                        contract.id,
                        contract.client_id,
                        contract.end_date.format("%Y-%m-%d"),
                    ),
                    dedup_key: format!(
                        "expiry:{}:{}",
                        contract.id,
                        contract.end_date.format("%Y-%m-%d")
                    ),
                    is_read: false,
                    created_at: now,
                    resolved_at: None,
                })?;

            if outcome.created {
                summary.alerts_raised += 1;
                summary.events.push(EngineEvent::AlertRaised {
                    alert_id: outcome.alert.id.clone(),
                    contract_id: outcome.alert.contract_id.clone(),
                    kind: outcome.alert.kind,
                    severity: outcome.alert.severity,
                    at: now,
                });
            }
        }

        Ok(summary)
    }

    /// Mark an alert as read. No-op if already read.
    pub fn mark_read(&self, alert_id: &str) -> Result<()> {
        if !self.db.mark_alert_read(alert_id)? {
            return Err(CoreError::not_found("alert", alert_id));
        }
        Ok(())
    }

    /// Resolve an alert. Resolving twice is an invalid transition.
    pub fn resolve(&self, alert_id: &str, now: DateTime<Utc>) -> Result<ResolveOutcome> {
        let existing = self
            .db
            .get_alert(alert_id)?
            .ok_or_else(|| CoreError::not_found("alert", alert_id))?;

        if existing.resolved_at.is_some() {
            return Err(CoreError::invalid_state(
                "alert",
                alert_id,
                "already resolved",
            ));
        }

        if !self.db.try_resolve_alert(alert_id, now)? {
            return Err(CoreError::invalid_state(
                "alert",
                alert_id,
                "already resolved",
            ));
        }

        let alert = self
            .db
            .get_alert(alert_id)?
            .ok_or_else(|| CoreError::not_found("alert", alert_id))?;

        Ok(ResolveOutcome {
            alert,
            events: vec![EngineEvent::AlertResolved {
                alert_id: alert_id.to_string(),
                at: now,
            }],
        })
    }

    /// Unresolved alerts for an agent, unread first, newest first.
    pub fn list_active(&self, agent_id: &str) -> Result<Vec<Alert>> {
        Ok(self.db.list_active_alerts(agent_id)?)
    }

    /// Full alert history for a contract, newest first.
    pub fn list_for_contract(&self, contract_id: &str) -> Result<Vec<Alert>> {
        Ok(self.db.list_alerts_for_contract(contract_id)?)
    }

    /// Alerts are addressed to the agent's in-app channel; the gateway
    /// decides any further fan-out.
    fn notify_for_alert(&self, alert: &Alert) {
        let request = NotificationRequest {
            method: NotificationMethod::InApp,
            recipient: alert.agent_id.clone(),
            template_id: match alert.kind {
                AlertKind::Breach => "alert_breach".to_string(),
                AlertKind::Expiration => "alert_expiration".to_string(),
                AlertKind::Informational => "alert_informational".to_string(),
            },
            payload: serde_json::json!({
                "alert_id": alert.id,
                "contract_id": alert.contract_id,
                "severity": alert.severity,
                "title": alert.title,
            }),
        };

        if let Err(e) = self.notifier.send(&request) {
            eprintln!("Warning: alert notification failed: {e}");
        }
    }
}
