use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{AlertKind, Severity};
use crate::reminder::ReminderType;

/// Every mutating engine operation reports its state changes as events.
/// The UI and gamification consumers read them from operation summaries;
/// the engine itself never reacts to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    ContractRegistered {
        contract_id: String,
        agent_id: String,
        at: DateTime<Utc>,
    },
    ContractRenewed {
        contract_id: String,
        previous_end: DateTime<Utc>,
        new_end: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    ContractBreachFlagged {
        contract_id: String,
        at: DateTime<Utc>,
    },
    AlertRaised {
        alert_id: String,
        contract_id: Option<String>,
        kind: AlertKind,
        severity: Severity,
        at: DateTime<Utc>,
    },
    AlertResolved {
        alert_id: String,
        at: DateTime<Utc>,
    },
    ReminderScheduled {
        reminder_id: String,
        contract_id: String,
        reminder_type: ReminderType,
        scheduled_date: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    ReminderDispatched {
        reminder_id: String,
        contract_id: String,
        reminder_type: ReminderType,
        delivered: bool,
        at: DateTime<Utc>,
    },
    ReminderDeliveryFailed {
        reminder_id: String,
        contract_id: String,
        attempts: i64,
        reason: String,
        at: DateTime<Utc>,
    },
}
