//! Contract and client models.
//!
//! A contract is an exclusive representation agreement between an agent and
//! a client. Contracts are never hard-deleted; renewal supersedes the old
//! protection window and breach flagging is a raw status the evaluator
//! always honors.

pub mod status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use status::{days_until_expiry, effective_status, evaluate, EffectiveStatus, StatusEvaluation};

/// Which side of a transaction the agent represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepresentationType {
    Buyer,
    Seller,
    Dual,
}

/// Raw contract status set by external actions.
///
/// `Breached` is only ever set by a human decision (or confirmed evidence
/// review); the evaluator treats it as dominant over all date logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawStatus {
    Ok,
    Breached,
}

/// An exclusive representation agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,

    /// Owning agent.
    pub agent_id: String,

    /// Protected client.
    pub client_id: String,

    pub representation: RepresentationType,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    pub raw_status: RawStatus,

    /// Reference to the uploaded agreement document, if any.
    pub document_ref: Option<String>,

    /// Set when a renewal replaced this row's protection window.
    pub superseded: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// Create a new contract with a fresh id.
    pub fn new(
        agent_id: impl Into<String>,
        client_id: impl Into<String>,
        representation: RepresentationType,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            client_id: client_id.into(),
            representation,
            start_date,
            end_date,
            raw_status: RawStatus::Ok,
            document_ref: None,
            superseded: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `at` falls inside the protection window (inclusive bounds).
    pub fn protection_window_contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start_date && at <= self.end_date
    }
}

/// A client protected by one or more contracts.
///
/// The dispatcher resolves delivery recipients from the client record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,

    pub agent_id: String,

    pub name: String,

    pub email: Option<String>,

    pub phone: Option<String>,

    /// Preferred channel for reminders and alert notifications.
    pub preferred_method: crate::reminder::NotificationMethod,

    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Create a new client with a fresh id.
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            name: name.into(),
            email: None,
            phone: None,
            preferred_method: crate::reminder::NotificationMethod::Email,
            created_at: now,
        }
    }
}
