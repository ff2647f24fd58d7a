//! Reminder model and lifecycle.
//!
//! Reminders are derived from a contract's lifecycle by the scheduler and
//! worked off by the dispatcher. A recurring check-in is a single rolling
//! row whose scheduled date advances on each successful send; one-time
//! warnings are terminal once sent, delivered, cancelled, or failed past
//! the retry limit.

pub mod dispatcher;
pub mod scheduler;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contract::Contract;

pub use dispatcher::{DispatchSummary, DispatcherConfig, ReminderDispatcher};
pub use scheduler::{
    BreachFlagOutcome, RegistrationOutcome, ReminderScheduler, RenewalOutcome, SchedulerConfig,
    SetupSummary,
};

/// Kind of reminder tied to a contract's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    /// Recurring client check-in.
    WeeklyCheckin,
    /// One-time warning 30 days before expiry.
    ExpirationWarning,
    /// One-time renewal prompt 7 days before expiry.
    RenewalDue,
}

/// Delivery priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderPriority {
    Low,
    Normal,
    High,
    Urgent,
}

/// Delivery lifecycle state.
///
/// `Cancelled` marks reminders invalidated by renewal or breach flagging;
/// they are kept for audit and never dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Cancelled,
}

/// Channel a reminder is delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMethod {
    Email,
    Sms,
    InApp,
}

/// A scheduled, possibly recurring, notification tied to a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,

    pub contract_id: String,

    pub client_id: String,

    pub agent_id: String,

    pub reminder_type: ReminderType,

    pub scheduled_date: DateTime<Utc>,

    /// Next occurrence for recurring reminders; mirrors `scheduled_date`
    /// after each advance.
    pub next_send_date: Option<DateTime<Utc>>,

    pub priority: ReminderPriority,

    pub status: DeliveryStatus,

    pub method: NotificationMethod,

    pub is_recurring: bool,

    pub recurring_interval_days: Option<i64>,

    /// Delivery attempts made for the current occurrence.
    pub attempts: i64,

    pub failure_reason: Option<String>,

    /// Dispatcher claim marker; set while an occurrence is in flight.
    pub claimed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    /// Recurring weekly check-in, first occurrence `interval_days` from now.
    pub fn weekly_checkin(
        contract: &Contract,
        method: NotificationMethod,
        interval_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let scheduled = now + chrono::Duration::days(interval_days);
        Self {
            id: Uuid::new_v4().to_string(),
            contract_id: contract.id.clone(),
            client_id: contract.client_id.clone(),
            agent_id: contract.agent_id.clone(),
            reminder_type: ReminderType::WeeklyCheckin,
            scheduled_date: scheduled,
            next_send_date: Some(scheduled),
            priority: ReminderPriority::Normal,
            status: DeliveryStatus::Pending,
            method,
            is_recurring: true,
            recurring_interval_days: Some(interval_days),
            attempts: 0,
            failure_reason: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// One-time reminder of the given type at `scheduled_date`.
    pub fn one_time(
        contract: &Contract,
        reminder_type: ReminderType,
        priority: ReminderPriority,
        method: NotificationMethod,
        scheduled_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            contract_id: contract.id.clone(),
            client_id: contract.client_id.clone(),
            agent_id: contract.agent_id.clone(),
            reminder_type,
            scheduled_date,
            next_send_date: None,
            priority,
            status: DeliveryStatus::Pending,
            method,
            is_recurring: false,
            recurring_interval_days: None,
            attempts: 0,
            failure_reason: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Calendar day of the scheduled date, used as the dedup component.
    pub fn scheduled_day(&self) -> String {
        self.scheduled_date.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RepresentationType;
    use chrono::Duration;

    fn make_contract(now: DateTime<Utc>) -> Contract {
        Contract::new(
            "agent-1",
            "client-1",
            RepresentationType::Seller,
            now,
            now + Duration::days(90),
            now,
        )
    }

    #[test]
    fn weekly_checkin_is_recurring_with_interval() {
        let now = Utc::now();
        let reminder = Reminder::weekly_checkin(
            &make_contract(now),
            NotificationMethod::Email,
            7,
            now,
        );

        assert!(reminder.is_recurring);
        assert_eq!(reminder.recurring_interval_days, Some(7));
        assert_eq!(reminder.reminder_type, ReminderType::WeeklyCheckin);
        assert_eq!(reminder.scheduled_date, now + Duration::days(7));
        assert_eq!(reminder.next_send_date, Some(reminder.scheduled_date));
        assert_eq!(reminder.status, DeliveryStatus::Pending);
    }

    #[test]
    fn one_time_has_no_recurrence_fields() {
        let now = Utc::now();
        let contract = make_contract(now);
        let reminder = Reminder::one_time(
            &contract,
            ReminderType::RenewalDue,
            ReminderPriority::Urgent,
            NotificationMethod::Sms,
            now + Duration::days(83),
            now,
        );

        assert!(!reminder.is_recurring);
        assert_eq!(reminder.recurring_interval_days, None);
        assert_eq!(reminder.next_send_date, None);
    }
}
