//! Reminder scheduling.
//!
//! Derives the reminder plan from a contract's lifecycle: a recurring
//! weekly check-in plus one-time expiration warnings. Setup is idempotent
//! at every level -- per reminder (pending dedup), per contract, and for
//! the whole batch -- so re-running it never grows the reminder table.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::{evaluate, Contract, EffectiveStatus};
use crate::error::{CoreError, Result};
use crate::events::EngineEvent;
use crate::reminder::{NotificationMethod, Reminder, ReminderPriority, ReminderType};
use crate::storage::ContractDb;

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Days between recurring check-ins
    pub checkin_interval_days: i64,
    /// Days before expiry for the expiration warning
    pub expiration_warning_days: i64,
    /// Days before expiry for the renewal-due prompt
    pub renewal_due_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            checkin_interval_days: 7,
            expiration_warning_days: 30,
            renewal_due_days: 7,
        }
    }
}

/// Result of the batch setup operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupSummary {
    pub contracts_processed: usize,
    pub contracts_skipped: usize,
    pub reminders_created: usize,
    pub events: Vec<EngineEvent>,
}

/// Result of a contract renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalOutcome {
    pub contract: Contract,
    pub reminders_cancelled: usize,
    pub reminders_created: usize,
    pub events: Vec<EngineEvent>,
}

/// Result of registering a new contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    pub contract: Contract,
    pub reminders: Vec<Reminder>,
    pub events: Vec<EngineEvent>,
}

/// Result of flagging a contract as breached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachFlagOutcome {
    pub contract: Contract,
    pub reminders_cancelled: usize,
    pub events: Vec<EngineEvent>,
}

/// Derives and persists reminder plans for contracts.
pub struct ReminderScheduler<'a> {
    db: &'a ContractDb,
    config: SchedulerConfig,
}

impl<'a> ReminderScheduler<'a> {
    /// Create a scheduler with default config.
    pub fn new(db: &'a ContractDb) -> Self {
        Self {
            db,
            config: SchedulerConfig::default(),
        }
    }

    /// Create a scheduler with custom config.
    pub fn with_config(db: &'a ContractDb, config: SchedulerConfig) -> Self {
        Self { db, config }
    }

    /// Register a contract and derive its reminder plan.
    ///
    /// Dates violating `start_date <= end_date` are rejected before
    /// anything is stored. A contract registered without an active
    /// protection window (already expired) is kept for the audit trail
    /// but gets no reminders.
    pub fn register_contract(
        &self,
        contract: Contract,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOutcome> {
        if contract.end_date < contract.start_date {
            return Err(CoreError::DataIntegrity(format!(
                "contract end date {} falls before start date {}",
                contract.end_date, contract.start_date
            )));
        }

        self.db.create_contract(&contract)?;

        let mut events = vec![EngineEvent::ContractRegistered {
            contract_id: contract.id.clone(),
            agent_id: contract.agent_id.clone(),
            at: now,
        }];

        let reminders = match evaluate(&contract, now).status {
            EffectiveStatus::Active | EffectiveStatus::Expiring => {
                self.plan_reminders(&contract, now)?
            }
            _ => Vec::new(),
        };
        for reminder in &reminders {
            events.push(EngineEvent::ReminderScheduled {
                reminder_id: reminder.id.clone(),
                contract_id: reminder.contract_id.clone(),
                reminder_type: reminder.reminder_type,
                scheduled_date: reminder.scheduled_date,
                at: now,
            });
        }

        Ok(RegistrationOutcome {
            contract,
            reminders,
            events,
        })
    }

    /// Flag a contract as breached and cancel its future one-time
    /// reminders. Recurring check-ins continue until the contract is
    /// closed.
    pub fn flag_breached(
        &self,
        contract_id: &str,
        now: DateTime<Utc>,
    ) -> Result<BreachFlagOutcome> {
        let pending_one_time = self
            .db
            .list_reminders_for_contract(contract_id)?
            .iter()
            .filter(|r| !r.is_recurring && r.status == crate::reminder::DeliveryStatus::Pending)
            .count();

        let contract = self
            .db
            .mark_breached(contract_id, now)?
            .ok_or_else(|| CoreError::not_found("contract", contract_id))?;

        Ok(BreachFlagOutcome {
            contract,
            reminders_cancelled: pending_one_time,
            events: vec![EngineEvent::ContractBreachFlagged {
                contract_id: contract_id.to_string(),
                at: now,
            }],
        })
    }

    /// Set up the reminder plan for one contract.
    ///
    /// Fails with `InvalidState` when the contract no longer has an
    /// active protection window (breached or expired). Returns only the
    /// reminders actually created; reminders already in place are left
    /// untouched.
    pub fn setup_for_contract(
        &self,
        contract_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>> {
        let contract = self
            .db
            .get_contract(contract_id)?
            .ok_or_else(|| CoreError::not_found("contract", contract_id))?;

        let evaluation = evaluate(&contract, now);
        if let Some(warning) = &evaluation.integrity_warning {
            eprintln!("Warning: {warning}");
        }
        match evaluation.status {
            EffectiveStatus::Active | EffectiveStatus::Expiring => {}
            EffectiveStatus::Breached => {
                return Err(CoreError::invalid_state(
                    "contract",
                    contract_id,
                    "breached contracts have no reminder plan",
                ));
            }
            EffectiveStatus::Expired => {
                return Err(CoreError::invalid_state(
                    "contract",
                    contract_id,
                    "contract is already expired",
                ));
            }
        }

        self.plan_reminders(&contract, now)
    }

    /// Set up reminder plans for every live contract of an agent.
    ///
    /// Contracts without an active protection window are skipped, and
    /// contracts already fully scheduled contribute nothing, so the
    /// operation is idempotent and safe to re-trigger.
    pub fn setup_all(&self, agent_id: &str, now: DateTime<Utc>) -> Result<SetupSummary> {
        let mut summary = SetupSummary::default();

        for contract in self.db.list_contracts(agent_id, false)? {
            let evaluation = evaluate(&contract, now);
            if let Some(warning) = &evaluation.integrity_warning {
                eprintln!("Warning: {warning}");
            }
            match evaluation.status {
                EffectiveStatus::Active | EffectiveStatus::Expiring => {}
                _ => {
                    summary.contracts_skipped += 1;
                    continue;
                }
            }

            let created = self.plan_reminders(&contract, now)?;
            summary.contracts_processed += 1;
            summary.reminders_created += created.len();
            for reminder in &created {
                summary.events.push(EngineEvent::ReminderScheduled {
                    reminder_id: reminder.id.clone(),
                    contract_id: reminder.contract_id.clone(),
                    reminder_type: reminder.reminder_type,
                    scheduled_date: reminder.scheduled_date,
                    at: now,
                });
            }
        }

        Ok(summary)
    }

    /// Renew a contract to a new end date and reschedule its reminders.
    ///
    /// The storage layer archives the old window and soft-cancels its
    /// pending one-time reminders in one transaction; the new window then
    /// gets a fresh plan.
    pub fn renew_contract(
        &self,
        contract_id: &str,
        new_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome> {
        let previous = self
            .db
            .get_contract(contract_id)?
            .ok_or_else(|| CoreError::not_found("contract", contract_id))?;

        if new_end <= previous.start_date {
            return Err(CoreError::invalid_state(
                "contract",
                contract_id,
                "new end date must fall after the start date",
            ));
        }

        let before = self.db.list_reminders_for_contract(contract_id)?;
        let pending_one_time = before
            .iter()
            .filter(|r| !r.is_recurring && r.status == crate::reminder::DeliveryStatus::Pending)
            .count();

        let contract = self
            .db
            .renew_contract(contract_id, new_end, now)?
            .ok_or_else(|| CoreError::not_found("contract", contract_id))?;

        let mut events = vec![EngineEvent::ContractRenewed {
            contract_id: contract.id.clone(),
            previous_end: previous.end_date,
            new_end,
            at: now,
        }];

        let created = self.plan_reminders(&contract, now)?;
        for reminder in &created {
            events.push(EngineEvent::ReminderScheduled {
                reminder_id: reminder.id.clone(),
                contract_id: reminder.contract_id.clone(),
                reminder_type: reminder.reminder_type,
                scheduled_date: reminder.scheduled_date,
                at: now,
            });
        }

        Ok(RenewalOutcome {
            contract,
            reminders_cancelled: pending_one_time,
            reminders_created: created.len(),
            events,
        })
    }

    /// Create whichever reminders the plan calls for and are not already
    /// in place.
    fn plan_reminders(&self, contract: &Contract, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let method = self.delivery_method(contract)?;
        let mut created = Vec::new();

        if !self
            .db
            .has_pending_reminder(&contract.id, ReminderType::WeeklyCheckin)?
        {
            let checkin =
                Reminder::weekly_checkin(contract, method, self.config.checkin_interval_days, now);
            if self.db.insert_reminder_if_absent(&checkin)? {
                created.push(checkin);
            }
        }

        if let Some(warning) = self.plan_one_time(
            contract,
            ReminderType::ExpirationWarning,
            ReminderPriority::High,
            self.config.expiration_warning_days,
            method,
            now,
        )? {
            created.push(warning);
        }

        if let Some(renewal) = self.plan_one_time(
            contract,
            ReminderType::RenewalDue,
            ReminderPriority::Urgent,
            self.config.renewal_due_days,
            method,
            now,
        )? {
            created.push(renewal);
        }

        Ok(created)
    }

    /// Schedule a one-time reminder `days_before` the end date.
    ///
    /// A target already in the past schedules for immediate dispatch
    /// rather than being skipped, so late-registered contracts still get
    /// their warnings. Nothing is created while any non-cancelled
    /// reminder of the same type exists for the current window.
    fn plan_one_time(
        &self,
        contract: &Contract,
        reminder_type: ReminderType,
        priority: ReminderPriority,
        days_before: i64,
        method: NotificationMethod,
        now: DateTime<Utc>,
    ) -> Result<Option<Reminder>> {
        let target = contract.end_date - Duration::days(days_before);
        let target_day = target.format("%Y-%m-%d").to_string();

        if self
            .db
            .has_reminder_on_or_after(&contract.id, reminder_type, &target_day)?
        {
            return Ok(None);
        }

        let scheduled = if target <= now { now } else { target };
        let reminder = Reminder::one_time(contract, reminder_type, priority, method, scheduled, now);

        if self.db.insert_reminder_if_absent(&reminder)? {
            Ok(Some(reminder))
        } else {
            Ok(None)
        }
    }

    /// Reminders go out on the client's preferred channel; in-app when
    /// the client record is missing.
    fn delivery_method(&self, contract: &Contract) -> Result<NotificationMethod> {
        Ok(self
            .db
            .get_client(&contract.client_id)?
            .map(|c| c.preferred_method)
            .unwrap_or(NotificationMethod::InApp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{RawStatus, RepresentationType};
    use crate::reminder::DeliveryStatus;

    fn make_db() -> ContractDb {
        ContractDb::open_memory().unwrap()
    }

    fn make_contract(db: &ContractDb, days_to_end: i64, now: DateTime<Utc>) -> Contract {
        let contract = Contract::new(
            "agent-1",
            "client-1",
            RepresentationType::Buyer,
            now - Duration::days(10),
            now + Duration::days(days_to_end),
            now,
        );
        db.create_contract(&contract).unwrap();
        contract
    }

    #[test]
    fn full_plan_for_a_fresh_contract() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, 90, now);
        let scheduler = ReminderScheduler::new(&db);

        let created = scheduler.setup_for_contract(&contract.id, now).unwrap();
        assert_eq!(created.len(), 3);

        let checkin = created
            .iter()
            .find(|r| r.reminder_type == ReminderType::WeeklyCheckin)
            .unwrap();
        assert!(checkin.is_recurring);
        assert_eq!(checkin.scheduled_date, now + Duration::days(7));

        let warning = created
            .iter()
            .find(|r| r.reminder_type == ReminderType::ExpirationWarning)
            .unwrap();
        assert_eq!(warning.scheduled_date, contract.end_date - Duration::days(30));
        assert_eq!(warning.priority, ReminderPriority::High);

        let renewal = created
            .iter()
            .find(|r| r.reminder_type == ReminderType::RenewalDue)
            .unwrap();
        assert_eq!(renewal.scheduled_date, contract.end_date - Duration::days(7));
        assert_eq!(renewal.priority, ReminderPriority::Urgent);
    }

    #[test]
    fn setup_is_idempotent() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, 90, now);
        let scheduler = ReminderScheduler::new(&db);

        let first = scheduler.setup_for_contract(&contract.id, now).unwrap();
        assert_eq!(first.len(), 3);

        let second = scheduler.setup_for_contract(&contract.id, now).unwrap();
        assert!(second.is_empty());

        assert_eq!(db.list_reminders_for_contract(&contract.id).unwrap().len(), 3);
    }

    #[test]
    fn late_registration_schedules_immediate_warnings() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, 5, now);
        let scheduler = ReminderScheduler::new(&db);

        let created = scheduler.setup_for_contract(&contract.id, now).unwrap();

        let warning = created
            .iter()
            .find(|r| r.reminder_type == ReminderType::ExpirationWarning)
            .unwrap();
        assert_eq!(warning.scheduled_date, now);

        let renewal = created
            .iter()
            .find(|r| r.reminder_type == ReminderType::RenewalDue)
            .unwrap();
        assert_eq!(renewal.scheduled_date, now);
    }

    #[test]
    fn registration_plans_reminders_and_reports_events() {
        let db = make_db();
        let now = Utc::now();
        let contract = Contract::new(
            "agent-1",
            "client-1",
            RepresentationType::Dual,
            now,
            now + Duration::days(120),
            now,
        );
        let scheduler = ReminderScheduler::new(&db);

        let outcome = scheduler.register_contract(contract, now).unwrap();
        assert_eq!(outcome.reminders.len(), 3);
        assert_eq!(outcome.events.len(), 4);
        assert!(matches!(
            outcome.events[0],
            EngineEvent::ContractRegistered { .. }
        ));
        assert!(db.get_contract(&outcome.contract.id).unwrap().is_some());
    }

    #[test]
    fn registration_rejects_inverted_dates() {
        let db = make_db();
        let now = Utc::now();
        let contract = Contract::new(
            "agent-1",
            "client-1",
            RepresentationType::Buyer,
            now,
            now - Duration::days(30),
            now,
        );
        let scheduler = ReminderScheduler::new(&db);

        match scheduler.register_contract(contract, now) {
            Err(CoreError::DataIntegrity(_)) => {}
            other => panic!("Expected DataIntegrity, got {other:?}"),
        }
        assert!(db.list_contracts("agent-1", true).unwrap().is_empty());
    }

    #[test]
    fn flag_breached_cancels_one_times_and_reports() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, 90, now);
        let scheduler = ReminderScheduler::new(&db);
        scheduler.setup_for_contract(&contract.id, now).unwrap();

        let outcome = scheduler.flag_breached(&contract.id, now).unwrap();
        assert_eq!(outcome.reminders_cancelled, 2);
        assert!(matches!(
            outcome.events[0],
            EngineEvent::ContractBreachFlagged { .. }
        ));
        assert_eq!(
            crate::contract::effective_status(&outcome.contract, now),
            crate::contract::EffectiveStatus::Breached
        );
    }

    #[test]
    fn breached_contract_is_invalid_for_setup() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, 90, now);
        db.mark_breached(&contract.id, now).unwrap();
        let scheduler = ReminderScheduler::new(&db);

        match scheduler.setup_for_contract(&contract.id, now) {
            Err(CoreError::InvalidState { .. }) => {}
            other => panic!("Expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn batch_setup_skips_ineligible_and_is_idempotent() {
        let db = make_db();
        let now = Utc::now();
        let _healthy = make_contract(&db, 90, now);

        let mut expired = Contract::new(
            "agent-1",
            "client-2",
            RepresentationType::Seller,
            now - Duration::days(400),
            now - Duration::days(10),
            now,
        );
        expired.raw_status = RawStatus::Ok;
        db.create_contract(&expired).unwrap();

        let scheduler = ReminderScheduler::new(&db);

        let first = scheduler.setup_all("agent-1", now).unwrap();
        assert_eq!(first.contracts_processed, 1);
        assert_eq!(first.contracts_skipped, 1);
        assert_eq!(first.reminders_created, 3);

        let second = scheduler.setup_all("agent-1", now).unwrap();
        assert_eq!(second.contracts_processed, 1);
        assert_eq!(second.reminders_created, 0);
    }

    #[test]
    fn renewal_cancels_old_warnings_and_reschedules() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, 20, now);
        let scheduler = ReminderScheduler::new(&db);

        scheduler.setup_for_contract(&contract.id, now).unwrap();

        let outcome = scheduler
            .renew_contract(&contract.id, now + Duration::days(200), now)
            .unwrap();

        // The two one-time warnings were pending and got cancelled
        assert_eq!(outcome.reminders_cancelled, 2);
        // New warnings scheduled for the new window; check-in still live
        assert_eq!(outcome.reminders_created, 2);

        let reminders = db.list_reminders_for_contract(&contract.id).unwrap();
        let cancelled = reminders
            .iter()
            .filter(|r| r.status == DeliveryStatus::Cancelled)
            .count();
        assert_eq!(cancelled, 2);

        let live_warning = reminders
            .iter()
            .find(|r| {
                r.reminder_type == ReminderType::ExpirationWarning
                    && r.status == DeliveryStatus::Pending
            })
            .unwrap();
        assert_eq!(
            live_warning.scheduled_date,
            now + Duration::days(200) - Duration::days(30)
        );
    }

    #[test]
    fn renewal_to_invalid_end_date_is_rejected() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, 20, now);
        let scheduler = ReminderScheduler::new(&db);

        match scheduler.renew_contract(&contract.id, now - Duration::days(30), now) {
            Err(CoreError::InvalidState { .. }) => {}
            other => panic!("Expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn client_preference_drives_delivery_method() {
        let db = make_db();
        let now = Utc::now();
        let mut client = crate::contract::Client::new("agent-1", "Dana", now);
        client.phone = Some("+15550100".to_string());
        client.preferred_method = NotificationMethod::Sms;
        db.create_client(&client).unwrap();

        let contract = Contract::new(
            "agent-1",
            &client.id,
            RepresentationType::Buyer,
            now,
            now + Duration::days(90),
            now,
        );
        db.create_contract(&contract).unwrap();

        let scheduler = ReminderScheduler::new(&db);
        let created = scheduler.setup_for_contract(&contract.id, now).unwrap();
        assert!(created.iter().all(|r| r.method == NotificationMethod::Sms));
    }
}
