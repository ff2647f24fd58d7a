//! Reminder dispatch.
//!
//! One processing pass claims due reminders, delivers them through the
//! notifier, and records outcomes. Claims are conditional updates in
//! storage, so an occurrence is never in flight twice even with several
//! dispatcher instances. Deliveries fan out across a bounded pool of
//! worker threads; all state transitions happen serially on the calling
//! thread afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, Result};
use crate::events::EngineEvent;
use crate::notify::{DeliveryReceipt, NotificationRequest, Notifier};
use crate::reminder::{DeliveryStatus, NotificationMethod, Reminder, ReminderType};
use crate::storage::ContractDb;

/// Claims older than this are treated as leaked by a dead dispatcher.
const STALE_CLAIM_MINUTES: i64 = 15;

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Minutes between daemon ticks
    pub tick_interval_minutes: u64,
    /// Upper bound on concurrent notifier calls
    pub max_parallel_deliveries: usize,
    /// Delivery attempts before a reminder is terminal
    pub retry_limit: i64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval_minutes: 5,
            max_parallel_deliveries: 4,
            retry_limit: 3,
        }
    }
}

/// Result of one processing pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub sent: usize,
    pub delivered: usize,
    pub failed: usize,
    pub events: Vec<EngineEvent>,
}

/// A claimed reminder with its prepared notification.
struct Delivery {
    reminder: Reminder,
    request: NotificationRequest,
}

/// Works off due reminders through the external notifier.
pub struct ReminderDispatcher<'a> {
    db: &'a ContractDb,
    notifier: &'a dyn Notifier,
    config: DispatcherConfig,
}

impl<'a> ReminderDispatcher<'a> {
    /// Create a dispatcher with default config.
    pub fn new(db: &'a ContractDb, notifier: &'a dyn Notifier) -> Self {
        Self {
            db,
            notifier,
            config: DispatcherConfig::default(),
        }
    }

    /// Create a dispatcher with custom config.
    pub fn with_config(
        db: &'a ContractDb,
        notifier: &'a dyn Notifier,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            db,
            notifier,
            config,
        }
    }

    /// Process reminders that are due and pending.
    pub fn process_due(&self, now: DateTime<Utc>) -> Result<DispatchSummary> {
        self.process(now, false)
    }

    /// Process due pending reminders plus failed ones still inside the
    /// retry budget. This is the explicit "process pending now" batch
    /// operation; failures beyond the budget stay terminal and surface
    /// through [`Self::needs_attention`].
    pub fn process_pending(&self, now: DateTime<Utc>) -> Result<DispatchSummary> {
        self.process(now, true)
    }

    /// Failed reminders past the retry budget, for human follow-up.
    pub fn needs_attention(&self, agent_id: &str) -> Result<Vec<Reminder>> {
        Ok(self.db.needs_attention(agent_id, self.config.retry_limit)?)
    }

    /// Run as a periodic background task, processing each tick at the
    /// then-current wall clock.
    pub async fn run(&self) -> Result<()> {
        let period =
            std::time::Duration::from_secs(self.config.tick_interval_minutes.max(1) * 60);
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            match self.process_pending(Utc::now()) {
                Ok(summary) if summary.attempted > 0 => {
                    println!(
                        "[dispatch] attempted {} sent {} delivered {} failed {}",
                        summary.attempted, summary.sent, summary.delivered, summary.failed
                    );
                }
                Ok(_) => {}
                Err(e) => eprintln!("Warning: reminder processing failed: {e}"),
            }
        }
    }

    fn process(&self, now: DateTime<Utc>, include_failed: bool) -> Result<DispatchSummary> {
        self.db
            .release_stale_claims(now - Duration::minutes(STALE_CLAIM_MINUTES))?;

        let mut summary = DispatchSummary::default();
        let mut work: Vec<Delivery> = Vec::new();

        let mut candidates: Vec<(Reminder, DeliveryStatus)> = self
            .db
            .due_pending(now)?
            .into_iter()
            .map(|r| (r, DeliveryStatus::Pending))
            .collect();
        if include_failed {
            candidates.extend(
                self.db
                    .retryable_failed(self.config.retry_limit)?
                    .into_iter()
                    .map(|r| (r, DeliveryStatus::Failed)),
            );
        }

        for (reminder, expected) in candidates {
            if !self.db.claim_reminder(&reminder.id, expected, now)? {
                continue;
            }
            summary.attempted += 1;

            match self.recipient(&reminder)? {
                Some(recipient) => {
                    let request = self.build_request(&reminder, recipient);
                    work.push(Delivery { reminder, request });
                }
                None => {
                    let reason = format!(
                        "no {} recipient on file for client {}",
                        method_label(reminder.method),
                        reminder.client_id
                    );
                    self.record_failure(&reminder, &reason, now, &mut summary)?;
                }
            }
        }

        for chunk in work.chunks(self.config.max_parallel_deliveries.max(1)) {
            let results = deliver_chunk(self.notifier, chunk);
            for (delivery, result) in chunk.iter().zip(results) {
                self.record_outcome(delivery, result, now, &mut summary)?;
            }
        }

        Ok(summary)
    }

    fn record_outcome(
        &self,
        delivery: &Delivery,
        result: std::result::Result<DeliveryReceipt, DeliveryError>,
        now: DateTime<Utc>,
        summary: &mut DispatchSummary,
    ) -> Result<()> {
        let reminder = &delivery.reminder;

        match result {
            Ok(receipt) => {
                if reminder.is_recurring {
                    // Rolling single record: advance the same row to its
                    // next occurrence instead of appending history.
                    let interval = reminder.recurring_interval_days.unwrap_or(7);
                    let next = reminder.scheduled_date + Duration::days(interval);
                    self.db.advance_recurrence(&reminder.id, next, now)?;
                } else {
                    let status = if receipt.delivered {
                        DeliveryStatus::Delivered
                    } else {
                        DeliveryStatus::Sent
                    };
                    self.db.complete_reminder(&reminder.id, status, now)?;
                }

                if receipt.delivered {
                    summary.delivered += 1;
                } else {
                    summary.sent += 1;
                }
                summary.events.push(EngineEvent::ReminderDispatched {
                    reminder_id: reminder.id.clone(),
                    contract_id: reminder.contract_id.clone(),
                    reminder_type: reminder.reminder_type,
                    delivered: receipt.delivered,
                    at: now,
                });
                Ok(())
            }
            Err(e) => self.record_failure(reminder, &e.to_string(), now, summary),
        }
    }

    fn record_failure(
        &self,
        reminder: &Reminder,
        reason: &str,
        now: DateTime<Utc>,
        summary: &mut DispatchSummary,
    ) -> Result<()> {
        self.db.fail_reminder(&reminder.id, reason, now)?;
        summary.failed += 1;
        summary.events.push(EngineEvent::ReminderDeliveryFailed {
            reminder_id: reminder.id.clone(),
            contract_id: reminder.contract_id.clone(),
            attempts: reminder.attempts + 1,
            reason: reason.to_string(),
            at: now,
        });
        Ok(())
    }

    /// Resolve the channel-specific recipient for a reminder.
    fn recipient(&self, reminder: &Reminder) -> Result<Option<String>> {
        match reminder.method {
            NotificationMethod::InApp => Ok(Some(reminder.client_id.clone())),
            NotificationMethod::Email => Ok(self
                .db
                .get_client(&reminder.client_id)?
                .and_then(|c| c.email)),
            NotificationMethod::Sms => Ok(self
                .db
                .get_client(&reminder.client_id)?
                .and_then(|c| c.phone)),
        }
    }

    fn build_request(&self, reminder: &Reminder, recipient: String) -> NotificationRequest {
        NotificationRequest {
            method: reminder.method,
            recipient,
            template_id: template_for(reminder.reminder_type).to_string(),
            payload: serde_json::json!({
                "reminder_id": reminder.id,
                "contract_id": reminder.contract_id,
                "priority": reminder.priority,
                "scheduled_date": reminder.scheduled_date,
            }),
        }
    }
}

/// Deliver one chunk of notifications on scoped worker threads.
///
/// Only the notifier crosses threads; a worker panic is folded into a
/// transport failure so the pass keeps going.
fn deliver_chunk(
    notifier: &dyn Notifier,
    chunk: &[Delivery],
) -> Vec<std::result::Result<DeliveryReceipt, DeliveryError>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = chunk
            .iter()
            .map(|delivery| scope.spawn(move || notifier.send(&delivery.request)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(DeliveryError::Transport(
                        "delivery worker panicked".to_string(),
                    ))
                })
            })
            .collect()
    })
}

fn template_for(reminder_type: ReminderType) -> &'static str {
    match reminder_type {
        ReminderType::WeeklyCheckin => "weekly_checkin",
        ReminderType::ExpirationWarning => "expiration_warning",
        ReminderType::RenewalDue => "renewal_due",
    }
}

fn method_label(method: NotificationMethod) -> &'static str {
    match method {
        NotificationMethod::Email => "email",
        NotificationMethod::Sms => "sms",
        NotificationMethod::InApp => "in_app",
    }
}
