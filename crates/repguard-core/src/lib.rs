//! # Repguard Core Library
//!
//! This library provides the core business logic for Repguard, a tracker
//! for exclusive real-estate representation agreements. It implements a
//! CLI-first philosophy where all operations are available via a
//! standalone CLI binary over this same core library.
//!
//! ## Architecture
//!
//! - **Status Evaluator**: Pure functions computing a contract's effective
//!   status from its stored fields and an explicit `now`
//! - **Breach Detector**: Pure matching of external transaction evidence
//!   against protection windows
//! - **Alert Manager**: Idempotent alert creation with live-dedup, plus
//!   read/resolve state tracking
//! - **Reminder Scheduler**: Derives each contract's reminder plan;
//!   idempotent batch setup
//! - **Reminder Dispatcher**: Claims due reminders and delivers them with
//!   bounded parallelism, retries, and rolling recurrence
//! - **Storage**: SQLite persistence and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`ContractDb`]: Clients, contracts, alerts, and reminders
//! - [`AlertManager`]: Alert lifecycle and evidence ingestion
//! - [`ReminderScheduler`] / [`ReminderDispatcher`]: Reminder lifecycle
//! - [`Notifier`]: External delivery collaborator

pub mod alert;
pub mod breach;
pub mod contract;
pub mod error;
pub mod events;
pub mod notify;
pub mod reminder;
pub mod storage;

pub use alert::{Alert, AlertKind, AlertManager, Severity};
pub use breach::{BreachCandidate, EvidenceRecord, TransactionSide};
pub use contract::{
    effective_status, evaluate, Client, Contract, EffectiveStatus, RawStatus, RepresentationType,
    StatusEvaluation,
};
pub use error::{ConfigError, CoreError, DatabaseError, DeliveryError, Result};
pub use events::EngineEvent;
pub use notify::{ConsoleNotifier, DeliveryReceipt, NotificationRequest, Notifier, WebhookNotifier};
pub use reminder::{
    DeliveryStatus, DispatcherConfig, NotificationMethod, Reminder, ReminderDispatcher,
    ReminderPriority, ReminderScheduler, ReminderType, SchedulerConfig,
};
pub use storage::{Config, ContractDb};
