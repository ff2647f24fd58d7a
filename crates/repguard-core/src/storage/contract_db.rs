//! SQLite-based storage for clients, contracts, alerts, and reminders.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::data_dir;
use super::migrations;
use crate::alert::{Alert, AlertKind, Severity};
use crate::contract::{Client, Contract, RawStatus, RepresentationType};
use crate::reminder::{
    DeliveryStatus, NotificationMethod, Reminder, ReminderPriority, ReminderType,
};

// === Helper Functions ===

/// Format a timestamp for database storage (fixed width, range-query safe).
fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp from RFC3339 string with fallback to current time.
fn parse_ts_fallback(ts_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse an optional timestamp column.
fn parse_opt_ts(ts_str: Option<String>) -> Option<DateTime<Utc>> {
    ts_str.as_deref().map(parse_ts_fallback)
}

/// Parse representation type from database string.
fn parse_representation(s: &str) -> RepresentationType {
    match s {
        "seller" => RepresentationType::Seller,
        "dual" => RepresentationType::Dual,
        _ => RepresentationType::Buyer,
    }
}

/// Format representation type for database storage.
fn format_representation(representation: RepresentationType) -> &'static str {
    match representation {
        RepresentationType::Buyer => "buyer",
        RepresentationType::Seller => "seller",
        RepresentationType::Dual => "dual",
    }
}

/// Parse raw contract status from database string.
fn parse_raw_status(s: &str) -> RawStatus {
    match s {
        "breached" => RawStatus::Breached,
        _ => RawStatus::Ok,
    }
}

/// Format raw contract status for database storage.
fn format_raw_status(status: RawStatus) -> &'static str {
    match status {
        RawStatus::Ok => "ok",
        RawStatus::Breached => "breached",
    }
}

/// Parse alert kind from database string.
fn parse_alert_kind(s: &str) -> AlertKind {
    match s {
        "breach" => AlertKind::Breach,
        "expiration" => AlertKind::Expiration,
        _ => AlertKind::Informational,
    }
}

/// Format alert kind for database storage.
fn format_alert_kind(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Breach => "breach",
        AlertKind::Expiration => "expiration",
        AlertKind::Informational => "informational",
    }
}

/// Parse severity from database string.
fn parse_severity(s: &str) -> Severity {
    match s {
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Format severity for database storage.
fn format_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
    }
}

/// Parse reminder type from database string.
fn parse_reminder_type(s: &str) -> ReminderType {
    match s {
        "expiration_warning" => ReminderType::ExpirationWarning,
        "renewal_due" => ReminderType::RenewalDue,
        _ => ReminderType::WeeklyCheckin,
    }
}

/// Format reminder type for database storage.
fn format_reminder_type(reminder_type: ReminderType) -> &'static str {
    match reminder_type {
        ReminderType::WeeklyCheckin => "weekly_checkin",
        ReminderType::ExpirationWarning => "expiration_warning",
        ReminderType::RenewalDue => "renewal_due",
    }
}

/// Parse reminder priority from database string.
fn parse_priority(s: &str) -> ReminderPriority {
    match s {
        "low" => ReminderPriority::Low,
        "high" => ReminderPriority::High,
        "urgent" => ReminderPriority::Urgent,
        _ => ReminderPriority::Normal,
    }
}

/// Format reminder priority for database storage.
fn format_priority(priority: ReminderPriority) -> &'static str {
    match priority {
        ReminderPriority::Low => "low",
        ReminderPriority::Normal => "normal",
        ReminderPriority::High => "high",
        ReminderPriority::Urgent => "urgent",
    }
}

/// Parse delivery status from database string.
fn parse_delivery_status(s: &str) -> DeliveryStatus {
    match s {
        "sent" => DeliveryStatus::Sent,
        "delivered" => DeliveryStatus::Delivered,
        "failed" => DeliveryStatus::Failed,
        "cancelled" => DeliveryStatus::Cancelled,
        _ => DeliveryStatus::Pending,
    }
}

/// Format delivery status for database storage.
fn format_delivery_status(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "pending",
        DeliveryStatus::Sent => "sent",
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Failed => "failed",
        DeliveryStatus::Cancelled => "cancelled",
    }
}

/// Parse notification method from database string.
fn parse_method(s: &str) -> NotificationMethod {
    match s {
        "sms" => NotificationMethod::Sms,
        "in_app" => NotificationMethod::InApp,
        _ => NotificationMethod::Email,
    }
}

/// Format notification method for database storage.
fn format_method(method: NotificationMethod) -> &'static str {
    match method {
        NotificationMethod::Email => "email",
        NotificationMethod::Sms => "sms",
        NotificationMethod::InApp => "in_app",
    }
}

const CONTRACT_COLUMNS: &str = "id, agent_id, client_id, representation, start_date, end_date, \
     raw_status, document_ref, created_at, updated_at, superseded";

/// Build a Contract from a database row (column order = CONTRACT_COLUMNS).
fn row_to_contract(row: &rusqlite::Row) -> Result<Contract, rusqlite::Error> {
    let representation: String = row.get(3)?;
    let raw_status: String = row.get(6)?;
    Ok(Contract {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        client_id: row.get(2)?,
        representation: parse_representation(&representation),
        start_date: parse_ts_fallback(&row.get::<_, String>(4)?),
        end_date: parse_ts_fallback(&row.get::<_, String>(5)?),
        raw_status: parse_raw_status(&raw_status),
        document_ref: row.get(7)?,
        created_at: parse_ts_fallback(&row.get::<_, String>(8)?),
        updated_at: parse_ts_fallback(&row.get::<_, String>(9)?),
        superseded: row.get(10)?,
    })
}

const CLIENT_COLUMNS: &str = "id, agent_id, name, email, phone, preferred_method, created_at";

/// Build a Client from a database row (column order = CLIENT_COLUMNS).
fn row_to_client(row: &rusqlite::Row) -> Result<Client, rusqlite::Error> {
    let method: String = row.get(5)?;
    Ok(Client {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        preferred_method: parse_method(&method),
        created_at: parse_ts_fallback(&row.get::<_, String>(6)?),
    })
}

const ALERT_COLUMNS: &str =
    "id, contract_id, agent_id, kind, severity, title, description, dedup_key, is_read, \
     created_at, resolved_at";

/// Build an Alert from a database row (column order = ALERT_COLUMNS).
fn row_to_alert(row: &rusqlite::Row) -> Result<Alert, rusqlite::Error> {
    let kind: String = row.get(3)?;
    let severity: String = row.get(4)?;
    Ok(Alert {
        id: row.get(0)?,
        contract_id: row.get(1)?,
        agent_id: row.get(2)?,
        kind: parse_alert_kind(&kind),
        severity: parse_severity(&severity),
        title: row.get(5)?,
        description: row.get(6)?,
        dedup_key: row.get(7)?,
        is_read: row.get(8)?,
        created_at: parse_ts_fallback(&row.get::<_, String>(9)?),
        resolved_at: parse_opt_ts(row.get(10)?),
    })
}

const REMINDER_COLUMNS: &str =
    "id, contract_id, client_id, agent_id, reminder_type, scheduled_date, next_send_date, \
     priority, status, method, is_recurring, recurring_interval_days, created_at, updated_at, \
     attempts, failure_reason, claimed_at";

/// Build a Reminder from a database row (column order = REMINDER_COLUMNS).
fn row_to_reminder(row: &rusqlite::Row) -> Result<Reminder, rusqlite::Error> {
    let reminder_type: String = row.get(4)?;
    let priority: String = row.get(7)?;
    let status: String = row.get(8)?;
    let method: String = row.get(9)?;
    Ok(Reminder {
        id: row.get(0)?,
        contract_id: row.get(1)?,
        client_id: row.get(2)?,
        agent_id: row.get(3)?,
        reminder_type: parse_reminder_type(&reminder_type),
        scheduled_date: parse_ts_fallback(&row.get::<_, String>(5)?),
        next_send_date: parse_opt_ts(row.get(6)?),
        priority: parse_priority(&priority),
        status: parse_delivery_status(&status),
        method: parse_method(&method),
        is_recurring: row.get(10)?,
        recurring_interval_days: row.get(11)?,
        created_at: parse_ts_fallback(&row.get::<_, String>(12)?),
        updated_at: parse_ts_fallback(&row.get::<_, String>(13)?),
        attempts: row.get(14)?,
        failure_reason: row.get(15)?,
        claimed_at: parse_opt_ts(row.get(16)?),
    })
}

/// SQLite database for contract lifecycle storage.
///
/// Stores clients, contracts, alerts, and reminders. Dedup invariants are
/// enforced with partial unique indexes so concurrent writers linearize on
/// the constraint instead of racing a read-then-write.
pub struct ContractDb {
    conn: Connection,
}

impl ContractDb {
    /// Open the contract database at `~/.config/repguard/repguard.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let path = data_dir()?.join("repguard.db");
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests, dry runs).
    pub fn open_memory() -> Result<Self, Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        // Base tables (v1 schema) first
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS clients (
                id               TEXT PRIMARY KEY,
                agent_id         TEXT NOT NULL,
                name             TEXT NOT NULL,
                email            TEXT,
                phone            TEXT,
                preferred_method TEXT NOT NULL DEFAULT 'email',
                created_at       TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS contracts (
                id             TEXT PRIMARY KEY,
                agent_id       TEXT NOT NULL,
                client_id      TEXT NOT NULL,
                representation TEXT NOT NULL,
                start_date     TEXT NOT NULL,
                end_date       TEXT NOT NULL,
                raw_status     TEXT NOT NULL DEFAULT 'ok',
                document_ref   TEXT,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS alerts (
                id          TEXT PRIMARY KEY,
                contract_id TEXT,
                agent_id    TEXT NOT NULL,
                kind        TEXT NOT NULL,
                severity    TEXT NOT NULL,
                title       TEXT NOT NULL,
                description TEXT NOT NULL,
                dedup_key   TEXT NOT NULL,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                resolved_at TEXT
            );

            CREATE TABLE IF NOT EXISTS reminders (
                id                      TEXT PRIMARY KEY,
                contract_id             TEXT NOT NULL,
                client_id               TEXT NOT NULL,
                agent_id                TEXT NOT NULL,
                reminder_type           TEXT NOT NULL,
                scheduled_date          TEXT NOT NULL,
                scheduled_day           TEXT NOT NULL,
                next_send_date          TEXT,
                priority                TEXT NOT NULL,
                status                  TEXT NOT NULL DEFAULT 'pending',
                method                  TEXT NOT NULL,
                is_recurring            INTEGER NOT NULL DEFAULT 0,
                recurring_interval_days INTEGER,
                created_at              TEXT NOT NULL,
                updated_at              TEXT NOT NULL
            );",
        )?;

        // Run incremental migrations (v1 -> v2 -> v3)
        migrations::migrate(&self.conn)?;

        // Live-dedup indexes (idempotent, run after migrations add columns)
        self.conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_live_dedup
             ON alerts(dedup_key)
             WHERE resolved_at IS NULL",
            [],
        )?;
        self.conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_reminders_pending_dedup
             ON reminders(contract_id, reminder_type, scheduled_day)
             WHERE status = 'pending'",
            [],
        )?;

        Ok(())
    }

    // === Client CRUD ===

    pub fn create_client(&self, client: &Client) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO clients (id, agent_id, name, email, phone, preferred_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                client.id,
                client.agent_id,
                client.name,
                client.email,
                client.phone,
                format_method(client.preferred_method),
                format_ts(client.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_client(&self, id: &str) -> Result<Option<Client>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
                params![id],
                row_to_client,
            )
            .optional()
    }

    pub fn list_clients(&self, agent_id: &str) -> Result<Vec<Client>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE agent_id = ?1 ORDER BY name ASC"
        ))?;
        let rows = stmt.query_map(params![agent_id], row_to_client)?;
        rows.collect()
    }

    // === Contract CRUD ===

    pub fn create_contract(&self, contract: &Contract) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO contracts (id, agent_id, client_id, representation, start_date,
                                    end_date, raw_status, document_ref, created_at, updated_at,
                                    superseded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                contract.id,
                contract.agent_id,
                contract.client_id,
                format_representation(contract.representation),
                format_ts(contract.start_date),
                format_ts(contract.end_date),
                format_raw_status(contract.raw_status),
                contract.document_ref,
                format_ts(contract.created_at),
                format_ts(contract.updated_at),
                contract.superseded,
            ],
        )?;
        Ok(())
    }

    pub fn get_contract(&self, id: &str) -> Result<Option<Contract>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = ?1"),
                params![id],
                row_to_contract,
            )
            .optional()
    }

    pub fn list_contracts(
        &self,
        agent_id: &str,
        include_superseded: bool,
    ) -> Result<Vec<Contract>, rusqlite::Error> {
        let sql = if include_superseded {
            format!(
                "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE agent_id = ?1
                 ORDER BY created_at DESC"
            )
        } else {
            format!(
                "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE agent_id = ?1 AND superseded = 0
                 ORDER BY created_at DESC"
            )
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![agent_id], row_to_contract)?;
        rows.collect()
    }

    /// Live contracts protecting a client, for evidence matching.
    pub fn contracts_for_client(&self, client_id: &str) -> Result<Vec<Contract>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts
             WHERE client_id = ?1 AND superseded = 0
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![client_id], row_to_contract)?;
        rows.collect()
    }

    /// Live, unbreached contracts ending within `days` of `now`.
    pub fn expiring_within(
        &self,
        agent_id: &str,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Contract>, rusqlite::Error> {
        let horizon = now + chrono::Duration::days(days);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts
             WHERE agent_id = ?1 AND superseded = 0 AND raw_status = 'ok'
               AND end_date > ?2 AND end_date <= ?3
             ORDER BY end_date ASC"
        ))?;
        let rows = stmt.query_map(
            params![agent_id, format_ts(now), format_ts(horizon)],
            row_to_contract,
        )?;
        rows.collect()
    }

    pub fn set_document_ref(
        &self,
        id: &str,
        document_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, rusqlite::Error> {
        let changed = self.conn.execute(
            "UPDATE contracts SET document_ref = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, document_ref, format_ts(now)],
        )?;
        Ok(changed == 1)
    }

    /// Renew a contract to a new end date.
    ///
    /// In one transaction: archives the current protection window as a
    /// superseded copy, moves the live row's end date, and soft-cancels
    /// pending one-time reminders tied to the old window. Returns the
    /// updated contract, or None if the id is unknown.
    pub fn renew_contract(
        &self,
        id: &str,
        new_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<Contract>, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;

        let existing = tx
            .query_row(
                &format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = ?1"),
                params![id],
                row_to_contract,
            )
            .optional()?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        tx.execute(
            "INSERT INTO contracts (id, agent_id, client_id, representation, start_date,
                                    end_date, raw_status, document_ref, created_at, updated_at,
                                    superseded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
            params![
                Uuid::new_v4().to_string(),
                existing.agent_id,
                existing.client_id,
                format_representation(existing.representation),
                format_ts(existing.start_date),
                format_ts(existing.end_date),
                format_raw_status(existing.raw_status),
                existing.document_ref,
                format_ts(existing.created_at),
                format_ts(now),
            ],
        )?;

        tx.execute(
            "UPDATE contracts SET end_date = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, format_ts(new_end), format_ts(now)],
        )?;

        cancel_pending_one_time_tx(&tx, id, now)?;

        tx.commit()?;

        self.get_contract(id)
    }

    /// Flag a contract as breached.
    ///
    /// In one transaction: sets the raw status and soft-cancels pending
    /// one-time reminders (the protection window no longer ends normally).
    /// Recurring check-ins are left running. Returns the updated contract,
    /// or None if the id is unknown.
    pub fn mark_breached(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Contract>, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;

        let changed = tx.execute(
            "UPDATE contracts SET raw_status = 'breached', updated_at = ?2 WHERE id = ?1",
            params![id, format_ts(now)],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        cancel_pending_one_time_tx(&tx, id, now)?;

        tx.commit()?;

        self.get_contract(id)
    }

    // === Alert CRUD ===

    /// Insert an alert unless a live duplicate exists for its dedup key.
    ///
    /// Returns true when the row was inserted. The partial unique index
    /// makes this the linearization point for concurrent raisers.
    pub fn insert_alert_if_absent(&self, alert: &Alert) -> Result<bool, rusqlite::Error> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO alerts (id, contract_id, agent_id, kind, severity, title,
                                           description, dedup_key, is_read, created_at,
                                           resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                alert.id,
                alert.contract_id,
                alert.agent_id,
                format_alert_kind(alert.kind),
                format_severity(alert.severity),
                alert.title,
                alert.description,
                alert.dedup_key,
                alert.is_read,
                format_ts(alert.created_at),
                alert.resolved_at.map(format_ts),
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn get_alert(&self, id: &str) -> Result<Option<Alert>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
                params![id],
                row_to_alert,
            )
            .optional()
    }

    /// The unresolved alert for a dedup key, if one exists.
    pub fn find_live_alert(&self, dedup_key: &str) -> Result<Option<Alert>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts
                     WHERE dedup_key = ?1 AND resolved_at IS NULL"
                ),
                params![dedup_key],
                row_to_alert,
            )
            .optional()
    }

    /// Mark an alert as read. Returns false if the id is unknown.
    pub fn mark_alert_read(&self, id: &str) -> Result<bool, rusqlite::Error> {
        let changed = self
            .conn
            .execute("UPDATE alerts SET is_read = 1 WHERE id = ?1", params![id])?;
        Ok(changed == 1)
    }

    /// Resolve an alert if it is still unresolved. Returns false when the
    /// row exists but was already resolved (or raced another resolver).
    pub fn try_resolve_alert(&self, id: &str, now: DateTime<Utc>) -> Result<bool, rusqlite::Error> {
        let changed = self.conn.execute(
            "UPDATE alerts SET resolved_at = ?2 WHERE id = ?1 AND resolved_at IS NULL",
            params![id, format_ts(now)],
        )?;
        Ok(changed == 1)
    }

    /// Unresolved alerts for an agent, unread first, newest first.
    pub fn list_active_alerts(&self, agent_id: &str) -> Result<Vec<Alert>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts
             WHERE agent_id = ?1 AND resolved_at IS NULL
             ORDER BY is_read ASC, created_at DESC"
        ))?;
        let rows = stmt.query_map(params![agent_id], row_to_alert)?;
        rows.collect()
    }

    /// All alerts ever raised for a contract, newest first.
    pub fn list_alerts_for_contract(
        &self,
        contract_id: &str,
    ) -> Result<Vec<Alert>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts
             WHERE contract_id = ?1
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![contract_id], row_to_alert)?;
        rows.collect()
    }

    // === Reminder CRUD ===

    /// Insert a reminder unless a pending duplicate exists for the same
    /// (contract, type, scheduled day). Returns true when inserted.
    pub fn insert_reminder_if_absent(&self, reminder: &Reminder) -> Result<bool, rusqlite::Error> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO reminders (id, contract_id, client_id, agent_id,
                                              reminder_type, scheduled_date, scheduled_day,
                                              next_send_date, priority, status, method,
                                              is_recurring, recurring_interval_days, created_at,
                                              updated_at, attempts, failure_reason, claimed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18)",
            params![
                reminder.id,
                reminder.contract_id,
                reminder.client_id,
                reminder.agent_id,
                format_reminder_type(reminder.reminder_type),
                format_ts(reminder.scheduled_date),
                reminder.scheduled_day(),
                reminder.next_send_date.map(format_ts),
                format_priority(reminder.priority),
                format_delivery_status(reminder.status),
                format_method(reminder.method),
                reminder.is_recurring,
                reminder.recurring_interval_days,
                format_ts(reminder.created_at),
                format_ts(reminder.updated_at),
                reminder.attempts,
                reminder.failure_reason,
                reminder.claimed_at.map(format_ts),
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn get_reminder(&self, id: &str) -> Result<Option<Reminder>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                params![id],
                row_to_reminder,
            )
            .optional()
    }

    /// Whether a pending reminder of this type exists for the contract.
    pub fn has_pending_reminder(
        &self,
        contract_id: &str,
        reminder_type: ReminderType,
    ) -> Result<bool, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reminders
             WHERE contract_id = ?1 AND reminder_type = ?2 AND status = 'pending'",
            params![contract_id, format_reminder_type(reminder_type)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether any non-cancelled reminder of this type is scheduled on or
    /// after `day` for the contract. Used to keep one-time scheduling
    /// idempotent across the current protection window.
    pub fn has_reminder_on_or_after(
        &self,
        contract_id: &str,
        reminder_type: ReminderType,
        day: &str,
    ) -> Result<bool, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reminders
             WHERE contract_id = ?1 AND reminder_type = ?2
               AND status != 'cancelled' AND scheduled_day >= ?3",
            params![contract_id, format_reminder_type(reminder_type), day],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Unclaimed pending reminders due at `now`, oldest first.
    pub fn due_pending(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE status = 'pending' AND scheduled_date <= ?1 AND claimed_at IS NULL
             ORDER BY scheduled_date ASC"
        ))?;
        let rows = stmt.query_map(params![format_ts(now)], row_to_reminder)?;
        rows.collect()
    }

    /// Failed reminders still inside the retry budget.
    pub fn retryable_failed(&self, retry_limit: i64) -> Result<Vec<Reminder>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE status = 'failed' AND attempts < ?1 AND claimed_at IS NULL
             ORDER BY scheduled_date ASC"
        ))?;
        let rows = stmt.query_map(params![retry_limit], row_to_reminder)?;
        rows.collect()
    }

    /// Failed reminders past the retry budget, needing human follow-up.
    pub fn needs_attention(
        &self,
        agent_id: &str,
        retry_limit: i64,
    ) -> Result<Vec<Reminder>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE agent_id = ?1 AND status = 'failed' AND attempts >= ?2
             ORDER BY scheduled_date ASC"
        ))?;
        let rows = stmt.query_map(params![agent_id, retry_limit], row_to_reminder)?;
        rows.collect()
    }

    /// Claim a reminder occurrence for exclusive dispatch.
    ///
    /// The conditional update is the at-most-once guarantee: only one
    /// caller transitions `claimed_at` from NULL.
    pub fn claim_reminder(
        &self,
        id: &str,
        expected_status: DeliveryStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, rusqlite::Error> {
        let changed = self.conn.execute(
            "UPDATE reminders SET claimed_at = ?2
             WHERE id = ?1 AND status = ?3 AND claimed_at IS NULL",
            params![id, format_ts(now), format_delivery_status(expected_status)],
        )?;
        Ok(changed == 1)
    }

    /// Release claims older than `cutoff` (crashed dispatcher recovery).
    pub fn release_stale_claims(&self, cutoff: DateTime<Utc>) -> Result<usize, rusqlite::Error> {
        self.conn.execute(
            "UPDATE reminders SET claimed_at = NULL
             WHERE claimed_at IS NOT NULL AND claimed_at < ?1",
            params![format_ts(cutoff)],
        )
    }

    /// Record a successful delivery attempt on a one-time reminder.
    pub fn complete_reminder(
        &self,
        id: &str,
        status: DeliveryStatus,
        now: DateTime<Utc>,
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE reminders
             SET status = ?2, attempts = attempts + 1, failure_reason = NULL,
                 claimed_at = NULL, updated_at = ?3
             WHERE id = ?1",
            params![id, format_delivery_status(status), format_ts(now)],
        )?;
        Ok(())
    }

    /// Record a failed delivery attempt.
    pub fn fail_reminder(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE reminders
             SET status = 'failed', attempts = attempts + 1, failure_reason = ?2,
                 claimed_at = NULL, updated_at = ?3
             WHERE id = ?1",
            params![id, reason, format_ts(now)],
        )?;
        Ok(())
    }

    /// Roll a recurring reminder forward to its next occurrence.
    pub fn advance_recurrence(
        &self,
        id: &str,
        next: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE reminders
             SET scheduled_date = ?2, scheduled_day = ?3, next_send_date = ?2,
                 status = 'pending', attempts = 0, failure_reason = NULL,
                 claimed_at = NULL, updated_at = ?4
             WHERE id = ?1",
            params![
                id,
                format_ts(next),
                next.format("%Y-%m-%d").to_string(),
                format_ts(now),
            ],
        )?;
        Ok(())
    }

    /// Soft-cancel pending one-time reminders for a contract.
    pub fn cancel_pending_one_time(
        &self,
        contract_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, rusqlite::Error> {
        cancel_pending_one_time_tx(&self.conn, contract_id, now)
    }

    /// All reminders for a contract, soonest first.
    pub fn list_reminders_for_contract(
        &self,
        contract_id: &str,
    ) -> Result<Vec<Reminder>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE contract_id = ?1
             ORDER BY scheduled_date ASC"
        ))?;
        let rows = stmt.query_map(params![contract_id], row_to_reminder)?;
        rows.collect()
    }
}

fn cancel_pending_one_time_tx(
    conn: &Connection,
    contract_id: &str,
    now: DateTime<Utc>,
) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "UPDATE reminders
         SET status = 'cancelled', claimed_at = NULL, updated_at = ?2
         WHERE contract_id = ?1 AND status = 'pending' AND is_recurring = 0",
        params![contract_id, format_ts(now)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_db() -> ContractDb {
        ContractDb::open_memory().unwrap()
    }

    fn make_contract(db: &ContractDb, now: DateTime<Utc>) -> Contract {
        let contract = Contract::new(
            "agent-1",
            "client-1",
            RepresentationType::Buyer,
            now - Duration::days(10),
            now + Duration::days(90),
            now,
        );
        db.create_contract(&contract).unwrap();
        contract
    }

    fn make_alert(contract: &Contract, dedup_key: &str, now: DateTime<Utc>) -> Alert {
        Alert {
            id: Uuid::new_v4().to_string(),
            contract_id: Some(contract.id.clone()),
            agent_id: contract.agent_id.clone(),
            kind: AlertKind::Breach,
            severity: Severity::High,
            title: "Possible bypass".to_string(),
            description: "test".to_string(),
            dedup_key: dedup_key.to_string(),
            is_read: false,
            created_at: now,
            resolved_at: None,
        }
    }

    #[test]
    fn contract_roundtrip() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, now);

        let loaded = db.get_contract(&contract.id).unwrap().unwrap();
        assert_eq!(loaded.agent_id, "agent-1");
        assert_eq!(loaded.representation, RepresentationType::Buyer);
        assert_eq!(loaded.raw_status, RawStatus::Ok);
        assert!(!loaded.superseded);
        assert_eq!(loaded.end_date, contract.end_date);
    }

    #[test]
    fn renew_archives_old_window_and_cancels_one_times() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, now);

        let warning = Reminder::one_time(
            &contract,
            ReminderType::ExpirationWarning,
            ReminderPriority::High,
            NotificationMethod::Email,
            contract.end_date - Duration::days(30),
            now,
        );
        assert!(db.insert_reminder_if_absent(&warning).unwrap());

        let checkin = Reminder::weekly_checkin(&contract, NotificationMethod::Email, 7, now);
        assert!(db.insert_reminder_if_absent(&checkin).unwrap());

        let new_end = now + Duration::days(365);
        let renewed = db.renew_contract(&contract.id, new_end, now).unwrap().unwrap();
        assert_eq!(renewed.end_date, new_end);
        assert!(!renewed.superseded);

        // Old window retained as a superseded copy
        let all = db.list_contracts("agent-1", true).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|c| c.superseded).count(), 1);
        let live = db.list_contracts("agent-1", false).unwrap();
        assert_eq!(live.len(), 1);

        // One-time cancelled, recurring untouched
        let warning = db.get_reminder(&warning.id).unwrap().unwrap();
        assert_eq!(warning.status, DeliveryStatus::Cancelled);
        let checkin = db.get_reminder(&checkin.id).unwrap().unwrap();
        assert_eq!(checkin.status, DeliveryStatus::Pending);
    }

    #[test]
    fn alert_dedup_is_enforced_while_unresolved() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, now);

        let first = make_alert(&contract, "breach:c:tx-1", now);
        assert!(db.insert_alert_if_absent(&first).unwrap());

        let second = make_alert(&contract, "breach:c:tx-1", now);
        assert!(!db.insert_alert_if_absent(&second).unwrap());

        // Resolving frees the key for future re-detection
        assert!(db.try_resolve_alert(&first.id, now).unwrap());
        let third = make_alert(&contract, "breach:c:tx-1", now);
        assert!(db.insert_alert_if_absent(&third).unwrap());
    }

    #[test]
    fn resolve_is_single_shot() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, now);
        let alert = make_alert(&contract, "breach:c:tx-2", now);
        db.insert_alert_if_absent(&alert).unwrap();

        assert!(db.try_resolve_alert(&alert.id, now).unwrap());
        assert!(!db.try_resolve_alert(&alert.id, now).unwrap());
    }

    #[test]
    fn reminder_pending_dedup_by_day() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, now);

        let first = Reminder::one_time(
            &contract,
            ReminderType::RenewalDue,
            ReminderPriority::Urgent,
            NotificationMethod::Email,
            contract.end_date - Duration::days(7),
            now,
        );
        let second = Reminder::one_time(
            &contract,
            ReminderType::RenewalDue,
            ReminderPriority::Urgent,
            NotificationMethod::Email,
            contract.end_date - Duration::days(7),
            now,
        );

        assert!(db.insert_reminder_if_absent(&first).unwrap());
        assert!(!db.insert_reminder_if_absent(&second).unwrap());
    }

    #[test]
    fn claim_is_exclusive() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, now);
        let reminder = Reminder::weekly_checkin(&contract, NotificationMethod::Email, 7, now);
        db.insert_reminder_if_absent(&reminder).unwrap();

        assert!(db
            .claim_reminder(&reminder.id, DeliveryStatus::Pending, now)
            .unwrap());
        assert!(!db
            .claim_reminder(&reminder.id, DeliveryStatus::Pending, now)
            .unwrap());

        // Stale-claim release makes it claimable again
        let released = db.release_stale_claims(now + Duration::minutes(1)).unwrap();
        assert_eq!(released, 1);
        assert!(db
            .claim_reminder(&reminder.id, DeliveryStatus::Pending, now)
            .unwrap());
    }

    #[test]
    fn due_query_skips_future_and_claimed() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, now);

        let due = Reminder::one_time(
            &contract,
            ReminderType::ExpirationWarning,
            ReminderPriority::High,
            NotificationMethod::Email,
            now - Duration::hours(1),
            now,
        );
        db.insert_reminder_if_absent(&due).unwrap();

        let future = Reminder::one_time(
            &contract,
            ReminderType::RenewalDue,
            ReminderPriority::Urgent,
            NotificationMethod::Email,
            now + Duration::days(5),
            now,
        );
        db.insert_reminder_if_absent(&future).unwrap();

        let found = db.due_pending(now).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);

        db.claim_reminder(&due.id, DeliveryStatus::Pending, now)
            .unwrap();
        assert!(db.due_pending(now).unwrap().is_empty());
    }

    #[test]
    fn failure_and_retry_bookkeeping() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, now);
        let reminder = Reminder::one_time(
            &contract,
            ReminderType::ExpirationWarning,
            ReminderPriority::High,
            NotificationMethod::Email,
            now,
            now,
        );
        db.insert_reminder_if_absent(&reminder).unwrap();

        db.fail_reminder(&reminder.id, "smtp timeout", now).unwrap();
        let failed = db.get_reminder(&reminder.id).unwrap().unwrap();
        assert_eq!(failed.status, DeliveryStatus::Failed);
        assert_eq!(failed.attempts, 1);
        assert_eq!(failed.failure_reason.as_deref(), Some("smtp timeout"));

        assert_eq!(db.retryable_failed(3).unwrap().len(), 1);
        assert!(db.needs_attention("agent-1", 3).unwrap().is_empty());

        db.fail_reminder(&reminder.id, "smtp timeout", now).unwrap();
        db.fail_reminder(&reminder.id, "smtp timeout", now).unwrap();
        assert!(db.retryable_failed(3).unwrap().is_empty());
        assert_eq!(db.needs_attention("agent-1", 3).unwrap().len(), 1);
    }

    #[test]
    fn advance_recurrence_resets_the_row() {
        let db = make_db();
        let now = Utc::now();
        let contract = make_contract(&db, now);
        let reminder = Reminder::weekly_checkin(&contract, NotificationMethod::Email, 7, now);
        db.insert_reminder_if_absent(&reminder).unwrap();

        db.claim_reminder(&reminder.id, DeliveryStatus::Pending, now)
            .unwrap();
        let next = reminder.scheduled_date + Duration::days(7);
        db.advance_recurrence(&reminder.id, next, now).unwrap();

        let advanced = db.get_reminder(&reminder.id).unwrap().unwrap();
        assert_eq!(advanced.status, DeliveryStatus::Pending);
        assert_eq!(advanced.scheduled_date, next);
        assert_eq!(advanced.next_send_date, Some(next));
        assert_eq!(advanced.attempts, 0);
        assert!(advanced.claimed_at.is_none());
    }

    #[test]
    fn expiring_within_filters_by_horizon() {
        let db = make_db();
        let now = Utc::now();

        let soon = Contract::new(
            "agent-1",
            "client-1",
            RepresentationType::Buyer,
            now - Duration::days(300),
            now + Duration::days(10),
            now,
        );
        let later = Contract::new(
            "agent-1",
            "client-2",
            RepresentationType::Seller,
            now,
            now + Duration::days(200),
            now,
        );
        db.create_contract(&soon).unwrap();
        db.create_contract(&later).unwrap();

        let expiring = db.expiring_within("agent-1", 30, now).unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].id, soon.id);
    }
}
