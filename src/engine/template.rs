//! Tiered template engine
//!
//! Transforms domain records into the three output shapes: Master (one row
//! per account, aggregated), Account (one row per order, denormalized) and
//! Staff (one row per assigned order, with derived priority). Tier dispatch
//! is a single exhaustive match; there is no runtime template lookup.
//!
//! Validation runs before any write. A batch with even one invalid record
//! produces zero rows: partial writes of an inconsistent row set are
//! disallowed, the caller gets the errors instead.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{AccountSummary, DomainBatch, OrderRecord, SheetTier, SheetType};
use crate::infrastructure::backend::SheetRow;

/// Derived urgency of a Staff-tier row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// Result of one transformation pass. `rows` is empty whenever
/// `validation_errors` is not.
#[derive(Debug, Clone, Default)]
pub struct TemplateOutput {
    pub rows: Vec<SheetRow>,
    pub validation_errors: Vec<String>,
}

/// Column headers of each tier's shape, used when provisioning a sheet.
#[must_use]
pub fn headers(tier: SheetTier) -> &'static [&'static str] {
    match tier {
        SheetTier::Master => &[
            "Account ID",
            "Account",
            "Pending",
            "Processing",
            "Shipped",
            "Revenue",
            "Assigned",
            "Sync OK",
            "Last Error",
        ],
        SheetTier::Account => &[
            "Order ID",
            "Customer",
            "Email",
            "Status",
            "Order Date",
            "Total",
            "Assigned To",
            "Tracking",
            "Supplier Order",
            "Blacklisted",
            "Notes",
        ],
        SheetTier::Staff => &[
            "Order ID",
            "Account ID",
            "Status",
            "Order Date",
            "Customer",
            "Priority",
            "Tracking",
            "Notes",
        ],
    }
}

/// Transform one batch into keyed rows for the given tier.
#[must_use]
pub fn transform(
    tier: SheetTier,
    sheet_type: SheetType,
    batch: &DomainBatch,
    now: DateTime<Utc>,
) -> TemplateOutput {
    let mut output = match tier {
        SheetTier::Master => transform_master(&batch.summaries),
        SheetTier::Account => transform_account(&batch.orders),
        SheetTier::Staff => transform_staff(&batch.orders, now),
    };
    if !output.validation_errors.is_empty() {
        tracing::debug!(
            tier = %tier,
            sheet_type = %sheet_type,
            errors = output.validation_errors.len(),
            "template validation rejected batch"
        );
        output.rows.clear();
    }
    output
}

/// Priority of one order on a staff sheet.
///
/// Statuses outside pending/processing are Low regardless of age. That
/// mirrors the production back-office: a stale shipped order never escalates
/// here. Kept explicit and pinned by a test rather than silently changed.
#[must_use]
pub fn staff_priority(now: DateTime<Utc>, order: &OrderRecord) -> Priority {
    if !order.status.is_actionable() {
        return Priority::Low;
    }
    let age = now - order.order_date;
    if age >= Duration::days(3) {
        Priority::High
    } else if age >= Duration::days(1) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

fn transform_master(summaries: &[AccountSummary]) -> TemplateOutput {
    let mut output = TemplateOutput::default();
    for (index, summary) in summaries.iter().enumerate() {
        if summary.display_name.trim().is_empty() {
            output
                .validation_errors
                .push(format!("summary {index}: account display name is empty"));
        }
        if !summary.revenue.is_finite() {
            output.validation_errors.push(format!(
                "summary {index} (account {}): revenue is not a number",
                summary.account_id
            ));
        }
        output.rows.push(SheetRow::new(
            summary.account_id.to_string(),
            vec![
                summary.account_id.to_string(),
                summary.display_name.clone(),
                summary.orders_pending.to_string(),
                summary.orders_processing.to_string(),
                summary.orders_shipped.to_string(),
                format!("{:.2}", summary.revenue),
                summary.assigned_orders.to_string(),
                if summary.sync_ok { "OK" } else { "ERROR" }.to_string(),
                summary.last_error.clone().unwrap_or_default(),
            ],
        ));
    }
    output
}

fn transform_account(orders: &[OrderRecord]) -> TemplateOutput {
    let mut output = TemplateOutput::default();
    for (index, order) in orders.iter().enumerate() {
        if order.order_id.trim().is_empty() {
            output
                .validation_errors
                .push(format!("order {index}: order id is empty"));
        }
        if order.customer_email.trim().is_empty() {
            output.validation_errors.push(format!(
                "order {index} ({}): customer email is empty",
                order.order_id
            ));
        }
        output.rows.push(SheetRow::new(
            order.order_id.clone(),
            vec![
                order.order_id.clone(),
                order.customer_name.clone(),
                order.customer_email.clone(),
                order.status.to_string(),
                order.order_date.to_rfc3339(),
                format!("{:.2}", order.total),
                order.assigned_to.clone().unwrap_or_default(),
                order.tracking_number.clone().unwrap_or_default(),
                order.supplier_order_id.clone().unwrap_or_default(),
                if order.blacklisted { "YES" } else { "" }.to_string(),
                order.notes.clone().unwrap_or_default(),
            ],
        ));
    }
    output
}

fn transform_staff(orders: &[OrderRecord], now: DateTime<Utc>) -> TemplateOutput {
    let mut output = TemplateOutput::default();
    for (index, order) in orders.iter().enumerate() {
        if order.order_id.trim().is_empty() {
            output
                .validation_errors
                .push(format!("assigned order {index}: order id is empty"));
        }
        let priority = staff_priority(now, order);
        output.rows.push(SheetRow::new(
            order.order_id.clone(),
            vec![
                order.order_id.clone(),
                order.account_id.to_string(),
                order.status.to_string(),
                order.order_date.to_rfc3339(),
                order.customer_name.clone(),
                priority.as_str().to_string(),
                order.tracking_number.clone().unwrap_or_default(),
                order.notes.clone().unwrap_or_default(),
            ],
        ));
    }
    output
}
