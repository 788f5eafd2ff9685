//! Domain records pulled from the back-office datastore
//!
//! These are the inputs of the template engine. Pagination and query shape
//! are the datastore collaborator's concern; by the time records reach the
//! engine they are plain, fully materialized values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order lifecycle status as recorded by the back-office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Whether the order still needs fulfillment work. Staff-tier priority
    /// escalation only applies to actionable orders.
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// One order, denormalized with the assignment/blacklist/tracking/supplier
/// fields the Account and Staff tiers render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub account_id: u32,
    pub customer_name: String,
    pub customer_email: String,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub total: f64,
    pub assigned_to: Option<String>,
    pub tracking_number: Option<String>,
    pub supplier_order_id: Option<String>,
    pub blacklisted: bool,
    pub notes: Option<String>,
}

/// One active listing on an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub listing_id: String,
    pub account_id: u32,
    pub title: String,
    pub price: f64,
    pub quantity: u32,
    pub watchers: u32,
}

/// One buyer message on an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub account_id: u32,
    pub sender: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub answered: bool,
}

/// Aggregated per-account state rendered by the Master tier. Computed fresh
/// by the datastore on every pass, never incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: u32,
    pub display_name: String,
    pub orders_pending: u32,
    pub orders_processing: u32,
    pub orders_shipped: u32,
    pub revenue: f64,
    pub assigned_orders: u32,
    pub sync_ok: bool,
    pub last_error: Option<String>,
}

/// Everything one sync pass feeds into the template engine. Only the slice
/// relevant to the target tier is populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainBatch {
    pub orders: Vec<OrderRecord>,
    pub listings: Vec<ListingRecord>,
    pub messages: Vec<MessageRecord>,
    pub summaries: Vec<AccountSummary>,
}

impl DomainBatch {
    #[must_use]
    pub fn from_orders(orders: Vec<OrderRecord>) -> Self {
        Self {
            orders,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_summaries(summaries: Vec<AccountSummary>) -> Self {
        Self {
            summaries,
            ..Self::default()
        }
    }
}
