use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Validated reporting window. `end` is always "today" at validation time and
/// `start` is never more than the configured lookback window in the past.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// First instant of the range in UTC, used as the lower bound for
    /// channel-history queries.
    pub fn start_of_day_utc(&self) -> DateTime<Utc> {
        let midnight = self.start.and_hms_opt(0, 0, 0).unwrap_or_default();
        DateTime::from_naive_utc_and_offset(midnight, Utc)
    }
}

/// One channel message as returned by the history collaborator. Read-only
/// within the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    pub author: String,
    pub text: String,
    pub posted_at: DateTime<Utc>,
}

/// A single extracted order line. Zero, one, or many may come out of one
/// message. `name` is non-empty after normalization; extraction drops records
/// that fail this.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderItem {
    pub name: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub requester: String,
    pub source_message_id: String,
}

/// One report row, built by merging every [`OrderItem`] that shares a
/// normalized `(name, unit)` key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatedRow {
    pub name: String,
    pub total_quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub requesters: Vec<String>,
}

/// Terminal artifact of a report request. Ownership transfers to the caller
/// for delivery; the pipeline keeps nothing after returning it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportPayload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub row_count: usize,
}
