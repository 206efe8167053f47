use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::DateRange;
use crate::errors::DateValidationError;

const DATE_FORMAT: &str = "%m/%d/%Y";

/// Validates a user-supplied start date against the lookback window and the
/// current time. Pure function of input and clock.
#[derive(Clone, Debug)]
pub struct DateRangeValidator {
    lookback_days: u32,
}

impl Default for DateRangeValidator {
    fn default() -> Self {
        Self { lookback_days: 30 }
    }
}

impl DateRangeValidator {
    pub fn new(lookback_days: u32) -> Self {
        Self { lookback_days }
    }

    pub fn validate(&self, raw: &str) -> Result<DateRange, DateValidationError> {
        self.validate_at(raw, Utc::now())
    }

    pub fn validate_at(
        &self,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<DateRange, DateValidationError> {
        let input = raw.trim();
        let start = NaiveDate::parse_from_str(input, DATE_FORMAT)
            .map_err(|_| DateValidationError::Format { input: input.to_owned() })?;

        let today = now.date_naive();
        let earliest = today - Duration::days(i64::from(self.lookback_days));

        if start < earliest {
            return Err(DateValidationError::TooOld {
                lookback_days: self.lookback_days,
                earliest,
            });
        }
        if start > today {
            return Err(DateValidationError::FutureDate);
        }

        Ok(DateRange { start, end: today })
    }
}
