use chrono::{Duration, NaiveDate, Utc};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DateValidationError {
    #[error("`{input}` is not a valid MM/DD/YYYY date")]
    Format { input: String },
    #[error("date is more than {lookback_days} days old (earliest allowed: {earliest})")]
    TooOld { lookback_days: u32, earliest: NaiveDate },
    #[error("future dates are not allowed")]
    FutureDate,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("the bot does not have access to channel {channel_id}")]
    Access { channel_id: String },
    #[error("channel history request failed: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("could not produce the report file: {0}")]
    Sink(String),
}

/// Fatal request-level failure. Extraction failures never appear here; they
/// are absorbed per-message inside the extractor.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Date(#[from] DateValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl RequestError {
    /// Short headline for the user-facing reply.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Date(_) => "Invalid Date",
            Self::Fetch(FetchError::Access { .. }) => "Channel Access Needed",
            Self::Fetch(FetchError::Transport(_)) => "Slack Unavailable",
            Self::Render(_) => "Report Generation Failed",
        }
    }

    /// What went wrong, phrased for the requesting user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Date(err) => err.to_string(),
            Self::Fetch(err) => err.to_string(),
            Self::Render(_) => "Could not create the report file.".to_owned(),
        }
    }

    /// One corrective suggestion per error kind.
    pub fn suggestion(&self) -> String {
        match self {
            Self::Date(err) => date_suggestion(err),
            Self::Fetch(FetchError::Access { .. }) => {
                "Invite the bot to the channel, then run the command again.".to_owned()
            }
            Self::Fetch(FetchError::Transport(_)) => {
                "Please try again in a few minutes.".to_owned()
            }
            Self::Render(_) => "Please try again later.".to_owned(),
        }
    }
}

/// The worked example is always a recent date, so copy-pasting it succeeds.
fn date_suggestion(error: &DateValidationError) -> String {
    let example = (Utc::now().date_naive() - Duration::days(7)).format("%m/%d/%Y");
    match error {
        DateValidationError::TooOld { lookback_days, earliest } => format!(
            "Pick a date within the last {lookback_days} days (on or after {}), e.g. `/shopping-list {example}`.",
            earliest.format("%m/%d/%Y")
        ),
        _ => format!("Use MM/DD/YYYY with a recent date, e.g. `/shopping-list {example}`."),
    }
}
