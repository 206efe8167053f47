use thiserror::Error;

/// Fields of one slash-command invocation, decoded from the webhook form
/// body by the transport layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
    pub response_url: String,
    pub request_id: String,
}

/// A normalized `/shopping-list` invocation. The date is passed through raw;
/// validation belongs to the pipeline so the user gets the full diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportCommand {
    pub raw_date: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

pub fn parse_report_command(
    payload: &SlashCommandPayload,
) -> Result<ReportCommand, CommandParseError> {
    if payload.command != "/shopping-list" {
        return Err(CommandParseError::UnsupportedCommand(payload.command.clone()));
    }
    Ok(ReportCommand { raw_date: payload.text.trim().to_owned() })
}
