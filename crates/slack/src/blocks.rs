use galley_core::domain::DateRange;
use galley_core::errors::RequestError;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { text: TextObject },
}

/// An ephemeral reply for a slash-command `response_url`. `text` is the
/// notification fallback for clients that do not render blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResponseMessage {
    pub response_type: &'static str,
    pub text: String,
    pub blocks: Vec<Block>,
}

impl ResponseMessage {
    fn ephemeral(text: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self { response_type: "ephemeral", text: text.into(), blocks }
    }
}

fn section(text: impl Into<String>) -> Block {
    Block::Section { text: TextObject::mrkdwn(text) }
}

/// Immediate acknowledgement returned from the webhook before the pipeline
/// runs.
pub fn ack_message() -> ResponseMessage {
    ResponseMessage::ephemeral(
        "Processing your request. You'll receive the report via DM shortly.",
        Vec::new(),
    )
}

pub fn error_message(error: &RequestError) -> ResponseMessage {
    let headline = format!(":x: *{}*\n{}", error.title(), error.user_message());
    let blocks =
        vec![section(headline), section(format!(":bulb: {}", error.suggestion()))];
    ResponseMessage::ephemeral(format!("{}: {}", error.title(), error.user_message()), blocks)
}

pub fn empty_result_message(range: &DateRange) -> ResponseMessage {
    let start = range.start.format("%m/%d/%Y");
    let blocks = vec![
        section(format!(":x: *No Data Found*\nNo valid orders found since {start}.")),
        section(":bulb: Try an earlier date, e.g. `/shopping-list MM/DD/YYYY`."),
    ];
    ResponseMessage::ephemeral(format!("No valid orders found since {start}."), blocks)
}

pub fn unsupported_command_message(command: &str) -> ResponseMessage {
    let text = format!("`{command}` is not supported. Use `/shopping-list MM/DD/YYYY`.");
    let blocks = vec![section(format!(":x: {text}"))];
    ResponseMessage::ephemeral(text, blocks)
}

pub fn report_sent_message() -> ResponseMessage {
    ResponseMessage::ephemeral(
        ":white_check_mark: Your report has been sent to your DMs!",
        vec![section(":white_check_mark: Your report has been sent to your DMs!")],
    )
}

pub fn delivery_failed_message() -> ResponseMessage {
    ResponseMessage::ephemeral(
        "Couldn't send you a DM.",
        vec![section(
            ":x: *Delivery Failed*\nCouldn't send you a DM. Please check that you have DMs enabled with this app.",
        )],
    )
}

#[cfg(test)]
mod tests {
    use galley_core::errors::{FetchError, RequestError};

    use super::{ack_message, empty_result_message, error_message};

    #[test]
    fn error_message_carries_title_detail_and_suggestion() {
        let error = RequestError::from(FetchError::Access { channel_id: "C777".to_owned() });
        let message = error_message(&error);
        let rendered = serde_json::to_string(&message).expect("serializes");

        assert!(rendered.contains("ephemeral"));
        assert!(rendered.contains("Channel Access Needed"));
        assert!(rendered.contains("C777"));
        assert!(rendered.contains(":bulb:"));
    }

    #[test]
    fn empty_result_message_suggests_retrying_earlier() {
        let range = galley_core::domain::DateRange {
            start: chrono::NaiveDate::from_ymd_opt(2026, 8, 23).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2026, 8, 30).unwrap(),
        };
        let message = empty_result_message(&range);
        assert!(message.text.contains("08/23/2026"));
        let rendered = serde_json::to_string(&message).expect("serializes");
        assert!(rendered.contains("No Data Found"));
    }

    #[test]
    fn unsupported_command_message_redirects_to_the_real_command() {
        let message = super::unsupported_command_message("/weather");
        assert!(message.text.contains("/weather"));
        assert!(message.text.contains("/shopping-list"));
    }

    #[test]
    fn ack_is_ephemeral_plain_text() {
        let message = ack_message();
        assert_eq!(message.response_type, "ephemeral");
        assert!(message.blocks.is_empty());
    }
}
