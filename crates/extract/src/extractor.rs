use async_trait::async_trait;
use galley_core::aggregate::normalize_name;
use galley_core::domain::{OrderItem, RawMessage};
use galley_core::pipeline::OrderExtractor;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm::ChatModel;

/// Extracts order items from one message via the chat model. Content-level
/// problems (unparseable or schema-violating replies) degrade to zero items;
/// transport-level problems retry a bounded number of times, then the
/// message is skipped. Neither is ever fatal to the batch.
pub struct LlmOrderExtractor<M> {
    model: M,
    max_retries: u32,
}

impl<M> LlmOrderExtractor<M>
where
    M: ChatModel,
{
    pub fn new(model: M, max_retries: u32) -> Self {
        Self { model, max_retries }
    }
}

#[async_trait]
impl<M> OrderExtractor for LlmOrderExtractor<M>
where
    M: ChatModel,
{
    async fn extract(&self, message: RawMessage) -> Vec<OrderItem> {
        let prompt = build_prompt(&message.text);

        for attempt in 0..=self.max_retries {
            match self.model.complete(&prompt).await {
                Ok(reply) => {
                    let items = parse_items(&reply, &message);
                    debug!(
                        message_id = %message.id,
                        item_count = items.len(),
                        "message extraction finished"
                    );
                    return items;
                }
                Err(error) => {
                    warn!(
                        message_id = %message.id,
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "model call failed"
                    );
                }
            }
        }

        warn!(message_id = %message.id, "model retries exhausted; skipping message");
        Vec::new()
    }
}

fn build_prompt(message_text: &str) -> String {
    format!(
        r#"Extract kitchen-supply order items from the following message. Format the output as a JSON object with the structure:
{{"items": [{{"name": "rice", "quantity": 2, "unit": "bags"}}]}}

Use null for quantity or unit when the message does not state them. If no order items are found in the message, return:
{{"items": []}}

Do not include any additional text, explanations, or markdown formatting (e.g. ```json).

Message: {message_text}"#
    )
}

/// Defensive boundary around the model's reply. The model is an untrusted
/// producer of text: any ambiguity resolves to "no items", never a guess.
fn parse_items(reply: &str, message: &RawMessage) -> Vec<OrderItem> {
    let cleaned = strip_code_fences(reply.trim());
    let parsed: ModelReply = match serde_json::from_str(cleaned) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(message_id = %message.id, error = %error, "discarding unparseable model reply");
            return Vec::new();
        }
    };

    parsed
        .items
        .into_iter()
        .filter_map(|item| {
            let name = item.name.unwrap_or_default().trim().to_owned();
            if normalize_name(&name).is_empty() {
                return None;
            }
            Some(OrderItem {
                name,
                quantity: item.quantity.as_ref().and_then(parse_quantity),
                unit: item.unit.filter(|unit| !unit.trim().is_empty()),
                requester: message.author.clone(),
                source_message_id: message.id.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ModelReply {
    #[serde(default)]
    items: Vec<ModelItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    quantity: Option<serde_json::Value>,
    #[serde(default)]
    unit: Option<String>,
}

/// Models return quantities as numbers or numeric strings; anything else is
/// treated as absent.
fn parse_quantity(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(number) => number.to_string().parse().ok(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn strip_code_fences(reply: &str) -> &str {
    let Some(rest) = reply.strip_prefix("```") else {
        return reply;
    };
    // Drop the fence line (which may carry a language tag) and the closing
    // fence if present.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim().strip_suffix("```").map(str::trim_end).unwrap_or(body).trim()
}
