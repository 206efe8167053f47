use async_trait::async_trait;
use galley_core::domain::ReportPayload;
use thiserror::Error;
use tracing::info;

use crate::client::{SlackApiError, SlackClient};

const REPORT_TITLE: &str = "Your Order Requests Report";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not open a DM with user {0}")]
    DmUnavailable(String),
    #[error(transparent)]
    Api(#[from] SlackApiError),
}

/// Hands a finished report off to the requesting user. Seam for the
/// transport layer's tests.
#[async_trait]
pub trait DeliverReport: Send + Sync {
    async fn deliver(&self, user_id: &str, payload: &ReportPayload) -> Result<(), DeliveryError>;
}

/// Uploads the report as a DM attachment via the external upload flow:
/// reserve a slot, post the bytes, then finalize into the DM channel.
pub struct DmReportDelivery {
    client: SlackClient,
}

impl DmReportDelivery {
    pub fn new(client: SlackClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeliverReport for DmReportDelivery {
    async fn deliver(&self, user_id: &str, payload: &ReportPayload) -> Result<(), DeliveryError> {
        let dm_channel = self
            .client
            .conversations_open(user_id)
            .await
            .map_err(|_| DeliveryError::DmUnavailable(user_id.to_owned()))?;

        let slot = self.client.get_upload_url(&payload.filename, payload.bytes.len()).await?;
        self.client.post_file_content(&slot.upload_url, payload.bytes.clone()).await?;
        self.client.complete_upload(&slot.file_id, REPORT_TITLE, &dm_channel).await?;

        info!(
            user_id,
            filename = %payload.filename,
            row_count = payload.row_count,
            "report delivered via DM"
        );
        Ok(())
    }
}
