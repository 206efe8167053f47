use std::sync::Arc;
use std::time::Duration;

use galley_core::config::{AppConfig, ConfigError};
use galley_core::daterange::DateRangeValidator;
use galley_core::pipeline::{PipelineLimits, ReportPipeline};
use galley_core::report::XlsxReportRenderer;
use galley_extract::extractor::LlmOrderExtractor;
use galley_extract::llm::OpenAiChatModel;
use galley_slack::client::SlackClient;
use galley_slack::delivery::DmReportDelivery;
use galley_slack::history::{RetryPolicy, SlackHistoryFetcher};
use thiserror::Error;
use tracing::info;

use crate::webhook::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    Client(String),
}

/// Wires config into concrete collaborators and the report pipeline. The
/// pipeline only sees trait objects, so everything here stays swappable in
/// tests.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let slack_client = SlackClient::new(
        config.slack.bot_token.clone(),
        Duration::from_secs(config.report.fetch_timeout_secs),
    )
    .map_err(|err| BootstrapError::Client(err.to_string()))?;

    let fetcher = SlackHistoryFetcher::new(
        slack_client.clone(),
        config.slack.channel_id.clone(),
        RetryPolicy { max_retries: config.report.fetch_max_retries, ..RetryPolicy::default() },
    );

    let chat_model = OpenAiChatModel::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        Duration::from_secs(config.llm.timeout_secs),
    )
    .map_err(|err| BootstrapError::Client(err.to_string()))?;
    let extractor = LlmOrderExtractor::new(chat_model, config.llm.max_retries);

    let pipeline = ReportPipeline::new(
        DateRangeValidator::new(config.report.lookback_days),
        Arc::new(fetcher),
        Arc::new(extractor),
        Arc::new(XlsxReportRenderer),
        PipelineLimits {
            extract_concurrency: config.report.extract_concurrency,
            deadline: Duration::from_secs(config.report.deadline_secs),
        },
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        delivery: Arc::new(DmReportDelivery::new(slack_client.clone())),
        slack: Arc::new(slack_client),
        signing_secret: config.slack.signing_secret.clone(),
    };

    info!(
        channel_id = %config.slack.channel_id,
        model = %config.llm.model,
        lookback_days = config.report.lookback_days,
        "application bootstrap complete"
    );

    Ok(Application { config, state })
}
