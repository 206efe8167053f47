//! Slack integration for galley:
//! - **Web API client** (`client`) - authenticated calls to the Slack Web API
//! - **History** (`history`) - paginated channel-history fetch with retry
//! - **Commands** (`commands`) - `/shopping-list` slash-command parsing
//! - **Signature** (`signature`) - `v0=` request signature verification
//! - **Blocks** (`blocks`) - Block Kit reply builders
//! - **Delivery** (`delivery`) - report file upload via DM

pub mod blocks;
pub mod client;
pub mod commands;
pub mod delivery;
pub mod history;
pub mod signature;
