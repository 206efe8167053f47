pub mod aggregate;
pub mod config;
pub mod daterange;
pub mod domain;
pub mod errors;
pub mod pipeline;
pub mod report;

pub use aggregate::{aggregate, normalize_name, normalize_unit};
pub use daterange::DateRangeValidator;
pub use domain::{AggregatedRow, DateRange, OrderItem, RawMessage, ReportPayload};
pub use errors::{DateValidationError, FetchError, RenderError, RequestError};
pub use pipeline::{
    HistoryFetcher, OrderExtractor, PipelineLimits, ReportPipeline, RequestOutcome,
};
pub use report::{RenderReport, XlsxReportRenderer};
