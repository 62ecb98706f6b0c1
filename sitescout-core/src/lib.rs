pub mod report;
pub mod session;
pub mod topics;

pub use report::{ReportFormat, SiteReport, generate_json_report, generate_text_report, save_report};
pub use session::{Decision, SessionOptions, SessionOutcome, execute_session};
pub use topics::{DirectoryTopic, topic_of};
