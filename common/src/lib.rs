//! rash-scan Common Library
//!
//! CLIと画面実装で共有される型・状態遷移・パーサー

pub mod types;
pub mod error;
pub mod workflow;
pub mod parser;
pub mod history;

pub use types::{
    AcquireRequest, AcquisitionSource, Classification, ClassificationRecord, ImageRef,
    PermissionKind, PermissionStatus, confidence_percent, extension_for_mime, mime_from_extension,
};
pub use error::{Error, Result};
pub use workflow::{transition, Card, Ignored, Session, Step, WorkflowEvent, WorkflowState};
pub use parser::{error_message_from_body, parse_classify_response};
pub use history::{compute_stats, sort_by_recency, HistoryStats};
