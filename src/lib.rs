pub mod args;
pub mod client;
pub mod commands;
pub mod config;
pub mod dns;
pub mod rows;
pub mod types;

pub use client::{ApiError, SparkPostClient};
pub use commands::{CliError, Summary};
pub use config::Settings;
pub use dns::{dkim_txt_record, tracking_cname_record};
pub use rows::{DomainRecord, FileKind, Row, SubaccountRecord, TrackingRecord};
