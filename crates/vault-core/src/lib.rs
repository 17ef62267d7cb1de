pub mod config;
pub mod interval;
pub mod report;
pub mod rules;

pub use config::{ArchiveFormat, BackupConfig};
pub use interval::parse_interval;
pub use report::{format_bytes, RunOutcome, Trigger};
pub use rules::{parse_rules, Rule, RuleAction};
