//! Job record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a processing job.
///
/// No transition legality is enforced: any status may be set at any time.
/// Callers use this for observability, not correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    /// In-progress marker set when the prompt is submitted to inference.
    Specific,
    Completed,
    Aborted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Specific => "specific",
            JobStatus::Completed => "completed",
            JobStatus::Aborted => "aborted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "specific" => Some(JobStatus::Specific),
            "completed" => Some(JobStatus::Completed),
            "aborted" => Some(JobStatus::Aborted),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Aborted)
    }
}

/// One job record per processing request
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub job_name: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Specific,
            JobStatus::Completed,
            JobStatus::Aborted,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("running"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Aborted.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Specific.is_terminal());
    }
}
