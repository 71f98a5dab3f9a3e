//! Operator-visible startup notices (the side panel).
//!
//! Every notice is also emitted as a tracing event, so the same information
//! reaches the log and the UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered list of notices collected while the service starts up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    notices: Vec<Notice>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!(notice = %text, "diagnostic");
        self.push(NoticeLevel::Info, text);
    }

    pub fn success(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!(notice = %text, "diagnostic");
        self.push(NoticeLevel::Success, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        error!(notice = %text, "diagnostic");
        self.push(NoticeLevel::Error, text);
    }

    fn push(&mut self, level: NoticeLevel, text: String) {
        self.notices.push(Notice {
            level,
            text,
            timestamp: Utc::now(),
        });
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(|n| n.level == NoticeLevel::Error)
    }
}
