use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// A network attachment reaching a reportable state.
///
/// Attachments have no live entity behind them; the registry remembers
/// the last delivered status of each attachment instead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentStateChange {
    pub task_arn: String,
    pub attachment_arn: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AttachmentStateChange {
    pub fn new(
        task_arn: impl Into<String>,
        attachment_arn: impl Into<String>,
        status: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            task_arn: task_arn.into(),
            attachment_arn: attachment_arn.into(),
            status: status.into(),
            reason,
        }
    }

    /// The attachment this change is about, regardless of status.
    pub fn attachment_key(&self) -> (String, String) {
        (self.task_arn.clone(), self.attachment_arn.clone())
    }
}

impl PartialEq for AttachmentStateChange {
    fn eq(&self, other: &Self) -> bool {
        self.attachment_arn == other.attachment_arn && self.status == other.status
    }
}

impl Eq for AttachmentStateChange {}

impl Hash for AttachmentStateChange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attachment_arn.hash(state);
        self.status.hash(state);
    }
}

impl fmt::Display for AttachmentStateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> attachment {} {}",
            self.task_arn, self.attachment_arn, self.status
        )?;
        if let Some(reason) = self.reason.as_deref().filter(|r| !r.is_empty()) {
            write!(f, ", Reason {reason}")?;
        }
        Ok(())
    }
}
