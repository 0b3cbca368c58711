use crate::domain::ports::Notifier;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Writes notifications to the log. Stands in for an email channel.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    subject_prefix: Option<String>,
}

impl LogNotifier {
    pub fn new(subject_prefix: Option<String>) -> Self {
        Self { subject_prefix }
    }

    pub fn subject(&self, subject: &str) -> String {
        match &self.subject_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{} {}", prefix, subject),
            _ => subject.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        tracing::info!(subject = %self.subject(subject), "📧 {}", body);
        Ok(())
    }
}
