use tracing::info;

use crate::error::RagError;

/// Delivers messages to the administrator.
pub trait Notifier: Send + Sync {
    fn notify_admin(&self, subject: &str, body: &str) -> Result<(), RagError>;
}

/// Records admin notifications in the application log instead of sending mail.
pub struct LogNotifier {
    admin_email: String,
}

impl LogNotifier {
    pub fn new(admin_email: impl Into<String>) -> Self {
        Self {
            admin_email: admin_email.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify_admin(&self, subject: &str, body: &str) -> Result<(), RagError> {
        info!(to = %self.admin_email, subject, body, "admin notification");
        Ok(())
    }
}
