//! User notification seam

/// Sink for the short messages the panel shows the user
///
/// Implementations decide how to render them (toast, log line, terminal).
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);

    fn info(&self, message: &str);

    /// A long running operation has started
    fn loading(&self, message: &str);

    fn error(&self, message: &str);
}
