use tracing::warn;

/// Blocking user notifications. The CLI prints them; a UI would show a dialog.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Reports alerts on stderr and in the log.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, message: &str) {
        warn!(alert = message, "user alert");
        eprintln!("! {message}");
    }
}
