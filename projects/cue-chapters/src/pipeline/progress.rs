use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Receives human-readable status lines while a run is in progress.
/// Purely informational: nothing in the scan depends on it.
pub trait ProgressObserver: Send + Sync {
    fn report(&self, message: &str);
}

/// Blanket implementation so any closure with the right signature
/// automatically implements ProgressObserver.
impl<F> ProgressObserver for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn report(&self, _message: &str) {}
}

/// Terminal spinner showing the latest status line
#[derive(Clone)]
pub struct SpinnerProgress {
    pb: ProgressBar,
}

impl SpinnerProgress {
    pub fn new() -> anyhow::Result<Self> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Ok(Self { pb })
    }

    pub fn finish(&self) {
        self.pb.finish();
    }
}

impl ProgressObserver for SpinnerProgress {
    fn report(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }
}
