use indicatif::{ProgressBar, ProgressStyle};

/// Receives run progress as a percentage in `0.0..=100.0`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent)
    }
}

/// Renders progress on a terminal bar.
pub struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    pub fn new(label: &str) -> Self {
        let pb = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::default_bar().template(&format!(
            "    {{spinner:.cyan}} {label:<10} [{{bar:30.cyan/blue}}] {{pos:>3}}%"
        )) {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, percent: f64) {
        self.pb.set_position(percent.clamp(0.0, 100.0) as u64);
    }
}

/// Percentage of `done` against a fixed estimate, capped at 100.
pub fn percent_of(done: u64, estimated_total: u64) -> f64 {
    if estimated_total == 0 {
        return 100.0;
    }
    (done as f64 / estimated_total as f64 * 100.0).min(100.0)
}
