/// Trait for handling progress events raised between extraction passes.
///
/// Entirely cosmetic: implementations must not influence pass ordering or output.
pub trait ProgressHandler: Send + Sync {
    /// Called when a pass starts reading/writing `file`.
    fn on_start_pass(&self, file: &str);

    /// Called when a pass has finished writing (or collecting ids for) `file`.
    fn on_finish_pass(&self, file: &str);

    /// Set the total number of passes a driver is about to run.
    fn set_total_passes(&self, count: usize) {
        let _ = count;
    }

    /// Increment overall pass progress.
    fn increment_pass_progress(&self) {}
}

/// A no-op progress handler, used for `--no-progress` and for library/test callers.
pub struct NoOpProgressHandler;

impl ProgressHandler for NoOpProgressHandler {
    fn on_start_pass(&self, _file: &str) {}
    fn on_finish_pass(&self, _file: &str) {}
}
