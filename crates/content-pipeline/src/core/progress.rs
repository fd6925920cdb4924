//! Progress tracking and reporting for content acquisition

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Progress callback for acquisition operations
pub type ProgressCallback = Arc<dyn Fn(AcquisitionProgress) + Send + Sync>;

/// Named phases of an acquisition, in the order they occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AcquisitionPhase {
    Validating,
    Downloading,
    Extracting,
    Storing,
    Completed,
}

impl AcquisitionPhase {
    /// Slice of the overall 0-100 range owned by this phase
    pub fn overall_range(&self) -> (f64, f64) {
        match self {
            AcquisitionPhase::Validating => (0.0, 10.0),
            AcquisitionPhase::Downloading => (10.0, 60.0),
            AcquisitionPhase::Extracting => (60.0, 80.0),
            AcquisitionPhase::Storing => (80.0, 99.0),
            AcquisitionPhase::Completed => (100.0, 100.0),
        }
    }

    /// Map a percentage within this phase onto the overall range
    pub fn to_overall(&self, phase_percent: f64) -> f64 {
        let (start, end) = self.overall_range();
        let clamped = phase_percent.clamp(0.0, 100.0);
        start + (end - start) * clamped / 100.0
    }
}

impl std::fmt::Display for AcquisitionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionPhase::Validating => write!(f, "Validating"),
            AcquisitionPhase::Downloading => write!(f, "Downloading"),
            AcquisitionPhase::Extracting => write!(f, "Extracting"),
            AcquisitionPhase::Storing => write!(f, "Storing"),
            AcquisitionPhase::Completed => write!(f, "Completed"),
        }
    }
}

/// One progress update emitted during an acquisition
#[derive(Debug, Clone)]
pub struct AcquisitionProgress {
    pub phase: AcquisitionPhase,
    /// Completion within the current phase, 0-100
    pub phase_percent: f64,
    /// Completion of the whole acquisition, 0-100; filled in by [`monotonic`]
    pub overall_percent: f64,
    pub message: String,
    pub current_item: Option<String>,
}

impl AcquisitionProgress {
    pub fn new<S: Into<String>>(phase: AcquisitionPhase, phase_percent: f64, message: S) -> Self {
        Self {
            phase,
            phase_percent,
            overall_percent: phase.to_overall(phase_percent),
            message: message.into(),
            current_item: None,
        }
    }

    pub fn with_item<S: Into<String>>(mut self, item: S) -> Self {
        self.current_item = Some(item.into());
        self
    }
}

/// Emit a progress update if a callback is attached
pub fn report(
    progress_callback: Option<&ProgressCallback>,
    phase: AcquisitionPhase,
    phase_percent: f64,
    message: impl Into<String>,
) {
    if let Some(callback) = progress_callback {
        callback(AcquisitionProgress::new(phase, phase_percent, message));
    }
}

/// Wrap a callback so the overall percentage it sees never decreases
///
/// Deliverers report phase-relative progress and may revisit a phase (for
/// example a second archive download); the wrapper keeps the stream
/// forwarded to the caller monotonic.
pub fn monotonic(callback: ProgressCallback) -> ProgressCallback {
    let high_water = Arc::new(Mutex::new(0.0_f64));
    Arc::new(move |mut event: AcquisitionProgress| {
        let overall = event.phase.to_overall(event.phase_percent);
        let forwarded = {
            let mut seen = high_water.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if overall > *seen {
                *seen = overall;
            }
            *seen
        };
        event.overall_percent = forwarded;
        callback(event);
    })
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_phase_changed(&self, _previous: Option<AcquisitionPhase>, _current: AcquisitionPhase) {}
    fn on_progress(&self, _progress: &AcquisitionProgress) {}
    fn on_completed(&self) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        let last_phase: Mutex<Option<AcquisitionPhase>> = Mutex::new(None);
        Arc::new(move |event| {
            let previous = {
                let mut last = last_phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                let previous = *last;
                *last = Some(event.phase);
                previous
            };

            if previous != Some(event.phase) {
                self.on_phase_changed(previous, event.phase);
            }
            self.on_progress(&event);
            if event.phase == AcquisitionPhase::Completed {
                self.on_completed();
            }
        })
    }
}

/// Progress reporter that writes to the tracing subscriber
#[derive(Debug, Default)]
pub struct TracingProgressReporter {
    pub verbose: bool,
}

impl TracingProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for TracingProgressReporter {
    fn on_phase_changed(&self, _previous: Option<AcquisitionPhase>, current: AcquisitionPhase) {
        info!("Acquisition phase: {}", current);
    }

    fn on_progress(&self, progress: &AcquisitionProgress) {
        if self.verbose {
            debug!("{} {:.1}% (overall {:.1}%): {}",
                progress.phase, progress.phase_percent, progress.overall_percent, progress.message);
        }
    }

    fn on_completed(&self) {
        info!("Acquisition completed");
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Composite progress reporter that forwards events to multiple reporters
pub struct CompositeProgressReporter {
    reporters: Vec<Box<dyn ProgressReporter>>,
}

impl std::fmt::Debug for CompositeProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeProgressReporter")
            .field("reporters_count", &self.reporters.len())
            .finish()
    }
}

impl CompositeProgressReporter {
    pub fn new() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn add_reporter<R: ProgressReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl Default for CompositeProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CompositeProgressReporter {
    fn on_phase_changed(&self, previous: Option<AcquisitionPhase>, current: AcquisitionPhase) {
        for reporter in &self.reporters {
            reporter.on_phase_changed(previous, current);
        }
    }

    fn on_progress(&self, progress: &AcquisitionProgress) {
        for reporter in &self.reporters {
            reporter.on_progress(progress);
        }
    }

    fn on_completed(&self) {
        for reporter in &self.reporters {
            reporter.on_completed();
        }
    }
}
