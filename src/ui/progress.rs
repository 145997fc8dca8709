use crate::tracker::{Phase, ProgressObserver, TrackerEvent};
use crate::ui::icons::{CHECK, CROSS, SEARCH, SPARKLE, WRENCH};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;

/// Terminal renderer for a workflow run, driven by tracker events.
///
/// Two bars are stacked vertically:
/// - Pipeline bar: how many of the five phases have completed
/// - Phase bar: percent of the current phase
///
/// Phase completions are also printed as lines so the history stays on
/// screen after the bars finish.
pub struct WorkflowUI {
    multi: MultiProgress,
    pipeline_bar: ProgressBar,
    phase_bar: ProgressBar,
    verbose: bool,
    /// Completed phases in the order they were announced.
    completed: Mutex<Vec<Phase>>,
}

impl WorkflowUI {
    pub fn new(verbose: bool) -> Self {
        Self::with_target(ProgressDrawTarget::stderr(), verbose)
    }

    /// Renders nothing. Used by tests and non-interactive callers.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden(), false)
    }

    fn with_target(target: ProgressDrawTarget, verbose: bool) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let pipeline_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");
        let pipeline_bar = multi.add(ProgressBar::new(Phase::ALL.len() as u64));
        pipeline_bar.set_style(pipeline_style);
        pipeline_bar.set_prefix("Pipeline");

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.green/white}] {pos:>3}% {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");
        let phase_bar = multi.add(ProgressBar::new(100));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("   Phase");

        Self {
            multi,
            pipeline_bar,
            phase_bar,
            verbose,
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Print through `MultiProgress`, falling back to `eprintln!`.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn completed_phases(&self) -> Vec<Phase> {
        self.completed
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn phase_icon(phase: Phase) -> String {
        match phase {
            Phase::Detection | Phase::Verification => SEARCH.to_string(),
            Phase::Fixing => WRENCH.to_string(),
            Phase::Analysis | Phase::Commit => String::new(),
        }
    }

    fn start_phase(&self, phase: Phase) {
        self.phase_bar.set_position(0);
        self.phase_bar
            .set_message(format!("{}{}", Self::phase_icon(phase), style(phase).yellow()));
        self.pipeline_bar
            .set_message(format!("{}", style(phase).yellow()));
        if self.verbose {
            self.print_line(format!("  {} {}", style("→").dim(), style(phase).dim()));
        }
    }

    fn phase_complete(&self, phase: Phase) {
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(phase);
        }
        self.phase_bar.set_position(100);
        self.pipeline_bar.inc(1);
        self.print_line(format!("{} {} complete", CHECK, style(phase).green().bold()));
    }

    fn run_complete(&self) {
        self.phase_bar.finish_and_clear();
        self.pipeline_bar
            .finish_with_message(format!("{}Run finished", SPARKLE));
    }

    fn run_failed(&self, phase: Option<Phase>, message: &str) {
        self.phase_bar.abandon();
        let at = phase
            .map(|p| format!(" during {}", p))
            .unwrap_or_default();
        self.pipeline_bar
            .abandon_with_message(format!("{}", style("Run failed").red()));
        self.print_line(format!(
            "{} Run failed{}: {}",
            CROSS,
            at,
            style(message).red()
        ));
    }
}

impl ProgressObserver for WorkflowUI {
    fn on_event(&self, event: &TrackerEvent) {
        match event {
            TrackerEvent::RunStarted { run_id } => {
                let id = run_id.to_string();
                self.print_line(format!(
                    "{} Run {}",
                    style("Starting").bold(),
                    style(&id[..8]).cyan()
                ));
            }
            TrackerEvent::PhaseStarted { phase, .. } => self.start_phase(*phase),
            TrackerEvent::PhaseProgress { percent, .. } => {
                self.phase_bar.set_position(*percent as u64);
            }
            TrackerEvent::PhaseCompleted { phase, .. } => self.phase_complete(*phase),
            TrackerEvent::RunCompleted { .. } => self.run_complete(),
            TrackerEvent::RunFailed { phase, message, .. } => self.run_failed(*phase, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::ProgressTracker;
    use std::sync::Arc;

    #[test]
    fn test_ui_follows_tracker_events() {
        let ui = Arc::new(WorkflowUI::hidden());
        let mut tracker = ProgressTracker::new();
        tracker.register_observer(ui.clone());

        tracker.start_run().unwrap();
        tracker.set_phase_progress(Phase::Detection, 50).unwrap();
        assert_eq!(ui.phase_bar.position(), 50);

        tracker.set_phase_progress(Phase::Detection, 100).unwrap();
        assert_eq!(ui.pipeline_bar.position(), 1);
        assert_eq!(ui.phase_bar.position(), 0);
        assert_eq!(ui.completed_phases(), vec![Phase::Detection]);
    }

    #[test]
    fn test_failure_abandons_bars() {
        let ui = Arc::new(WorkflowUI::hidden());
        let mut tracker = ProgressTracker::new();
        tracker.register_observer(ui.clone());
        tracker.start_run().unwrap();
        tracker.fail_run("disk full").unwrap();
        assert!(ui.pipeline_bar.is_finished());
    }
}
