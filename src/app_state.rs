use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::PlaygroundConfig;
use crate::dialect::Dialect;
use crate::editor::{CodeBuffer, EditorSurface};
use crate::hints::overlay::HintOverlay;
use crate::output::{LogEntry, OutputPanel};
use crate::runner::{RunJob, RunnerHandle};
use crate::samples;
use crate::scheduler::{Debouncer, Trigger};
use crate::transpile::{Compiler, TypeStripper};

pub struct AppState {
    pub config: PlaygroundConfig,
    pub dialect: Dialect,
    pub buffer: CodeBuffer,
    pub output: OutputPanel,
    pub overlay: HintOverlay,
    pub scheduler: Debouncer<Trigger, ()>,
    pub auto_run: bool,

    /// A run was submitted and its result has not arrived yet.
    pub run_in_flight: bool,
    /// A run was requested while another was in flight.
    pub rerun_pending: bool,
    runner: Option<RunnerHandle>,

    /// Focus the editor (and restore its cursor) on the next frame.
    pub focus_editor: bool,
    pub tiny_screen: bool,
}

impl AppState {
    pub fn new(config: PlaygroundConfig) -> Self {
        Self::with_compiler(config, Arc::new(TypeStripper))
    }

    pub fn with_compiler(config: PlaygroundConfig, compiler: Arc<dyn Compiler>) -> Self {
        let runner = match RunnerHandle::spawn(compiler) {
            Ok(runner) => Some(runner),
            Err(e) => {
                error!(%e, "could not start the run worker");
                None
            }
        };
        let dialect = config.dialect;
        Self {
            dialect,
            buffer: CodeBuffer::new(samples::sample(dialect)),
            output: OutputPanel::default(),
            overlay: HintOverlay::new(config.hints.max_visible),
            scheduler: Debouncer::new(),
            auto_run: config.auto_run,
            run_in_flight: false,
            rerun_pending: false,
            runner,
            focus_editor: true,
            tiny_screen: false,
            config,
        }
    }

    /// Clears the output and hands the buffer to the worker. While a run is
    /// outstanding the request is remembered and replayed when it finishes.
    pub fn request_run(&mut self) {
        if self.run_in_flight {
            debug!("run in flight, queueing a rerun");
            self.rerun_pending = true;
            return;
        }
        self.output.clear();
        let Some(runner) = &self.runner else {
            self.output
                .append(LogEntry::error("Unexpected error: the run worker is not available"));
            return;
        };
        let job = RunJob {
            source: self.buffer.text.clone(),
            dialect: self.dialect,
            limits: self.config.sandbox.clone(),
        };
        match runner.submit(job) {
            Ok(()) => {
                self.run_in_flight = true;
                self.output.set_running(true);
            }
            Err(entry) => {
                self.output.append(entry);
                self.runner = None;
            }
        }
    }

    /// Collects a finished run, if any, and starts the queued rerun.
    pub fn poll_runner(&mut self) {
        let Some(runner) = &self.runner else {
            return;
        };
        let Some(entries) = runner.poll() else {
            return;
        };
        info!(entries = entries.len(), "run finished");
        self.run_in_flight = false;
        self.output.set_running(false);
        self.output.extend(entries);
        if std::mem::take(&mut self.rerun_pending) {
            self.request_run();
        }
    }

    pub fn auto_run_delay(&self) -> f64 {
        self.config.scheduler.auto_run_delay(self.tiny_screen).as_secs_f64()
    }

    /// Debounces the follow-ups of an edit at time `now`.
    pub fn on_edit(&mut self, now: f64) {
        if self.auto_run {
            let delay = self.auto_run_delay();
            self.scheduler.schedule(Trigger::AutoRun, delay, (), now);
        }
        if self.config.hints.enabled {
            let delay = self.config.scheduler.hint_delay().as_secs_f64();
            self.scheduler.schedule(Trigger::AutoHint, delay, (), now);
        }
    }

    pub fn set_auto_run(&mut self, enabled: bool) {
        self.auto_run = enabled;
        if !enabled && self.scheduler.cancel(Trigger::AutoRun) {
            debug!("pending auto-run cancelled");
        }
    }

    /// Switches dialect and loads its sample program.
    pub fn set_dialect(&mut self, dialect: Dialect) {
        if dialect == self.dialect {
            return;
        }
        info!(%dialect, "dialect switched");
        self.dialect = dialect;
        self.buffer = CodeBuffer::new(samples::sample(dialect));
        self.overlay.close();
        self.scheduler.cancel(Trigger::AutoHint);
        self.focus_editor = true;
    }

    pub fn clear_editor(&mut self) {
        self.buffer.set_text(String::new());
        self.overlay.close();
        self.scheduler.cancel(Trigger::AutoHint);
        self.scheduler.cancel(Trigger::AutoRun);
        self.focus_editor = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Severity;
    use std::time::{Duration, Instant};

    fn wait_for_run(state: &mut AppState) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while state.run_in_flight {
            assert!(Instant::now() < deadline, "run never finished");
            std::thread::sleep(Duration::from_millis(5));
            state.poll_runner();
        }
    }

    #[test]
    fn starts_with_the_configured_sample() {
        let config = PlaygroundConfig {
            dialect: Dialect::TypeScript,
            ..PlaygroundConfig::default()
        };
        let state = AppState::new(config);
        assert_eq!(state.buffer.text, samples::sample(Dialect::TypeScript));
        assert!(state.focus_editor);
    }

    #[test]
    fn runs_replace_previous_output() {
        let mut state = AppState::new(PlaygroundConfig::default());
        state.buffer = CodeBuffer::new("console.log('first')");
        state.request_run();
        assert!(state.output.is_running());
        wait_for_run(&mut state);

        state.buffer = CodeBuffer::new("console.error('second')");
        state.request_run();
        wait_for_run(&mut state);
        assert!(!state.output.is_running());
        assert_eq!(state.output.entries(), &[LogEntry::new(Severity::Error, "second")]);
    }

    #[test]
    fn second_request_while_running_is_queued() {
        let mut state = AppState::new(PlaygroundConfig::default());
        state.buffer = CodeBuffer::new("let n = 0; for (let i = 0; i < 20000; i++) n += i; console.log(n)");
        state.request_run();
        state.request_run();
        assert!(state.rerun_pending);
        // Polling dispatches the queued run as soon as the first finishes.
        wait_for_run(&mut state);
        assert!(!state.rerun_pending);
        assert_eq!(state.output.entries(), &[LogEntry::new(Severity::Log, "199990000")]);
    }

    #[test]
    fn disabling_auto_run_cancels_the_pending_run() {
        let mut state = AppState::new(PlaygroundConfig::default());
        state.on_edit(0.0);
        assert!(state.scheduler.is_pending(Trigger::AutoRun));
        assert!(state.scheduler.is_pending(Trigger::AutoHint));
        state.set_auto_run(false);
        assert!(!state.scheduler.is_pending(Trigger::AutoRun));
        state.on_edit(1.0);
        assert!(!state.scheduler.is_pending(Trigger::AutoRun));
    }

    #[test]
    fn dialect_switch_loads_its_sample() {
        let mut state = AppState::new(PlaygroundConfig::default());
        state.buffer = CodeBuffer::new("scratch");
        state.set_dialect(Dialect::TypeScript);
        assert_eq!(state.buffer.text, samples::sample(Dialect::TypeScript));
        state.clear_editor();
        assert!(state.buffer.is_blank());
    }
}
