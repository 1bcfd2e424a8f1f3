//! Run pipeline: blank check, optional TypeScript compile, sandbox.
//!
//! The UI talks to a [`RunnerHandle`], which owns a background worker fed
//! through mpsc channels so the frame loop never blocks on a run.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info};

use crate::dialect::Dialect;
use crate::output::LogEntry;
use crate::sandbox;
use crate::script::{panic_message, ExecutionLimits, ENGINE_STACK_SIZE};
use crate::transpile::{self, Compiler, Diagnostic};

pub const EMPTY_SOURCE_MESSAGE: &str = "Enter some code to run";

fn diagnostic_entry(d: &Diagnostic) -> LogEntry {
    match (d.line, d.column) {
        (Some(line), Some(column)) => LogEntry::error(format!("TypeScript error ({}:{}): {}", line, column, d.message)),
        _ => LogEntry::error(format!("TypeScript error: {}", d.message)),
    }
}

/// Runs one editor buffer to completion and returns what the output panel
/// should append.
pub fn run_source(source: &str, dialect: Dialect, compiler: &dyn Compiler, limits: &ExecutionLimits) -> Vec<LogEntry> {
    if source.trim().is_empty() {
        return vec![LogEntry::info(EMPTY_SOURCE_MESSAGE)];
    }

    let js = if dialect.is_typed() {
        match transpile::compile(compiler, source) {
            Ok(Ok(js)) => js,
            Ok(Err(diagnostics)) => {
                info!(count = diagnostics.len(), "compile failed");
                return diagnostics.iter().map(diagnostic_entry).collect();
            }
            Err(e) => {
                error!(%e, "compiler service failed");
                return vec![LogEntry::error(format!("TypeScript compilation error: {}", e))];
            }
        }
    } else {
        source.to_string()
    };

    info!(dialect = dialect.name(), bytes = js.len(), "running");
    sandbox::execute(&js, dialect, limits)
}

pub struct RunJob {
    pub source: String,
    pub dialect: Dialect,
    pub limits: ExecutionLimits,
}

/// Handle to the background run worker.
pub struct RunnerHandle {
    job_tx: Sender<RunJob>,
    result_rx: Receiver<Vec<LogEntry>>,
}

impl RunnerHandle {
    pub fn spawn(compiler: Arc<dyn Compiler>) -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<RunJob>();
        let (result_tx, result_rx) = mpsc::channel::<Vec<LogEntry>>();

        thread::Builder::new()
            .name("playground-runner".into())
            .stack_size(ENGINE_STACK_SIZE)
            .spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        run_source(&job.source, job.dialect, compiler.as_ref(), &job.limits)
                    }));
                    let entries = outcome.unwrap_or_else(|payload| {
                        let message = panic_message(payload.as_ref());
                        error!(%message, "run panicked");
                        vec![LogEntry::error(format!("Unexpected error: {}", message))]
                    });
                    if result_tx.send(entries).is_err() {
                        break;
                    }
                }
                debug!("runner worker stopped");
            })?;

        Ok(Self { job_tx, result_rx })
    }

    /// Queues a run. Fails only when the worker is gone.
    pub fn submit(&self, job: RunJob) -> Result<(), LogEntry> {
        self.job_tx
            .send(job)
            .map_err(|_| LogEntry::error("Unexpected error: the run worker has stopped"))
    }

    /// Result of a finished run, if any. A dead worker yields an error
    /// entry so the caller can clear its in-flight state.
    pub fn poll(&self) -> Option<Vec<LogEntry>> {
        match self.result_rx.try_recv() {
            Ok(entries) => Some(entries),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                error!("runner worker disconnected");
                Some(vec![LogEntry::error("Unexpected error: the run worker has stopped")])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Severity;
    use crate::transpile::{CompileOutput, CompilerError, CompilerOptions, TypeStripper};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Compiler for Counting {
        fn transpile(&self, source: &str, _: &CompilerOptions) -> Result<CompileOutput, CompilerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(CompileOutput {
                output_text: source.to_string(),
                diagnostics: vec![],
            })
        }
    }

    struct Broken;

    impl Compiler for Broken {
        fn transpile(&self, _: &str, _: &CompilerOptions) -> Result<CompileOutput, CompilerError> {
            Err(CompilerError::Internal("worker crashed".into()))
        }
    }

    fn limits() -> ExecutionLimits {
        ExecutionLimits::default()
    }

    #[test]
    fn blank_source_never_reaches_the_compiler() {
        let compiler = Counting::default();
        for src in ["", "   \n\t  "] {
            let out = run_source(src, Dialect::TypeScript, &compiler, &limits());
            assert_eq!(out, vec![LogEntry::info(EMPTY_SOURCE_MESSAGE)]);
        }
        assert_eq!(compiler.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn javascript_skips_compilation() {
        let compiler = Counting::default();
        let out = run_source("console.log(1 + 1)", Dialect::JavaScript, &compiler, &limits());
        assert_eq!(out, vec![LogEntry::new(Severity::Log, "2")]);
        assert_eq!(compiler.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn type_errors_block_execution() {
        let out = run_source(
            "const label: string = 42;\nconsole.log('never');",
            Dialect::TypeScript,
            &TypeStripper,
            &limits(),
        );
        assert_eq!(
            out,
            vec![LogEntry::error(
                "TypeScript error (1:7): Type 'number' is not assignable to type 'string'."
            )]
        );
    }

    #[test]
    fn typescript_runs_after_stripping() {
        let out = run_source(
            "interface P { x: number }\nconst p: P = { x: 2 };\nconsole.log(p.x * 21);",
            Dialect::TypeScript,
            &TypeStripper,
            &limits(),
        );
        assert_eq!(out, vec![LogEntry::new(Severity::Log, "42")]);
    }

    #[test]
    fn compiler_failures_are_reported() {
        let out = run_source("let x = 1;", Dialect::TypeScript, &Broken, &limits());
        assert_eq!(
            out,
            vec![LogEntry::error("TypeScript compilation error: compiler service failed: worker crashed")]
        );
    }

    #[test]
    fn worker_round_trip() {
        let runner = RunnerHandle::spawn(Arc::new(TypeStripper)).unwrap();
        runner
            .submit(RunJob {
                source: "console.warn('careful')".into(),
                dialect: Dialect::JavaScript,
                limits: limits(),
            })
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(30);
        let entries = loop {
            if let Some(entries) = runner.poll() {
                break entries;
            }
            assert!(Instant::now() < deadline, "runner never answered");
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(entries, vec![LogEntry::new(Severity::Warn, "careful")]);
    }
}
