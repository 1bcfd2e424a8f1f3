//! Execution sandbox.
//!
//! A run holds the process-wide run lock, swaps the console channels for
//! capturing sinks, evaluates the program against the [`namespace`] on a
//! dedicated engine thread and turns whatever was captured into log
//! entries. Nothing escapes: script errors and engine panics both come
//! back as a single error entry.

pub mod namespace;

use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::console::{ChannelOverride, Severity};
use crate::dialect::Dialect;
use crate::output::LogEntry;
use crate::script::{on_engine_thread, DiscardedTimer, ExecutionLimits, Interpreter};

pub const NO_OUTPUT_MESSAGE: &str = "Code executed successfully (no output)";

static RUN_LOCK: Mutex<()> = Mutex::new(());

fn error_message(dialect: Dialect, message: &str) -> String {
    format!("{} execution error: {}", dialect.name(), message)
}

fn discarded_message(timers: &[DiscardedTimer], horizon_ms: u64) -> String {
    let names: Vec<String> = timers
        .iter()
        .map(|t| {
            let kind = if t.repeating { "setInterval" } else { "setTimeout" };
            format!("{} #{} (due at {} ms)", kind, t.id, t.due_ms)
        })
        .collect();
    format!(
        "{} timer(s) past the {} ms horizon never ran: {}",
        timers.len(),
        horizon_ms,
        names.join(", ")
    )
}

/// Runs `js` and returns its console output as log entries.
pub fn execute(js: &str, dialect: Dialect, limits: &ExecutionLimits) -> Vec<LogEntry> {
    let _run = RUN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let channels = ChannelOverride::install();

    let src = js.to_string();
    let run_limits = limits.clone();
    let outcome = on_engine_thread(move || {
        let mut interp = Interpreter::new(run_limits);
        namespace::install(&mut interp);
        interp.format_uncaught(move |message| error_message(dialect, message));
        let result = interp.run(&src);
        (result, interp.discarded_timers().to_vec())
    });

    let records = channels.records();
    drop(channels);
    debug!(records = records.len(), "console channels restored");

    let (failure, discarded) = match outcome {
        Ok((Ok(()), discarded)) => (None, discarded),
        Ok((Err(e), discarded)) => (Some(e.to_string()), discarded),
        Err(panic) => {
            warn!(%panic, "engine thread panicked");
            (Some(panic), Vec::new())
        }
    };

    if records.is_empty() && failure.is_none() && discarded.is_empty() {
        return vec![LogEntry::info(NO_OUTPUT_MESSAGE)];
    }
    let mut entries: Vec<LogEntry> = records.into_iter().map(LogEntry::from).collect();
    if !discarded.is_empty() {
        entries.push(LogEntry::new(
            Severity::Warn,
            discarded_message(&discarded, limits.timer_horizon_ms),
        ));
    }
    if let Some(message) = failure {
        info!(dialect = dialect.name(), %message, "run failed");
        entries.push(LogEntry::error(error_message(dialect, &message)));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{capture, emit};

    fn run(src: &str) -> Vec<LogEntry> {
        execute(src, Dialect::JavaScript, &ExecutionLimits::default())
    }

    #[test]
    fn logs_arrive_in_order_with_severity() {
        let entries = run("console.log(\"a\"); console.log(\"b\")");
        assert_eq!(
            entries,
            vec![LogEntry::new(Severity::Log, "a"), LogEntry::new(Severity::Log, "b")]
        );
    }

    #[test]
    fn silent_program_reports_no_output() {
        assert_eq!(run("const x = 1 + 1;"), vec![LogEntry::info(NO_OUTPUT_MESSAGE)]);
    }

    #[test]
    fn failures_become_one_prefixed_error_entry() {
        let entries = run("console.warn('before'); throw new TypeError('bad thing');");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], LogEntry::new(Severity::Warn, "before"));
        assert_eq!(
            entries[1],
            LogEntry::error("JavaScript execution error: TypeError: bad thing")
        );

        let entries = execute("undefinedThing()", Dialect::TypeScript, &ExecutionLimits::default());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.starts_with("TypeScript execution error: ReferenceError"));
    }

    #[test]
    fn rejected_async_work_is_reported() {
        let entries = run("async function go() { await null; throw new Error('late'); }\nawait go();");
        assert_eq!(entries, vec![LogEntry::error("JavaScript execution error: Error: late")]);
    }

    #[test]
    fn timers_and_multiple_arguments_are_captured() {
        let entries = run("setTimeout(() => console.info('later', { n: 1 }), 50); console.error('now');");
        assert_eq!(entries[0], LogEntry::error("now"));
        assert_eq!(entries[1], LogEntry::new(Severity::Info, "later {\n  \"n\": 1\n}"));
    }

    #[test]
    fn async_failures_carry_the_dialect_prefix() {
        let entries = run("Promise.reject(new Error('boom'));");
        assert_eq!(
            entries,
            vec![LogEntry::error("JavaScript execution error: Uncaught (in promise) Error: boom")]
        );

        let entries = execute(
            "setTimeout(() => { throw new TypeError('tick'); }, 5); console.log('first');",
            Dialect::TypeScript,
            &ExecutionLimits::default(),
        );
        assert_eq!(
            entries,
            vec![
                LogEntry::new(Severity::Log, "first"),
                LogEntry::error("TypeScript execution error: Uncaught TypeError: tick"),
            ]
        );
    }

    #[test]
    fn timers_past_the_horizon_are_reported() {
        let entries = run(
            "async function f() { await new Promise(r => setTimeout(r, 20000)); console.log('late'); }\n\
             f();\n\
             console.log('early');",
        );
        assert_eq!(
            entries,
            vec![
                LogEntry::new(Severity::Log, "early"),
                LogEntry::new(
                    Severity::Warn,
                    "1 timer(s) past the 10000 ms horizon never ran: setTimeout #1 (due at 20000 ms)"
                ),
            ]
        );

        let entries = run("setInterval(() => {}, 4000);");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, Severity::Warn);
        assert!(entries[0].message.contains("setInterval #1 (due at 12000 ms)"));
    }

    #[test]
    fn channels_are_restored_after_a_run() {
        run("console.log('inside');");
        let ((), records) = capture(|| emit(Severity::Log, "outside"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "outside");

        let entries = run("throw 1;");
        assert_eq!(entries.len(), 1);
        let ((), records) = capture(|| emit(Severity::Warn, "still fine"));
        assert_eq!(records[0].severity, Severity::Warn);
    }

    #[test]
    fn ambient_names_are_not_reachable() {
        let entries = run("console.log(typeof window, typeof process, typeof globalThis);");
        assert_eq!(entries, vec![LogEntry::new(Severity::Log, "undefined undefined undefined")]);
    }
}
