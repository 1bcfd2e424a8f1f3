//! Embedded JavaScript engine used by the execution sandbox.
//!
//! Source text is parsed by swc in [`frontend`] and lowered by [`lower`]
//! into the [`ast`], which the [`interpreter`] walks directly. Globals are never implicit: a program
//! only sees what the embedder passes to [`Interpreter::expose`].

pub mod ast;
pub mod builtins;
pub mod error;
pub mod format;
pub mod frontend;
pub mod interpreter;
pub mod lower;
pub mod ops;
pub mod scope;
pub mod value;

use serde::Deserialize;

pub use error::ScriptError;
pub use interpreter::{DiscardedTimer, Interpreter};

/// Native stack reserved for engine threads. Script recursion maps onto
/// native recursion, so the default thread stack is not enough for the
/// configured call depth.
pub const ENGINE_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Resource bounds for a single run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Statements, loop iterations and calls before the run is halted.
    pub max_steps: u64,
    pub max_call_depth: usize,
    /// Virtual milliseconds; timers due later are dropped.
    pub timer_horizon_ms: u64,
    /// Longest array a script may create or grow.
    pub max_array_length: usize,
    /// Longest string, in bytes, that padding and repetition may build.
    pub max_string_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: 5_000_000,
            max_call_depth: 200,
            timer_horizon_ms: 10_000,
            max_array_length: 1 << 24,
            max_string_bytes: 1 << 26,
        }
    }
}

/// Runs `f` on a fresh thread with [`ENGINE_STACK_SIZE`] of stack and
/// waits for it. A panic on that thread comes back as its message.
pub fn on_engine_thread<R, F>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name("script-engine".into())
        .stack_size(ENGINE_STACK_SIZE)
        .spawn(f)
        .map_err(|e| format!("failed to start engine thread: {}", e))?;
    handle.join().map_err(|payload| panic_message(payload.as_ref()))
}

pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
