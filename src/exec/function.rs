// src/exec/function.rs

//! Function strategy, plus the output capture shared with the class strategy.

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use crate::exec::registry::{TaskError, TaskRegistry, TaskResult};
use crate::exec::{ExecutionResult, ExecutionStatus};
use crate::joblog::JobLog;

/// Call the function registered under `key` inline.
///
/// Output is buffered and appended to the log verbatim. A panic does not
/// abort the run: it is turned into an `Error! ...` line in the output and
/// the run fails because the function never reported success.
pub fn run_function(key: &str, registry: &TaskRegistry, log: &JobLog) -> ExecutionResult {
    let Some(function) = registry.get_function(key) else {
        return ExecutionResult::failure(format!("Function '{key}' is not registered"));
    };

    let (output, returned) = call_captured(|out| (*function)(out));
    log.append(&output);

    let text = String::from_utf8_lossy(&output).into_owned();
    match returned {
        Ok(()) => ExecutionResult::success(text),
        Err(TaskError::Info(message)) => ExecutionResult::informational(message, text),
        Err(TaskError::Failed(value)) => ExecutionResult {
            status: ExecutionStatus::Failure(format!(
                "Function did not return success! Returned:\n{value}"
            )),
            output: text,
        },
    }
}

/// Run `f` with an output buffer, catching panics.
///
/// A panic is reported as `Failed` and its message is appended to the
/// buffer as `Error! <message>`.
pub(crate) fn call_captured<F>(f: F) -> (Vec<u8>, TaskResult)
where
    F: FnOnce(&mut dyn Write) -> TaskResult,
{
    let mut buffer: Vec<u8> = Vec::new();
    let returned = panic::catch_unwind(AssertUnwindSafe(|| f(&mut buffer)));

    match returned {
        Ok(result) => (buffer, result),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            buffer.extend_from_slice(format!("Error! {message}\n").as_bytes());
            (buffer, Err(TaskError::Failed(format!("panic: {message}"))))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
