// src/exec/class.rs

//! Class-method strategy.
//!
//! Resolution (class lookup, construction, method check) happens first and
//! any miss fails the run before a worker exists. The method itself then
//! runs on its own blocking worker.

use tracing::debug;

use crate::exec::function::call_captured;
use crate::exec::registry::{TaskError, TaskRegistry};
use crate::exec::{ExecutionResult, ExecutionStatus};
use crate::joblog::JobLog;

pub async fn run_class_method(
    class: &str,
    args: &[String],
    method: &str,
    method_args: &[String],
    registry: &TaskRegistry,
    log: &JobLog,
) -> ExecutionResult {
    let Some(factory) = registry.get_class(class) else {
        return ExecutionResult::failure(format!("Class {class} not found"));
    };

    let mut instance = match (*factory)(args) {
        Ok(instance) => instance,
        Err(e) => return ExecutionResult::failure(format!("Constructing {class} failed: {e:#}")),
    };

    if !instance.has_method(method) {
        return ExecutionResult::failure(format!("Method {class}::{method}() not found"));
    }

    debug!(class, method, "invoking class method on worker");

    let method_name = method.to_string();
    let call_args = method_args.to_vec();
    let worker = tokio::task::spawn_blocking(move || {
        call_captured(|out| instance.call(&method_name, &call_args, out))
    });

    let (output, returned) = match worker.await {
        Ok(done) => done,
        Err(e) => return ExecutionResult::failure(format!("{class}::{method}() worker failed: {e}")),
    };
    log.append(&output);

    let text = String::from_utf8_lossy(&output).into_owned();
    match returned {
        Ok(()) => ExecutionResult::success(text),
        Err(TaskError::Info(message)) => ExecutionResult::informational(message, text),
        Err(TaskError::Failed(value)) => ExecutionResult {
            status: ExecutionStatus::Failure(format!("{class}::{method}() failed: {value}")),
            output: text,
        },
    }
}
