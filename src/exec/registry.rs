// src/exec/registry.rs

//! In-process work: registered functions and classes.
//!
//! Executable logic cannot cross a process boundary, so function and class
//! jobs refer to entries of a [`TaskRegistry`] by name. The binary builds
//! the same registry in the scheduling process and in every runner process
//! (see `cronlock::run`), so a key resolved in one resolves in the other.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use thiserror::Error;

/// How a task reports anything other than success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task did not succeed; the value is what it returned instead.
    #[error("{0}")]
    Failed(String),
    /// An expected short-circuit that is not an operator-actionable error.
    /// Logged at INFO, never mailed.
    #[error("{0}")]
    Info(String),
}

impl From<std::io::Error> for TaskError {
    fn from(e: std::io::Error) -> Self {
        TaskError::Failed(e.to_string())
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(e: anyhow::Error) -> Self {
        TaskError::Failed(format!("{e:#}"))
    }
}

pub type TaskResult = std::result::Result<(), TaskError>;

/// A registered function. Everything written to `out` ends up in the job log.
pub type TaskFn = dyn Fn(&mut dyn Write) -> TaskResult + Send + Sync;

/// An instance of a registered class.
pub trait JobClass: Send {
    /// Whether `method` can be called on this instance.
    fn has_method(&self, method: &str) -> bool;

    /// Call `method` with `args`. Only called after `has_method` said yes.
    fn call(&mut self, method: &str, args: &[String], out: &mut dyn Write) -> TaskResult;
}

/// Builds a [`JobClass`] instance from constructor arguments.
pub type ClassFactory = dyn Fn(&[String]) -> anyhow::Result<Box<dyn JobClass>> + Send + Sync;

#[derive(Clone, Default)]
pub struct TaskRegistry {
    functions: HashMap<String, Arc<TaskFn>>,
    classes: HashMap<String, Arc<ClassFactory>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `key`.
    pub fn function<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut dyn Write) -> TaskResult + Send + Sync + 'static,
    {
        self.functions.insert(key.into(), Arc::new(f));
        self
    }

    /// Register a class under `name`.
    pub fn class<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&[String]) -> anyhow::Result<Box<dyn JobClass>> + Send + Sync + 'static,
    {
        self.classes.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn get_function(&self, key: &str) -> Option<Arc<TaskFn>> {
        self.functions.get(key).cloned()
    }

    pub fn get_class(&self, name: &str) -> Option<Arc<ClassFactory>> {
        self.classes.get(name).cloned()
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<_> = self.functions.keys().collect();
        let mut classes: Vec<_> = self.classes.keys().collect();
        functions.sort();
        classes.sort();
        f.debug_struct("TaskRegistry")
            .field("functions", &functions)
            .field("classes", &classes)
            .finish()
    }
}
