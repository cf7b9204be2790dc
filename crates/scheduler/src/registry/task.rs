//! Work bound to a registry entry

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Which pool runs an entry's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Tokio task. For I/O-bound work such as model calls.
    Cooperative,
    /// Blocking thread, bounded by the registry's worker count.
    Blocking,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cooperative => f.write_str("cooperative"),
            Self::Blocking => f.write_str("blocking"),
        }
    }
}

pub(crate) type AsyncWork = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
pub(crate) type BlockingWork = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Work {
    Cooperative(AsyncWork),
    Blocking(BlockingWork),
}

/// A named callback the registry can fire any number of times.
///
/// # Example
///
/// ```
/// use inventio_scheduler::Task;
///
/// let task = Task::cooperative("generate", || async {
///     // call the model, write the result
/// });
/// assert_eq!(task.name(), "generate");
/// ```
#[derive(Clone)]
pub struct Task {
    name: String,
    pub(crate) work: Work,
}

impl Task {
    pub fn cooperative<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let work: AsyncWork = Arc::new(move || Box::pin(f()));
        Self {
            name: name.into(),
            work: Work::Cooperative(work),
        }
    }

    pub fn blocking<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            work: Work::Blocking(Arc::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self) -> ExecutorKind {
        match self.work {
            Work::Cooperative(_) => ExecutorKind::Cooperative,
            Work::Blocking(_) => ExecutorKind::Blocking,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("executor", &self.executor())
            .finish()
    }
}
