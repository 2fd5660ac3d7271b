use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use super::{ActionError, DeathAction};
use crate::utils::logger::{log_action_failed, log_action_finished};

/// Outcome of one [`ActionRegistry::run_all`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ran: usize,
    pub failed: usize,
}

/// Death actions in registration order. Filled during startup, then only read.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Box<dyn DeathAction>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: impl DeathAction + 'static) {
        self.actions.push(Box::new(action));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Runs every action one after another on the calling task.
    ///
    /// An error or panic in one action is logged and the next action still
    /// runs.
    pub async fn run_all(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        for action in &self.actions {
            let outcome = AssertUnwindSafe(async { action.run().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ActionError::Panicked(panic_message(panic))));

            summary.ran += 1;
            match outcome {
                Ok(()) => log_action_finished(action.name()),
                Err(e) => {
                    summary.failed += 1;
                    log_action_failed(action.name(), &e);
                }
            }
        }

        summary
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
