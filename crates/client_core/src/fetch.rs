//! Concurrent fan-out/fan-in of independent named fetches.
//!
//! Every operation in a [`FetchBatch`] is polled concurrently and the batch
//! resolves once all of them have settled. A failed operation only degrades its
//! own slot; the batch itself never fails.

use std::{any::Any, fmt, future::Future, panic::AssertUnwindSafe};

use futures::{
    future::{join_all, BoxFuture},
    FutureExt,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch '{name}' failed: {reason}")]
pub struct FetchFailure {
    pub name: String,
    pub reason: String,
}

pub type FetchOutcome<T> = Result<T, FetchFailure>;

type PendingFetch<'a, T> = BoxFuture<'a, Result<T, String>>;

pub struct FetchBatch<'a, T> {
    operations: Vec<(String, PendingFetch<'a, T>)>,
}

impl<'a, T: Send + 'a> Default for FetchBatch<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Send + 'a> FetchBatch<'a, T> {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Registers `operation` under `name`. A second registration under the same
    /// name replaces the first.
    pub fn with<F, Fut, E>(mut self, name: impl Into<String>, operation: F) -> Self
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
        E: fmt::Display,
    {
        let name = name.into();
        let pending = operation()
            .map(|outcome| outcome.map_err(|err| format!("{err:#}")))
            .boxed();

        if let Some(slot) = self.operations.iter_mut().find(|(existing, _)| *existing == name) {
            debug!("fetch: replacing operation name={name}");
            slot.1 = pending;
        } else {
            self.operations.push((name, pending));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Runs every operation concurrently and waits for all of them to settle.
    pub async fn run(self) -> FetchBatchResult<T> {
        let started = Instant::now();
        let (names, pending): (Vec<_>, Vec<_>) = self.operations.into_iter().unzip();

        let settled = join_all(
            pending
                .into_iter()
                .map(|fut| AssertUnwindSafe(fut).catch_unwind()),
        )
        .await;

        let slots: Vec<_> = names
            .into_iter()
            .zip(settled)
            .map(|(name, settled)| {
                let outcome = match settled {
                    Ok(Ok(payload)) => Ok(payload),
                    Ok(Err(reason)) => Err(reason),
                    Err(panic) => Err(panic_reason(panic)),
                };
                let outcome = outcome.map_err(|reason| {
                    warn!("fetch: slot failed name={name} reason={reason}");
                    FetchFailure {
                        name: name.clone(),
                        reason,
                    }
                });
                (name, outcome)
            })
            .collect();

        debug!(
            "fetch: batch settled slots={} failed={} elapsed_ms={}",
            slots.len(),
            slots.iter().filter(|(_, outcome)| outcome.is_err()).count(),
            started.elapsed().as_millis()
        );

        FetchBatchResult { slots }
    }
}

fn panic_reason(panic: Box<dyn Any + Send>) -> String {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("fetch operation panicked: {message}")
}

/// Per-name outcomes of a settled [`FetchBatch`], in registration order.
#[derive(Debug)]
pub struct FetchBatchResult<T> {
    slots: Vec<(String, FetchOutcome<T>)>,
}

impl<T> FetchBatchResult<T> {
    pub fn get(&self, name: &str) -> Option<&FetchOutcome<T>> {
        self.slots
            .iter()
            .find(|(slot, _)| slot == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn is_success(&self, name: &str) -> bool {
        matches!(self.get(name), Some(Ok(_)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(name, _)| name.as_str())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FetchFailure> {
        self.slots.iter().filter_map(|(_, outcome)| outcome.as_ref().err())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Removes and returns the outcome for `name`.
    pub fn take(&mut self, name: &str) -> Option<FetchOutcome<T>> {
        let pos = self.slots.iter().position(|(slot, _)| slot == name)?;
        Some(self.slots.remove(pos).1)
    }

    /// Removes the slot, falling back to `default` when it failed or is unknown.
    pub fn take_or(&mut self, name: &str, default: T) -> T {
        match self.take(name) {
            Some(Ok(payload)) => payload,
            _ => default,
        }
    }

    pub fn take_or_default(&mut self, name: &str) -> T
    where
        T: Default,
    {
        self.take_or(name, T::default())
    }

    /// Removes the slot and projects its payload, `None` when the slot failed,
    /// is unknown, or `project` rejects it.
    pub fn take_with<U>(&mut self, name: &str, project: impl FnOnce(T) -> Option<U>) -> Option<U> {
        match self.take(name) {
            Some(Ok(payload)) => project(payload),
            _ => None,
        }
    }
}

impl<T> IntoIterator for FetchBatchResult<T> {
    type Item = (String, FetchOutcome<T>);
    type IntoIter = std::vec::IntoIter<(String, FetchOutcome<T>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

#[cfg(test)]
#[path = "tests/fetch_tests.rs"]
mod tests;
