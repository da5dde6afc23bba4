//! Caller-owned one-time setup.
//!
//! `InitCell` tracks `Uninitialized → Initializing → Ready | Failed` for a
//! value that is expensive to build (a pipeline with its HTTP clients). The
//! lock is never held across the initializer, so status reads stay cheap.
//! An initializer dropped before it finishes leaves the cell `Failed`.

use std::future::Future;
use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug)]
pub enum InitState<T> {
    Uninitialized,
    Initializing,
    Ready(Arc<T>),
    Failed(String),
}

impl<T> InitState<T> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("Initialization already in progress")]
    InProgress,

    #[error("Initialization failed: {0}")]
    Failed(String),
}

pub struct InitCell<T> {
    state: Mutex<InitState<T>>,
}

impl<T> Default for InitCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InitCell<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InitState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> &'static str {
        self.lock().label()
    }

    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.lock() {
            InitState::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Return the ready value, or run `init` once. A failed attempt may be
    /// retried by calling again.
    pub async fn get_or_init<F, Fut, E>(&self, init: F) -> Result<Arc<T>, InitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        {
            let mut state = self.lock();
            match &*state {
                InitState::Ready(value) => return Ok(Arc::clone(value)),
                InitState::Initializing => return Err(InitError::InProgress),
                InitState::Uninitialized | InitState::Failed(_) => {
                    *state = InitState::Initializing;
                }
            }
        }

        tracing::debug!("Initializing");
        let mut guard = CancelGuard {
            cell: self,
            armed: true,
        };
        let outcome = init().await;
        guard.armed = false;

        match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                *self.lock() = InitState::Ready(Arc::clone(&value));
                tracing::info!("Initialization complete");
                Ok(value)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "Initialization failed");
                *self.lock() = InitState::Failed(message.clone());
                Err(InitError::Failed(message))
            }
        }
    }

    /// Drop any ready value or failure.
    pub fn reset(&self) {
        *self.lock() = InitState::Uninitialized;
    }
}

/// Marks the cell failed if `get_or_init` is dropped mid-initialization.
struct CancelGuard<'a, T> {
    cell: &'a InitCell<T>,
    armed: bool,
}

impl<T> Drop for CancelGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("Initialization cancelled");
            *self.cell.lock() = InitState::Failed("cancelled".to_string());
        }
    }
}
