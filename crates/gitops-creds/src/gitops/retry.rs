//! Bounded retry without backoff.

use std::fmt::Display;
use std::future::Future;

/// Retries an operation a fixed number of times, with no delay between
/// attempts. Only errors accepted by the caller's predicate are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

/// Value produced by a successful run, with the attempt it succeeded on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Why a run ended without a value.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last_error: E },
    /// An attempt failed with an error the predicate rejected.
    Aborted { attempt: u32, error: E },
}

impl RetryPolicy {
    /// A policy allowing `max_attempts` attempts in total (at least one).
    pub const fn fixed(max_attempts: u32) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `operation` until it succeeds, fails with an error for which
    /// `is_retryable` returns false, or the attempt budget is spent.
    /// `operation` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, R>(
        &self,
        mut operation: F,
        is_retryable: R,
    ) -> Result<Retried<T>, RetryError<E>>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => {
                    return Ok(Retried {
                        value,
                        attempts: attempt,
                    })
                }
                Err(e) if is_retryable(&e) => {
                    if attempt >= self.max_attempts {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    log::warn!(
                        "Attempt {}/{} failed, retrying: {}",
                        attempt,
                        self.max_attempts,
                        e
                    );
                }
                Err(e) => return Err(RetryError::Aborted { attempt, error: e }),
            }
        }
    }
}
