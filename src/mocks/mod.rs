//! In-memory stand-ins for the gateway and the transfer tool.
//!
//! Both sides share a `Journal` so tests can assert on the order of remote calls across source,
//! target and transfer.

mod github;
mod transfer;

pub use github::FakeProvider;
pub use transfer::FakeTransfer;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::GatewayError;

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .position(|entry| entry.starts_with(prefix))
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }
}

#[derive(Clone, Copy, Debug)]
enum Failure {
    /// Fail the next `n` calls.
    Times(u32),
    /// Succeed `n` more calls, then fail forever.
    After(u32),
    Always,
}

/// Call counters plus injected failures, keyed by operation name.
#[derive(Default)]
struct Faults {
    calls: HashMap<String, usize>,
    failures: HashMap<String, Failure>,
}

impl Faults {
    fn enter(&mut self, operation: &str) -> Result<(), GatewayError> {
        *self.calls.entry(operation.to_string()).or_default() += 1;

        let fail = match self.failures.get_mut(operation) {
            None => false,
            Some(Failure::Always) => true,
            Some(Failure::Times(n)) => {
                if *n == 0 {
                    false
                } else {
                    *n -= 1;
                    true
                }
            }
            Some(Failure::After(n)) => {
                if *n == 0 {
                    true
                } else {
                    *n -= 1;
                    false
                }
            }
        };

        if fail {
            Err(GatewayError::Status {
                status: 500,
                message: format!("injected failure in {}", operation),
            })
        } else {
            Ok(())
        }
    }

    fn calls(&self, operation: &str) -> usize {
        self.calls.get(operation).copied().unwrap_or(0)
    }
}
