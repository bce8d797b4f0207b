//! Per-user sign-in rate limiting.
//!
//! Bounds how often a username can attempt to sign in, both to slow
//! credential guessing and to keep one user from flooding the revocation
//! list. Entries are never evicted; username cardinality is small relative
//! to request volume.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub struct SignInThrottle {
    window: Duration,
    attempts: Mutex<HashMap<String, Instant>>,
}

impl SignInThrottle {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether `username` may attempt a sign-in, recording the attempt
    /// when allowed.
    ///
    /// The check-then-record sequence is one critical section so two
    /// concurrent attempts for the same user cannot both be allowed. A
    /// denied attempt does not update the timestamp, so a burst of denials
    /// never pushes the window forward.
    #[must_use]
    pub fn check_and_record(&self, username: &str) -> bool {
        let now = Instant::now();
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match attempts.entry(username.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                if now.duration_since(*slot.get()) < self.window {
                    false
                } else {
                    slot.insert(now);
                    true
                }
            }
        }
    }
}
