//! Replay guard for OIDC authorization codes.
//!
//! A code is reserved with a single insert-if-absent before it is sent to the
//! identity provider, so two concurrent callbacks carrying the same code can
//! never both reach the token endpoint. The reservation is committed once the
//! provider accepted the code; if it is dropped uncommitted (rejected
//! exchange, network failure, cancelled request) the code is released and may
//! be retried.
//!
//! Entries are never evicted: the set grows for the lifetime of the process.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeState {
    InFlight,
    Used,
}

/// Process-wide set of authorization codes already exchanged (or being exchanged).
#[derive(Debug, Default)]
pub struct CodeReplayGuard {
    codes: DashMap<String, CodeState>,
}

impl CodeReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `code` for an exchange.
    ///
    /// Returns `None` if the code was already used or another exchange for it
    /// is in flight.
    pub fn try_reserve(&self, code: &str) -> Option<CodeReservation<'_>> {
        match self.codes.entry(code.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(CodeState::InFlight);
                Some(CodeReservation {
                    guard: self,
                    code: code.to_string(),
                    committed: false,
                })
            }
        }
    }

    /// True once an exchange for `code` has been accepted by the provider.
    pub fn is_used(&self, code: &str) -> bool {
        self.codes
            .get(code)
            .is_some_and(|state| *state == CodeState::Used)
    }

    /// Number of codes tracked (used or in flight)
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Exclusive claim on an authorization code, released on drop unless committed.
#[derive(Debug)]
pub struct CodeReservation<'a> {
    guard: &'a CodeReplayGuard,
    code: String,
    committed: bool,
}

impl CodeReservation<'_> {
    /// Mark the code as permanently used.
    pub fn commit(mut self) {
        self.guard.codes.insert(self.code.clone(), CodeState::Used);
        self.committed = true;
    }
}

impl Drop for CodeReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.guard
                .codes
                .remove_if(&self.code, |_, state| *state == CodeState::InFlight);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_committed_code_cannot_be_reserved_again() {
        let guard = CodeReplayGuard::new();
        guard.try_reserve("abc123").unwrap().commit();

        assert!(guard.is_used("abc123"));
        assert!(guard.try_reserve("abc123").is_none());
    }

    #[test]
    fn test_dropped_reservation_releases_code() {
        let guard = CodeReplayGuard::new();
        {
            let _reservation = guard.try_reserve("abc123").unwrap();
            assert!(!guard.is_used("abc123"));
        }
        assert!(guard.is_empty());
        assert!(guard.try_reserve("abc123").is_some());
    }

    #[test]
    fn test_in_flight_code_blocks_duplicate() {
        let guard = CodeReplayGuard::new();
        let first = guard.try_reserve("abc123").unwrap();
        assert!(guard.try_reserve("abc123").is_none());
        first.commit();
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_distinct_codes_are_independent() {
        let guard = CodeReplayGuard::new();
        guard.try_reserve("one").unwrap().commit();
        assert!(guard.try_reserve("two").is_some());
    }

    #[test]
    fn test_concurrent_reservations_admit_exactly_one() {
        let guard = Arc::new(CodeReplayGuard::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || match guard.try_reserve("shared") {
                    Some(reservation) => {
                        reservation.commit();
                        true
                    }
                    None => false,
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(guard.is_used("shared"));
    }
}
