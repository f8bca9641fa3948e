//! Reentrancy protection for the sync pipeline.

use std::collections::HashSet;
use std::sync::Mutex;

/// The set of `"{type}:{key}"` entries whose sync is in flight.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    in_flight: Mutex<HashSet<String>>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` if it is already claimed; otherwise the
    /// claim lasts until the returned ticket is dropped.
    pub fn enter(&self, key: impl Into<String>) -> Option<GuardTicket<'_>> {
        let key = key.into().to_lowercase();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight
            .insert(key.clone())
            .then(|| GuardTicket { guard: self, key })
    }

    /// Whether `key` is currently claimed.
    pub fn is_active(&self, key: &str) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.contains(&key.to_lowercase())
    }
}

/// Releases its key when dropped, including on early return or panic.
#[derive(Debug)]
pub struct GuardTicket<'a> {
    guard: &'a ReentrancyGuard,
    key: String,
}

impl Drop for GuardTicket<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.guard.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentry_rejected_while_held() {
        let guard = ReentrancyGuard::new();
        let ticket = guard.enter("character:c-1");
        assert!(ticket.is_some());
        assert!(guard.enter("CHARACTER:c-1").is_none());
        assert!(guard.enter("character:c-2").is_some());

        drop(ticket);
        assert!(!guard.is_active("character:c-1"));
        assert!(guard.enter("character:c-1").is_some());
    }
}
