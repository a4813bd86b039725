//! Background tasks
//!
//! The AirPrint re-ensure runs as a periodic worker decoupled from the
//! request path: `/api/status` stays a pure query, and advertisement
//! freshness is this task's job. Failures are logged and never fatal.
//!
//! The interval's first tick fires immediately, so the boot-time ensure
//! is just the worker's first pass. Every pass goes through the shared
//! limiter, which keeps concurrent or back-to-back ensures down to one.

use std::time::Duration;

use pal_printer::{cups_available, list_printers, maybe_ensure};
use tokio::task::JoinHandle;

use crate::core::state::ServerState;

/// Worker poll interval; the actual re-ensure window lives in the limiter.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Sorted comma-joined printer names; a change forces a re-ensure.
pub fn printer_signature(names: &mut Vec<String>) -> String {
    names.retain(|n| !n.is_empty());
    names.sort();
    names.join(",")
}

/// One worker pass: skip when disabled or CUPS is down, otherwise hand
/// the current printer-set signature to the limiter.
async fn ensure_pass(state: &ServerState) {
    if !state.config().airprint.auto_enable {
        return;
    }
    if !cups_available().await {
        return;
    }
    let mut names: Vec<String> = list_printers().await.into_iter().map(|p| p.name).collect();
    let signature = printer_signature(&mut names);
    maybe_ensure(state.limiter(), &signature).await;
}

/// Spawn the periodic AirPrint worker.
pub fn spawn_airprint_worker(state: ServerState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            ensure_pass(&state).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pal_printer::EnsureLimiter;

    #[test]
    fn test_printer_signature_sorted_and_joined() {
        let mut names = vec!["Epson".to_string(), "Brother".to_string(), String::new()];
        assert_eq!(printer_signature(&mut names), "Brother,Epson");
        assert_eq!(printer_signature(&mut Vec::new()), "");
    }

    #[tokio::test]
    async fn test_boot_ensure_and_first_tick_share_one_window() {
        let limiter = EnsureLimiter::default();

        let ticket = limiter.begin("Brother").unwrap();
        ticket.commit();

        // A second pass right after boot lands in the same window and
        // must be suppressed rather than ensuring again.
        assert!(limiter.begin("Brother").is_none());
    }
}
