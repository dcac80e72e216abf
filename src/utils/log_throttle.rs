use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    suppressed: u64,
}

static WINDOWS: OnceLock<Mutex<HashMap<&'static str, Window>>> = OnceLock::new();

/// Rate-limits a repetitive log line identified by `key`.
///
/// Returns `Some(suppressed)` when the line should be emitted, carrying how many
/// occurrences were swallowed since the last emission, or `None` to skip it.
pub fn should_emit(key: &'static str, interval: Duration) -> Option<u64> {
    let mut windows = WINDOWS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let now = Instant::now();

    let window = match windows.entry(key) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            entry.insert(Window {
                opened_at: now,
                suppressed: 0,
            });
            return Some(0);
        }
    };

    if now.duration_since(window.opened_at) >= interval {
        let suppressed = window.suppressed;
        window.opened_at = now;
        window.suppressed = 0;
        Some(suppressed)
    } else {
        window.suppressed += 1;
        None
    }
}
