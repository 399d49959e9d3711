// src/dom/wait.rs

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{DomError, WaitKind};
use crate::dom::Locator;

/// Poll `check` every `interval` until it returns `true` or `timeout` elapses.
/// The condition is always evaluated at least once, so a zero timeout is a
/// single probe. Errors from `check` end the wait immediately.
pub fn poll_until<F>(
    locator: &Locator,
    kind: WaitKind,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<(), DomError>
where
    F: FnMut() -> Result<bool, DomError>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check()? {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(DomError::Timeout {
                locator: locator.clone(),
                kind,
                timeout,
            });
        }
        thread::sleep(interval.min(deadline - now));
    }
}
