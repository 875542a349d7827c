//! Bounded fixed-interval polling for asynchronous remote assessments

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// How often and how many times to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between two calls
    pub interval: Duration,
    /// Upper bound on calls, including the first one
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(8), 10)
    }
}

/// Last value observed by [`poll_until`]
#[derive(Debug, Clone, PartialEq)]
pub struct Polled<T> {
    pub value: T,
    pub attempts: u32,
    /// False when the attempt budget ran out first
    pub terminal: bool,
}

/// Calls `fetch` until `is_terminal` accepts its value or the attempt budget
/// is spent. A non-terminal value after the last attempt is returned as-is;
/// only a `fetch` error ends the loop early with an error.
pub async fn poll_until<T, E, F, Fut, P>(
    policy: PollPolicy,
    mut fetch: F,
    is_terminal: P,
) -> Result<Polled<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let value = fetch(attempt).await?;

        if is_terminal(&value) {
            return Ok(Polled {
                value,
                attempts: attempt,
                terminal: true,
            });
        }

        if attempt >= max_attempts {
            debug!("Polling budget of {max_attempts} attempts exhausted");
            return Ok(Polled {
                value,
                attempts: attempt,
                terminal: false,
            });
        }

        debug!("Attempt {attempt} not terminal, waiting {:?}", policy.interval);
        sleep(policy.interval).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_terminal_value() {
        let calls = Cell::new(0u32);
        let start = Instant::now();

        let polled = poll_until(
            PollPolicy::default(),
            |_| {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Ok::<_, ()>(if n < 10 { "PENDING" } else { "READY" }) }
            },
            |status| *status == "READY",
        )
        .await
        .expect("poll");

        assert_eq!(polled.value, "READY");
        assert_eq!(polled.attempts, 10);
        assert!(polled.terminal);
        assert_eq!(calls.get(), 10);
        assert_eq!(start.elapsed(), Duration::from_secs(8 * 9));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_value_when_budget_runs_out() {
        let calls = Cell::new(0u32);

        let polled = poll_until(
            PollPolicy::default(),
            |attempt| {
                calls.set(calls.get() + 1);
                async move { Ok::<_, ()>(format!("PENDING-{attempt}")) }
            },
            |_| false,
        )
        .await
        .expect("poll");

        assert_eq!(polled.value, "PENDING-10");
        assert!(!polled.terminal);
        assert_eq!(calls.get(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_ends_polling() {
        let calls = Cell::new(0u32);

        let result = poll_until(
            PollPolicy::new(Duration::from_secs(1), 5),
            |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt == 2 {
                        Err("unreachable")
                    } else {
                        Ok("PENDING")
                    }
                }
            },
            |_| false,
        )
        .await;

        assert_eq!(result, Err("unreachable"));
        assert_eq!(calls.get(), 2);
    }
}
