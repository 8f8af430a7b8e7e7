//! Debounced search submission.
//!
//! Every call to [`Debouncer::queue_submit`] takes a fresh ticket. Non-Enter keys start a
//! timer; when it elapses the action runs only if the ticket is still the latest one, so a
//! burst of keystrokes produces a single submission timed from the last key. Enter skips
//! the timer and supersedes anything pending.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// Quiet period after the last keystroke before a search is submitted.
pub const DEFAULT_DEBOUNCE_MS: u64 = 600;

/// Monotonically increasing submission ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionToken(pub u64);

/// The key that triggered a submission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other(String),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        if name == "Enter" {
            Key::Enter
        } else {
            Key::Other(name.to_string())
        }
    }
}

type SubmitFn = Arc<dyn Fn() + Send + Sync>;

/// Coalesces keystroke-driven submissions into one delayed action.
///
/// Timers are spawned on the ambient Tokio runtime, so every method that can schedule work
/// must be called from within one.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    ticket: Arc<AtomicU64>,
    on_submit: SubmitFn,
}

impl Debouncer {
    pub fn new(delay: Duration, on_submit: impl Fn() + Send + Sync + 'static) -> Self {
        Self { delay, ticket: Arc::new(AtomicU64::new(0)), on_submit: Arc::new(on_submit) }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Latest ticket handed out.
    pub fn latest(&self) -> SubmissionToken {
        SubmissionToken(self.ticket.load(Ordering::SeqCst))
    }

    /// Enter submits now; any other key (re)starts the quiet-period timer.
    pub fn queue_submit(&self, key: &Key) -> SubmissionToken {
        let token = self.next_ticket();
        if *key == Key::Enter {
            debug!(ticket = token.0, "Enter pressed, submitting immediately");
            self.fire();
            return token;
        }

        let ticket = Arc::clone(&self.ticket);
        let on_submit = Arc::clone(&self.on_submit);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if ticket.load(Ordering::SeqCst) == token.0 {
                debug!(ticket = token.0, "Debounce elapsed, submitting");
                on_submit();
            }
        });
        token
    }

    /// Submit on the next scheduler turn, superseding any pending timer.
    pub fn submit(&self) -> SubmissionToken {
        let token = self.next_ticket();
        self.fire();
        token
    }

    /// Drop any pending timer without submitting.
    pub fn cancel(&self) {
        self.next_ticket();
    }

    fn next_ticket(&self) -> SubmissionToken {
        SubmissionToken(self.ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn fire(&self) {
        let on_submit = Arc::clone(&self.on_submit);
        tokio::spawn(async move {
            on_submit();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn counting(delay_ms: u64) -> (Debouncer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let debouncer = Debouncer::new(Duration::from_millis(delay_ms), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (debouncer, count)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_produces_one_submission_after_last_key() {
        let (debouncer, count) = counting(DEFAULT_DEBOUNCE_MS);
        for key in ["l", "i", "n", "u", "x"] {
            debouncer.queue_submit(&Key::from(key));
            sleep(Duration::from_millis(100)).await;
        }
        // 100ms already elapsed since the last key
        sleep(Duration::from_millis(450)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn enter_submits_immediately() {
        let (debouncer, count) = counting(DEFAULT_DEBOUNCE_MS);
        debouncer.queue_submit(&Key::Enter);
        sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn enter_supersedes_pending_timer() {
        let (debouncer, count) = counting(DEFAULT_DEBOUNCE_MS);
        debouncer.queue_submit(&Key::from("a"));
        sleep(Duration::from_millis(200)).await;
        debouncer.queue_submit(&Key::Enter);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_keystrokes_each_submit() {
        let (debouncer, count) = counting(DEFAULT_DEBOUNCE_MS);
        debouncer.queue_submit(&Key::from("a"));
        sleep(Duration::from_millis(700)).await;
        debouncer.queue_submit(&Key::from("b"));
        sleep(Duration::from_millis(700)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_timer() {
        let (debouncer, count) = counting(DEFAULT_DEBOUNCE_MS);
        debouncer.queue_submit(&Key::from("a"));
        debouncer.cancel();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tickets_strictly_increase() {
        let (debouncer, _count) = counting(10);
        let a = debouncer.queue_submit(&Key::from("a"));
        let b = debouncer.queue_submit(&Key::Enter);
        let c = debouncer.submit();
        assert!(a < b && b < c);
        assert_eq!(debouncer.latest(), c);
    }
}
