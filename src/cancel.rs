use crossbeam::channel::{self, Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct Inner {
    cancelled: AtomicBool,
    // Never sent on. Dropping it disconnects `done`, which wakes every
    // `select!` waiting on the token.
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
}

/// One-shot cancellation signal shared by a device and its pumps.
///
/// Moves once from active to cancelled and never resets.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (trigger, done) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                done,
            }),
        }
    }

    /// Cancel the token. Returns `true` only for the call that performed the transition.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        let trigger = match self.inner.trigger.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(trigger);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// A receiver that becomes ready (disconnected) once the token is cancelled.
    ///
    /// Use it as one arm of `crossbeam::channel::select!`.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// Block until the token is cancelled.
    pub fn wait(&self) {
        let _ = self.inner.done.recv();
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_once() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn done_wakes_waiters() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = std::thread::spawn(move || waiter.wait());
        assert!(token
            .done()
            .recv_timeout(Duration::from_millis(50))
            .is_err());
        token.cancel();
        handle.join().unwrap();
        assert!(token.done().try_recv().is_err());
    }
}
