//! Asynchronous deep-idle requests.
//!
//! An external event source (or any caller) asks for deep idle with
//! [`IdleController::request_idle`]; the asynchronous driver blocks in
//! [`IdleController::wait_for_request`] until such a request arrives. The gate
//! holds at most one pending request: a second request before the first is
//! consumed replaces its delay instead of queueing behind it.

use core::time::Duration;
use std::time::Instant;

use log::{debug, info};

use crate::context::PmContext;
use crate::error::{PmError, PmResult};
use crate::sync::{Arc, Condvar, Mutex};

/// How long a waiter is willing to block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Forever,
    After(Duration),
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

/// Single-slot idle request gate plus the deep-idle flag it guards.
pub struct IdleController {
    ctx: Arc<PmContext>,
    pending: Mutex<Option<Duration>>,
    ready: Condvar,
}

impl IdleController {
    pub fn new(ctx: Arc<PmContext>) -> Self {
        Self {
            ctx,
            pending: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Requests entry into deep idle after `delay`.
    ///
    /// Never blocks beyond the hand-off itself. Returns `true` when the
    /// request was merged into one that was already pending.
    pub fn request_idle(&self, delay: Duration) -> bool {
        let mut pending = self.pending.lock();
        let merged = pending.replace(delay).is_some();
        self.ready.notify_one();
        drop(pending);

        if merged {
            debug!("Idle request coalesced, delay now {delay:?}");
        }
        merged
    }

    /// Blocks until a request is available and consumes it.
    ///
    /// A request submitted before the call is returned immediately.
    pub fn wait_for_request(&self, timeout: Timeout) -> PmResult<Duration> {
        let deadline = match timeout {
            Timeout::Forever => None,
            Timeout::After(limit) => Some((Instant::now() + limit, limit)),
        };

        let mut pending = self.pending.lock();
        loop {
            if let Some(delay) = pending.take() {
                return Ok(delay);
            }
            match deadline {
                None => self.ready.wait(&mut pending),
                Some((at, limit)) => {
                    if self.ready.wait_until(&mut pending, at).timed_out() {
                        return pending.take().ok_or(PmError::IdleTimeout(limit));
                    }
                }
            }
        }
    }

    /// Whether a request is waiting to be consumed.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Marks the start of a deep-idle bout.
    pub(crate) fn enter_idle(&self) {
        self.ctx.set_deep_idle(true);
    }

    /// Ends the current deep-idle bout, if one is in progress.
    ///
    /// Safe to call from the external event path. Returns whether a bout was
    /// actually in progress.
    pub fn exit_idle(&self) -> bool {
        let was_idle = self.ctx.take_deep_idle();
        if was_idle {
            info!("Deep idle exit requested");
        }
        was_idle
    }

    pub fn is_idle(&self) -> bool {
        self.ctx.is_deep_idle()
    }

    pub fn context(&self) -> &Arc<PmContext> {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn controller() -> Arc<IdleController> {
        Arc::new(IdleController::new(Arc::new(PmContext::new())))
    }

    #[test]
    fn request_before_wait_is_not_lost() {
        let idle = controller();
        assert!(!idle.request_idle(Duration::from_millis(100)));
        assert!(idle.is_pending());

        let delay = idle
            .wait_for_request(Timeout::After(Duration::from_millis(10)))
            .expect("pending request");
        assert_eq!(delay, Duration::from_millis(100));
        assert!(!idle.is_pending());
    }

    #[test]
    fn second_request_is_coalesced() {
        let idle = controller();
        idle.request_idle(Duration::from_millis(10));
        assert!(idle.request_idle(Duration::from_millis(20)));

        let delay = idle
            .wait_for_request(Timeout::Forever)
            .expect("one request delivered");
        assert_eq!(delay, Duration::from_millis(20));

        assert!(matches!(
            idle.wait_for_request(Timeout::After(Duration::from_millis(20))),
            Err(PmError::IdleTimeout(_))
        ));
    }

    #[test]
    fn waiter_wakes_on_request_from_other_thread() {
        let idle = controller();
        let producer = Arc::clone(&idle);

        let waiter = thread::spawn(move || idle.wait_for_request(Timeout::Forever));
        thread::sleep(Duration::from_millis(20));
        producer.request_idle(Duration::from_millis(7));

        let delay = waiter.join().expect("waiter thread").expect("request");
        assert_eq!(delay, Duration::from_millis(7));
    }

    #[test]
    fn gate_rearms_after_each_consumption() {
        let idle = controller();
        for ms in [1u64, 2, 3] {
            idle.request_idle(Duration::from_millis(ms));
            let delay = idle.wait_for_request(Timeout::Forever).expect("request");
            assert_eq!(delay, Duration::from_millis(ms));
        }
        assert!(!idle.is_pending());
    }

    #[test]
    fn exit_idle_clears_flag_once() {
        let idle = controller();
        idle.enter_idle();
        assert!(idle.is_idle());
        assert!(idle.exit_idle());
        assert!(!idle.is_idle());
        assert!(!idle.exit_idle());
    }
}
