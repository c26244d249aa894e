//! Button events feeding the idle controller.
//!
//! The button driver itself (pin configuration, interrupt, debounce) lives on
//! the platform side. It reports one stable level per change through a
//! [`LevelChangeHandler`].

use core::time::Duration;

use log::{debug, info};

use crate::error::PmResult;
use crate::idle::IdleController;
use crate::sync::Arc;

/// Receiver of debounced level changes.
pub trait LevelChangeHandler: Send + Sync {
    fn on_level_change(&self, level: i32);
}

/// A debounced event source that can be bound to a handler.
pub trait ButtonSource: Send + Sync {
    /// Binds the source to `handler`, replacing any previous one.
    ///
    /// Fails when the underlying device cannot be bound; the caller logs the
    /// error and runs without the event path.
    fn configure(&self, handler: Arc<dyn LevelChangeHandler>) -> PmResult<()>;
}

/// Turns button presses into idle requests and releases into idle exits.
///
/// Level 0 is a press. Any other level ends the current deep-idle bout.
pub struct IdleButtonHandler {
    idle: Arc<IdleController>,
    delay: Duration,
    press_requests_idle: bool,
}

impl IdleButtonHandler {
    pub fn new(idle: Arc<IdleController>, delay: Duration) -> Self {
        Self {
            idle,
            delay,
            press_requests_idle: true,
        }
    }

    /// Whether a press submits an idle request.
    pub fn with_press_requests_idle(mut self, enabled: bool) -> Self {
        self.press_requests_idle = enabled;
        self
    }
}

impl LevelChangeHandler for IdleButtonHandler {
    fn on_level_change(&self, level: i32) {
        if level == 0 {
            if self.press_requests_idle {
                info!("Button press, requesting deep idle");
                self.idle.request_idle(self.delay);
            } else {
                debug!("Button press ignored");
            }
        } else {
            self.idle.exit_idle();
        }
    }
}
