//! # Event Handlers
//!
//! Single-slot handlers for button presses and angle changes.
//!
//! Registering a handler replaces the previous one; there is never more than
//! one subscriber per event. Handlers run synchronously on the control task,
//! so a slow handler delays the next input sample by however long it takes.

use serde::Deserialize;

use super::context::ControlContext;

/// Called on every gated tick while the button reads pressed.
///
/// Receives the control context so it can move the servos or reconfigure.
pub type ButtonHandler = Box<dyn FnMut(&mut ControlContext) + Send + 'static>;

/// Called with the current `(x, y)` angles after an actuation pass.
pub type AngleChangeHandler = Box<dyn FnMut(i32, i32) + Send + 'static>;

/// When the angle-change handler fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleChangePolicy {
    /// Compare `current` against `last_commanded` after both axes have been
    /// committed. The comparison can never succeed, so the handler never runs.
    #[default]
    Literal,
    /// Fire once after every actuation pass that wrote at least one axis.
    OnChange,
}

impl AngleChangePolicy {
    /// Decides whether to dispatch after a pass.
    ///
    /// `pending_after_commit` is the post-commit `current != last_commanded`
    /// check; `wrote` is whether any hardware write happened in the pass.
    #[must_use]
    pub fn should_fire(self, pending_after_commit: bool, wrote: bool) -> bool {
        match self {
            AngleChangePolicy::Literal => pending_after_commit,
            AngleChangePolicy::OnChange => wrote,
        }
    }
}

/// Handler slots.
#[derive(Default)]
pub struct EventHandlers {
    pub(crate) button: Option<ButtonHandler>,
    pub(crate) angle_change: Option<AngleChangeHandler>,
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("button", &self.button.is_some())
            .field("angle_change", &self.angle_change.is_some())
            .finish()
    }
}

impl EventHandlers {
    pub fn set_button(&mut self, handler: ButtonHandler) {
        self.button = Some(handler);
    }

    pub fn set_angle_change(&mut self, handler: AngleChangeHandler) {
        self.angle_change = Some(handler);
    }

    #[must_use]
    pub fn has_button(&self) -> bool {
        self.button.is_some()
    }

    #[must_use]
    pub fn has_angle_change(&self) -> bool {
        self.angle_change.is_some()
    }

    /// Invokes the angle-change handler if one is registered.
    pub fn dispatch_angle_change(&mut self, x: i32, y: i32) -> bool {
        match self.angle_change.as_mut() {
            Some(handler) => {
                handler(x, y);
                true
            }
            None => false,
        }
    }
}
