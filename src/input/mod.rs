//! Input relay
//!
//! Translates the protocol server's continuously-sampled pointer state
//! into the discrete touch actions the OS injection API understands, and
//! watches the keyboard for the local shutdown hotkey.

pub mod translator;

pub use translator::InputTranslator;

/// Discrete pointer action accepted by the input-injection API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    /// Primary button pressed.
    Down,
    /// Primary button released.
    Up,
    /// Pointer moved.
    Move,
    /// Scroll step away from the user.
    AxisUp,
    /// Scroll step toward the user.
    AxisDown,
    /// Scrolling ended.
    AxisStop,
}

/// One injectable action with its pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchCommand {
    /// The action to inject.
    pub action: TouchAction,
    /// Pointer x in canvas coordinates.
    pub x: i32,
    /// Pointer y in canvas coordinates.
    pub y: i32,
}
