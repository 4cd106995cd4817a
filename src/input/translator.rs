//! Pointer and hotkey translation state machine
//!
//! The protocol server reports pointer state as a button bitmask plus
//! coordinates on every sample; injection wants edge-triggered events.
//! This module keeps the previous sample and emits the transitions.

use crate::input::{TouchAction, TouchCommand};

/// Primary (left) button, RFB mask bit 0.
const BUTTON_PRIMARY: u8 = 1 << 0;

/// Scroll-up wheel step, RFB mask bit 3.
const BUTTON_AXIS_UP: u8 = 1 << 3;

/// Scroll-down wheel step, RFB mask bit 4.
const BUTTON_AXIS_DOWN: u8 = 1 << 4;

/// Left and right control keysyms, folded into one logical flag.
const KEYSYM_CONTROL_LEFT: u32 = 0xFFE3;
const KEYSYM_CONTROL_RIGHT: u32 = 0xFFE4;

/// The shutdown hotkey letter (control + q), either case.
const KEYSYM_STOP_LOWER: u32 = 0x71;
const KEYSYM_STOP_UPPER: u32 = 0x51;

/// Edge-triggering translator over pointer samples and key events.
///
/// State is owned by the event-loop thread and reset per run.
#[derive(Default)]
pub struct InputTranslator {
    prev_mask: u8,
    prev_x: i32,
    prev_y: i32,
    control_held: bool,
}

impl InputTranslator {
    /// Fresh translator: no buttons held, pointer at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one pointer sample into zero or more touch commands.
    ///
    /// Emission order: button transitions, axis transitions, movement.
    /// All are independent signals and several may fire per sample.
    pub fn pointer_sample(&mut self, mask: u8, x: i32, y: i32) -> Vec<TouchCommand> {
        let mut out = Vec::new();
        let pressed = |m: u8, bit: u8| m & bit != 0;

        if pressed(mask, BUTTON_PRIMARY) && !pressed(self.prev_mask, BUTTON_PRIMARY) {
            out.push(TouchCommand { action: TouchAction::Down, x, y });
        } else if !pressed(mask, BUTTON_PRIMARY) && pressed(self.prev_mask, BUTTON_PRIMARY) {
            out.push(TouchCommand { action: TouchAction::Up, x, y });
        }

        if pressed(mask, BUTTON_AXIS_UP) && !pressed(self.prev_mask, BUTTON_AXIS_UP) {
            out.push(TouchCommand { action: TouchAction::AxisUp, x, y });
        }
        if pressed(mask, BUTTON_AXIS_DOWN) && !pressed(self.prev_mask, BUTTON_AXIS_DOWN) {
            out.push(TouchCommand { action: TouchAction::AxisDown, x, y });
        }
        let axis_bits = BUTTON_AXIS_UP | BUTTON_AXIS_DOWN;
        if mask & axis_bits == 0 && self.prev_mask & axis_bits != 0 {
            out.push(TouchCommand { action: TouchAction::AxisStop, x, y });
        }

        if x != self.prev_x || y != self.prev_y {
            out.push(TouchCommand { action: TouchAction::Move, x, y });
        }

        self.prev_mask = mask;
        self.prev_x = x;
        self.prev_y = y;
        out
    }

    /// Track one key event; returns `true` when the shutdown hotkey fired.
    ///
    /// The hotkey event is consumed locally and never relayed.
    pub fn key_sample(&mut self, keysym: u32, down: bool) -> bool {
        match keysym {
            KEYSYM_CONTROL_LEFT | KEYSYM_CONTROL_RIGHT => {
                self.control_held = down;
                false
            }
            KEYSYM_STOP_LOWER | KEYSYM_STOP_UPPER => down && self.control_held,
            _ => false,
        }
    }
}
