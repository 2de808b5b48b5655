//! Bump-avoidance handler
//!
//! The sample payload served over the bridge. The input's first word is a
//! bump flag; the output is a left/right wheel velocity pair. A bump arms a
//! countdown during which the robot first backs up, then turns, then drives
//! forward again.
//!
//! Each invocation is read, decide, write, signal, in that order.

use core::sync::atomic::{AtomicU32, Ordering};

use super::BridgeWindow;
use crate::mmio::Bus;
use crate::vectors::IrqHandler;

/// Tuning of the countdown and the wheel speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvoidanceParams {
    /// Counter value loaded on a bump
    pub reload: u32,
    /// Counter values at or above this back up; lower nonzero values turn
    pub threshold: u32,
    /// Full wheel speed
    pub max_velocity: i32,
}

impl AvoidanceParams {
    pub const DEFAULT: Self = Self {
        reload: 15,
        threshold: 7,
        max_velocity: 10,
    };
}

impl Default for AvoidanceParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What the robot does this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maneuver {
    Forward,
    Reverse,
    Turn,
}

/// Wheel velocities written to the output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub left: i32,
    pub right: i32,
}

impl Maneuver {
    pub const fn command(self, max_velocity: i32) -> Command {
        match self {
            Maneuver::Forward => Command {
                left: max_velocity,
                right: max_velocity,
            },
            Maneuver::Reverse => Command {
                left: -max_velocity,
                right: -max_velocity,
            },
            Maneuver::Turn => Command {
                left: -max_velocity / 2,
                right: max_velocity,
            },
        }
    }
}

/// Bytes published per response: two 32-bit velocities
const OUTPUT_BYTES: u32 = 2 * 4;

/// The bridge interrupt handler
///
/// Owns its countdown; nothing else writes it.
pub struct AvoidanceHandler<B> {
    window: BridgeWindow<B>,
    params: AvoidanceParams,
    pending_steps: AtomicU32,
}

impl<B: Bus> AvoidanceHandler<B> {
    pub const fn new(window: BridgeWindow<B>, params: AvoidanceParams) -> Self {
        Self {
            window,
            params,
            pending_steps: AtomicU32::new(0),
        }
    }

    /// Remaining avoidance steps
    pub fn pending_steps(&self) -> u32 {
        self.pending_steps.load(Ordering::Relaxed)
    }

    /// Advance the countdown for one input and pick the maneuver.
    pub fn step(&self, bumped: bool) -> Maneuver {
        let mut steps = self.pending_steps.load(Ordering::Relaxed);
        if bumped {
            steps = self.params.reload;
        }

        let maneuver = if steps == 0 {
            Maneuver::Forward
        } else if steps >= self.params.threshold {
            Maneuver::Reverse
        } else {
            Maneuver::Turn
        };
        if steps != 0 {
            steps -= 1;
        }

        self.pending_steps.store(steps, Ordering::Relaxed);
        maneuver
    }

    /// Serve one request from the window.
    pub fn serve(&self) -> Command {
        let state = self.window.snapshot();
        log::debug!(
            "bridge: go={} done={} in={:#x}+{} out={:#x}+{}",
            state.go,
            state.done,
            state.input_base,
            state.input_size,
            state.output_base,
            state.output_size
        );

        // A request shorter than one word carries no bump.
        let bumped = self
            .window
            .input_word(state.input_base, state.input_size, 0)
            .is_some_and(|word| word != 0);

        let maneuver = self.step(bumped);
        let command = maneuver.command(self.params.max_velocity);

        self.window
            .write_output_word(state.output_base, 0, command.left as u32);
        self.window
            .write_output_word(state.output_base, 1, command.right as u32);
        log::debug!(
            "bridge: {:?} left={} right={}",
            maneuver,
            command.left,
            command.right
        );

        self.window.publish_output(state.output_base, OUTPUT_BYTES);
        self.window.signal_done();
        command
    }
}

impl<B: Bus + Sync> IrqHandler for AvoidanceHandler<B> {
    fn handle(&self) {
        self.serve();
    }
}
