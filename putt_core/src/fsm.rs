//! Shared driver for the enum-dispatched state machines.

use std::fmt::Debug;
use std::mem::discriminant;

/// What a state handler wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<S> {
    /// End this tick; resume in `S` on the next one.
    Yield(S),
    /// Run the handler for `S` within the same tick.
    Continue(S),
}

/// Upper bound on chained handlers per tick. The longest legitimate chain is
/// the actuator pass (ModeSelect, clear, ModeSelect, static, move).
const MAX_CHAIN: usize = 8;

pub(crate) trait Machine {
    type State: Copy + Debug;
    const NAME: &'static str;

    fn state(&self) -> Self::State;
    fn set_state(&mut self, s: Self::State);
    fn handle(&mut self, s: Self::State) -> Step<Self::State>;
}

/// Run handlers until one yields.
pub(crate) fn drive<M: Machine>(m: &mut M) {
    for _ in 0..MAX_CHAIN {
        let from = m.state();
        let step = m.handle(from);
        let (to, chained) = match step {
            Step::Yield(s) => (s, false),
            Step::Continue(s) => (s, true),
        };
        if discriminant(&from) != discriminant(&to) {
            tracing::trace!(machine = M::NAME, ?from, ?to, "transition");
        }
        m.set_state(to);
        if !chained {
            return;
        }
    }
    tracing::warn!(machine = M::NAME, state = ?m.state(), "state chain did not settle");
}
