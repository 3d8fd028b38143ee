pub mod fsm;
pub mod transition;

pub use fsm::{next, next_with_intent};
pub use transition::{Hook, Transition};
