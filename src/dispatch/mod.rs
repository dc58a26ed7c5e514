//! Command dispatch: input capture, collaborator calls and results

mod capture;
mod controller;
mod outcome;

pub use capture::InputSnapshot;
pub use controller::Dispatcher;
pub use outcome::{ActionResult, Outcome, PowerOp};
