pub mod decision;
pub mod engine;

pub use decision::{Action, Decision, Reason};
pub use engine::Detector;
