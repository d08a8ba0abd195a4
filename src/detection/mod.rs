//! Rule evaluation and per-session velocity tracking

pub mod evaluator;
pub mod window;

pub use evaluator::RuleEvaluator;
pub use window::VelocityWindow;
