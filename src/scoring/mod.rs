pub mod aggregate;
pub mod evaluator;
pub mod metrics;

pub use evaluator::Evaluator;
