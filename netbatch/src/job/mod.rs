//! Job scheduling across a device inventory.

mod options;
mod scheduler;

pub use options::JobOptions;
pub use scheduler::{JobReport, ResultSink, Scheduler};
