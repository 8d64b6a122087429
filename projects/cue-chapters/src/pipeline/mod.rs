// Transition detection pipeline

pub mod bisect;
pub mod crop;
pub mod cursor;
pub mod finalize;
pub mod oracle;
pub mod orchestrator;
pub mod progress;
pub mod types;
