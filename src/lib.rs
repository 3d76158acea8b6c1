pub mod memory;
pub mod processor;
pub mod report;
