mod macros;

pub mod concurrency;
pub mod service;

pub use log;
