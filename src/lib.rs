pub mod audit;
pub mod cli;
pub mod config;
pub mod delete;
pub mod job;
pub mod lock;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod report;
pub mod scan;
pub mod store;
pub mod util;
