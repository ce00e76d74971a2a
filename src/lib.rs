pub mod config;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod stats;
