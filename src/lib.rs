pub mod catalog;
pub mod cli;
pub mod config;
pub mod errors;
pub mod insights;
pub mod log;
pub mod nutrition;
pub mod pipeline;
pub mod plan;
pub mod prompt;
pub mod provider;
pub mod quota;
pub mod repair;
pub mod schedule;
pub mod store;
pub mod ux;
pub mod wire;

pub use errors::{GenError, GenResult};
pub use pipeline::Pipeline;
