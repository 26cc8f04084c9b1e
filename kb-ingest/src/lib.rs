pub mod aws;
pub mod bedrock;
pub mod cli;
pub mod console;
pub mod load_config;
pub mod s3;
pub mod sigv4;

pub use cli::{run, Cli, Commands};
