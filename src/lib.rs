pub mod cli;
pub mod http;
pub mod load_config;

pub use cli::{run, Cli, Commands};
