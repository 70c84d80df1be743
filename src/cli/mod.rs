pub mod commands;
pub mod inspect;
pub mod migrate;
pub mod validate;

pub use commands::{Cli, Commands};
