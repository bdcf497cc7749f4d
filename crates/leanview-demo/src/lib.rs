#![forbid(unsafe_code)]

//! Headless LeanView demo.

pub mod cli;
pub mod error;
pub mod logging;
pub mod page;

pub use cli::{Cli, run, run_from_env};
pub use error::{DemoError, Result};
