//! Command-line front end for driving a terminal UI program with one prompt.

pub mod config;
pub mod logging;
pub mod prompt;
