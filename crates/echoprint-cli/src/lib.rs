//! Shared helpers for the echoprint command line tools

pub mod input;
pub mod output;
