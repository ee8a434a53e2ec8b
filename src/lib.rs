pub mod config;
pub mod db;
pub mod display;
pub mod loader;
pub mod parser;
pub mod scanner;
pub mod shell;

/// Extension of tune-book files (compared case-insensitively)
pub const ABC_EXTENSION: &str = "abc";

/// Application name for XDG paths
pub const APP_NAME: &str = "tunebook";
