pub mod capture_result;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod state;
