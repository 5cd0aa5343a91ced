// Library surface for the TUI binary and the headless integration tests.
// Keep this free of terminal rendering so sessions can run without a tty.
pub mod api;
pub mod app_dirs;
pub mod config;
pub mod controller;
pub mod devices;
pub mod driver;
pub mod error;
pub mod exercise;
pub mod history;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod protocol;
pub mod runtime;
pub mod scoring;
pub mod session;
