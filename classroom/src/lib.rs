//! Classroom portal: role-gated screens over the hosted document store.

pub mod app;
pub mod config;
pub mod metrics_defs;
pub mod records;
pub mod screens;

pub use app::{App, SetupError};
pub use screens::{Backend, ScreenError, View};
