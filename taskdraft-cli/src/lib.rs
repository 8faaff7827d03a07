//! HTTP API and command line front end for taskdraft.

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use server::{build_router, AppState};
