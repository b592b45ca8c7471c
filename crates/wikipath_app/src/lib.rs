//! Command line front end for the wikipath search backend.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod render;
