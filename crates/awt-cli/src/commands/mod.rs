//! Command handlers

pub mod config;
pub mod run;
pub mod status;
