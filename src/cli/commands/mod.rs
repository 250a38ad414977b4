//! CLI Commands

pub mod config;
pub mod govern;
pub mod providers;
pub mod verify;
