//! Tab sync server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod config;
pub mod db;
pub mod error;
pub mod flagged;
pub mod routes;
pub mod state;
pub mod tabs;
pub mod ws;
