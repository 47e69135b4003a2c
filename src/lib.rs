//! Mailgate Library
//!
//! This crate provides the core functionality for the mailgate HTTP email
//! gateway, which accepts HMAC-signed send requests and hands them to an
//! outbound email provider.

pub mod audit;
pub mod auth;
pub mod config;
pub mod delivery;
pub mod error;
pub mod guard;
pub mod protocol;
pub mod server;
