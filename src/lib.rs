//! Student portal backend
//!
//! This library provides account management, server-side sessions with idle
//! and absolute expiry, and a course catalog with enrollment.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
