//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - 2D math and colors
//! - Dynamic property values and the condition DSL
//! - Handles and id generators
//! - Time management
//! - Logging utilities

pub mod collections;
pub mod color;
pub mod condition;
pub mod logging;
pub mod math;
pub mod time;
pub mod value;
