//! Common test utilities for tensor-ir
//!
//! Shared builders for IR fixtures and pass sets.

#![allow(dead_code)]

mod fixtures;

pub use fixtures::*;
