//! Candidate path normalization and validation.

pub mod resolver;

pub use resolver::{ExecutablePath, PackagingCheck, PathResolver, Resolution};
