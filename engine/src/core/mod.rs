//! Core value types

pub mod transform;

pub use transform::Transform;
