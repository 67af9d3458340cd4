//! Commit engine and lifecycle controller.

pub mod commit;
pub mod lifecycle;
