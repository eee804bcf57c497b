//! Sources of lock data
pub mod bridge;
