//! Destinations for lock data
pub mod mirror;
