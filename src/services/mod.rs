//! Connect to/from external services
pub mod state_store;
