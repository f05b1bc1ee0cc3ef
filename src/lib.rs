//! formentry - form submission validation and transactional persistence
//!
//! A submission is checked against its form's typed fields, then written
//! atomically through injected storage collaborators.

pub mod cli;
pub mod config;
pub mod observability;
pub mod schema;
pub mod store;
pub mod submission;
