//! Configuration and the user-facing skill service.

pub mod config;
pub mod error;
pub mod service;

pub use config::Config;
pub use error::ServiceError;
pub use service::{Actor, EditRequest, SkillService};
