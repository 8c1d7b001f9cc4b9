//! UCS Manager hardware collection
//!
//! - **XML codec** (`xml.rs`) - request builders and response parsers
//! - **Session** (`session.rs`) - one login/logout cycle per domain
//! - **Fleet** (`fleet.rs`) - bounded concurrent collection across domains

pub mod fleet;
pub mod session;
pub mod xml;

pub use fleet::{FleetConfig, UcsFleet};
pub use session::{format_position, normalize_endpoint, DomainSession, SessionConfig, SessionState};
