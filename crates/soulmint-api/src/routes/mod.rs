//! HTTP route modules, one per resource family.

pub mod credentials;
pub mod credits;
