//! API endpoint handlers.
//!
//! Each module corresponds to one resource. Handlers open a connection per
//! request and delegate to the workflow modules.

pub mod admin;
pub mod doctors;
pub mod health;
pub mod home;
pub mod patients;
pub mod specializations;
pub mod visits;
