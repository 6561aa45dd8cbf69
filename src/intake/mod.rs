//! Signup capture: the public intake form, its staging record, the agency
//! notification and logo uploads.

pub mod data;
pub mod endpoints;
pub mod helpers;
pub mod notify;
pub mod staging;
pub mod upload;
