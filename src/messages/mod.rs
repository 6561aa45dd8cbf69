//! Team chat and direct messages.

pub mod data;
pub mod helpers;
