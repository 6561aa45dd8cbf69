pub mod data;
pub mod helpers;
