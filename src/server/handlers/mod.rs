//! Request handlers grouped by endpoint family.

pub mod chat;
pub mod status;
