//! Route handlers

pub mod alarms;
pub mod health;
