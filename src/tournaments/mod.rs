//! The bracket engine: entities, the match graph and the operations on it.

pub mod brackets;
pub mod import;
pub mod matches;
pub mod regions;
pub mod rooms;
pub mod schedule;
pub mod teams;
pub mod timeslots;
