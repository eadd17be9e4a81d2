//! Rust library to schedule relays over the day, like a staircase minuterie
//! stretched to daily intervals. Each relay of a bank carries up to two
//! `[start, end)` ON intervals in minutes since midnight.

#![warn(missing_docs)]

pub mod alarm;
pub mod drive;
pub mod relay;

/// Enum that list all relay bank event to process them asynchronously
#[derive(Debug, Default)]
pub enum RelayEvent {
    /// No event
    #[default]
    None,
    /// A relay switched state (relay id, new state)
    StateChange(usize, bool),
}
