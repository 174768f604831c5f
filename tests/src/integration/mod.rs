//! # GridCache Integration Tests
//!
//! Cross-component choreography: encoded request frames dispatched against a
//! live provider wired from the real registry, guard, and mock collaborators.

pub mod topology_races;
pub mod transfer_flows;
