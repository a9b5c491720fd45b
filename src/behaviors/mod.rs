//! Behaviors module for the patrol robot

/// Robot behaviors. Patrolling is the only one so far.
pub mod patrol;

pub use patrol::{Collaborators, PatrolController, PatrolSnapshot, PatrolState};
