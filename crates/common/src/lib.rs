//! Shared types for the worldspace entity renderer: identifiers, transforms,
//! bounds and time.
//!
//! # Invariants
//! - All time values are microseconds since an arbitrary clock epoch.
//! - Transforms compose as translate * rotate * scale.

pub mod bounds;
pub mod time;
pub mod types;

pub use bounds::Aabb;
pub use time::{Clock, ManualClock, SystemClock, USECS_PER_SECOND};
pub use types::{EntityId, Transform};

pub fn crate_info() -> &'static str {
    "worldspace-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
