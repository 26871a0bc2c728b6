//! Types that cross the core boundary.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them to a UI process unchanged.

pub mod events;
