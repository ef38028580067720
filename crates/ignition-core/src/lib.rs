//! Start gating and console automation for ignition
//!
//! This crate is the heart of ignition, containing:
//! - The gatekeeper: per-requester cooldown and daily limit, backed by the usage store
//! - The automation driver: login -> detect status -> start -> confirm, one browser session per run
//! - The orchestrator tying both together into a single user-facing reply
//! - Rendering of user, admin and stats messages

mod driver;
mod gatekeeper;
mod messages;
mod orchestrator;
mod outcome;

pub use driver::*;
pub use gatekeeper::*;
pub use messages::*;
pub use orchestrator::*;
pub use outcome::*;
