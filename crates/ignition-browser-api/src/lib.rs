//! Browser automation trait interfaces for ignition
//!
//! This crate defines the narrow capability the automation driver needs from
//! a browser: open a session, navigate, find elements, type, click, read text
//! and state, close. It contains no browser code itself; `ignition-webdriver`
//! provides the real implementation and [`MockBrowser`] a deterministic one.

mod locator;
mod mock;
mod options;
mod traits;

pub use locator::*;
pub use mock::*;
pub use options::*;
pub use traits::*;
