//! W3C WebDriver backend for ignition
//!
//! Talks the WebDriver JSON wire protocol to a running driver server
//! (chromedriver, geckodriver). Every session is created fresh and deleted
//! on close, so each automation run gets its own browser process.

mod backend;
mod protocol;
mod session;

pub use backend::*;
pub use session::WebDriverSession;
