//! Authentication module for Twitter/X access.
//!
//! Restores a stored browser session or walks the user through logging in.

mod login;

pub use login::{EstablishMode, LoginConfig, SessionError, SessionEstablisher, SessionOutcome};
