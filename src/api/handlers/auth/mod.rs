//! Auth handlers: signup, login, and session plumbing.
//!
//! This is the only layer with user-facing error semantics. Domain errors are
//! translated here and nothing storage- or crypto-specific leaks to clients.
//! Login deliberately collapses "no such user" and "wrong code" into one
//! response so accounts cannot be enumerated.

pub mod login;
pub mod me;
pub(crate) mod session;
pub mod signup;
pub mod types;

use regex::Regex;

pub(crate) fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_.-]{1,64}$").is_ok_and(|re| re.is_match(username))
}
