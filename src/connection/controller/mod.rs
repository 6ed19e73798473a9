//! Reliability controls of a session.
pub mod window;
