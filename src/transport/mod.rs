//! Transport module - establishing the raw live connection.
//!
//! Only TCP is provided; sessions themselves accept any
//! `AsyncRead + AsyncWrite` stream.

mod tcp;

pub use tcp::connect;
