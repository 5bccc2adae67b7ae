//! Built-in transports
//!
//! - `file`: appends each body to a per-recipient file
//! - `test`: records messages in an injected [`test::Deliveries`]

pub mod file;
pub mod test;

pub use file::{FileSettings, FileTransport};
pub use test::{Deliveries, TestSettings, TestTransport};
