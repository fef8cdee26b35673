//! # ofwire-stream
//!
//! Async message stream for ofwire codecs.
//!
//! This crate provides:
//! - `MessageStream`, which owns a duplex connection and yields decoded
//!   messages in wire order
//! - The `Parser` capability that frames and decodes messages, with a
//!   built-in parser for raw IPv6 packets
//! - Stream configuration loaded from defaults, YAML and the environment

pub mod config;
pub mod error;
pub mod parser;
pub mod stream;

pub use config::StreamConfig;
pub use error::{ConfigError, StreamError};
pub use parser::{Ipv6Parser, Parser};
pub use stream::MessageStream;
