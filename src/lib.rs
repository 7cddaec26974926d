// src/lib.rs
pub mod colors;
pub mod config;
pub mod error;
pub mod format;
pub mod formatters;
pub mod framing;
pub mod pipeline;
pub mod producer;
pub mod session;

pub use error::*;
pub use pipeline::*;

pub use format::{FormatKind, DEFAULT_FORMAT};
pub use formatters::{build_layout, ColumnLayout, LineLayout, PlainLayout};
pub use framing::LineFramer;
pub use producer::{AdbProducer, DeviceSelector, LogInput, LogcatArgs, Producer};
pub use session::{ReconnectPolicy, SessionController, SessionState};
