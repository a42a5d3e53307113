//! Line-oriented command input
//!
//! Stdin bytes go into a [`LineBuffer`]; each complete line is parsed into a
//! [`Command`] and run against the panel by a [`CommandHandler`].

pub mod buffer;
pub mod command;
pub mod handler;

pub use buffer::LineBuffer;
pub use command::{parse_command, Command, COMMANDS};
pub use handler::{CommandHandler, HandlerAction};
