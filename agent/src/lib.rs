//! The embedded side of Scrutiny: a `no_std` agent that a firmware
//! links in to be inspected and commanded by a remote server.

#![no_std]

#[macro_use]
mod fmt;

mod command_processor;
pub mod config;
pub mod link;
mod main_handler;
pub mod protocol;
mod rx;
pub mod timebase;
mod tx;
pub mod user_command;

pub use config::{Config, ConfigError};
pub use link::{Link, LinkError};
pub use main_handler::MainHandler;
pub use user_command::{
    error::{DispatchError, UserCommandError},
    ResponseBuffer, UserCommandDispatcher, UserCommandFn, UserCommandHandler,
};

pub use scrutiny_framing as framing;
