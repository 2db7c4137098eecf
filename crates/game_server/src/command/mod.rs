//! Client commands: the text grammar and the handlers behind each verb.

pub mod dispatch;
pub mod interpreter;

pub use dispatch::{Delivery, Dispatcher, Response};
pub use interpreter::{Command, Verb};
