mod args;
mod command;

pub use self::command::*;
