mod client;
mod connection;
pub mod discovery;
mod object;
mod resource;

pub use client::*;
pub use connection::*;
pub use object::*;
pub use resource::*;
