mod dumper;
pub mod filter;
pub mod stateless;
pub mod stats;
pub mod writer;

pub use dumper::*;
