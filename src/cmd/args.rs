mod toggle;

pub use toggle::*;
