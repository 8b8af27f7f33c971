//! Command implementations for the kino CLI

mod list;
mod serve;

pub use list::execute as list;
pub use serve::execute as serve;
