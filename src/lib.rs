//! Bookshelf application library
//!
//! Application modules mounted by the `bookshelf` binary.

pub mod modules;

pub use modules::*;
