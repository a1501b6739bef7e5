//! Core traits, settings, and module registry for bookshelf.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{api_path, InitCtx, Migration, Module};
pub use registry::ModuleRegistry;
