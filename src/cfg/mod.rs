pub mod loader;
pub mod spec;
