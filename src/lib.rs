//! Quasar library exports for the binary and integration tests

pub mod core;
pub mod headless;
pub mod protocol;
pub mod text;
pub mod tui;
pub mod view;

#[cfg(test)]
pub mod test_support;
