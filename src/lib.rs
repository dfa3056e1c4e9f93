// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod browser;
pub mod bulk;
pub mod config;
pub mod export;
pub mod filter;
pub mod selection;
pub mod session;
pub mod store;
pub mod window;
