//! Configuration types shared by the taskloom engine and its hosts.
//!
//! Everything in this crate is plain data: serde-friendly structs loaded
//! from TOML or built in code by the host, then handed to the engine as
//! read-only snapshots. No I/O happens here beyond deserialization.

pub mod constants;
pub mod modes;
pub mod settings;

pub use modes::{Mode, ModeRegistry, ToolGroup, DEFAULT_MODE_SLUG};
pub use settings::{ProviderInfo, SettingsSnapshot};
