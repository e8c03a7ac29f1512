//! Shared data model: settings, constants, and identity derivation.

pub mod constants;
pub mod identity;
pub mod settings;

pub use identity::{device_identity, endpoint_name_from_host, resolve_endpoint_name};
pub use settings::{
    CloudMessageSettings, DirectMethodSettings, HubSettings, LogSettings, Settings, SettingsInner,
    WebSettings,
};
