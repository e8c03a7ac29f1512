use thiserror::Error;

/// Transport layer errors, keyed by the device identity the session serves.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open transport for '{identity}': {reason}")]
    OpenFailed { identity: String, reason: String },

    #[error("failed to send for '{identity}': {reason}")]
    SendFailed { identity: String, reason: String },

    #[error("failed to receive for '{identity}': {reason}")]
    ReceiveFailed { identity: String, reason: String },

    #[error("failed to settle message for '{identity}': {reason}")]
    SettleFailed { identity: String, reason: String },

    #[error("failed to register method handler for '{identity}': {reason}")]
    RegistrationFailed { identity: String, reason: String },

    #[error("transport for '{identity}' is closed")]
    Closed { identity: String },
}
