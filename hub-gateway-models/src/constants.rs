/// Settings file probed when `--config` and `HUBGW_CONFIG` are unset.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "hub-gateway.toml";
/// Prefix for environment overrides, e.g. `HUBGW_WEB__PORT=9090`.
pub const ENV_PREFIX: &str = "HUBGW";
/// Separator between nested section names in environment overrides.
pub const ENV_SEPARATOR: &str = "__";

/// Request header carrying a caller-supplied security token.
pub const SAS_TOKEN_HEADER: &str = "sas_token";
/// Request header carrying the token expiration as Unix seconds.
pub const SAS_TOKEN_EXPIRATION_HEADER: &str = "sas_token_expiration";
/// Request header carrying a full device connection string.
pub const CONNECTION_STRING_HEADER: &str = "connection_string";

/// Content type stamped on every outbound cloud message.
pub const MESSAGE_CONTENT_TYPE: &str = "application/json";
/// Content encoding stamped on every outbound cloud message.
pub const MESSAGE_CONTENT_ENCODING: &str = "utf-8";

/// Suffix stripped from backend hosts when deriving the endpoint name.
pub const STANDARD_ENDPOINT_SUFFIX: &str = ".azure-devices.net";

/// Token lifetime assumed when neither the request nor the token itself
/// carries an expiration.
pub const DEFAULT_TOKEN_LIFETIME_MINUTES: i64 = 20;
