//! Device identity derivation and connection-string parsing.

use crate::constants::STANDARD_ENDPOINT_SUFFIX;

/// Builds the cache identity for one device at one backend endpoint.
///
/// Identities are `<endpoint>_<device_id>`, collapsing to the bare device id
/// when no endpoint name is known.
pub fn device_identity(endpoint_name: Option<&str>, device_id: &str) -> String {
    match endpoint_name {
        Some(name) if !name.is_empty() => format!("{name}_{device_id}"),
        _ => device_id.to_string(),
    }
}

/// Normalizes a backend host into the short endpoint name used in identities:
/// lowercased, with the standard suffix stripped. Non-standard suffixes are
/// preserved.
pub fn endpoint_name_from_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    host.strip_suffix(STANDARD_ENDPOINT_SUFFIX)
        .map(str::to_string)
        .unwrap_or(host)
}

/// Extracts the endpoint name from a device connection string.
///
/// Keys are matched case-insensitively and may appear in any order. Returns
/// an empty string when no host name is present.
pub fn resolve_endpoint_name(connection_string: &str) -> String {
    connection_string
        .split(';')
        .find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("hostname")
                .then(|| endpoint_name_from_host(value))
        })
        .unwrap_or_default()
}
