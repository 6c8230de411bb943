use crate::config::PlacesConfig;
use crate::error::ConfigError;

/// Environment variable name for providing the places API key
pub const ENV_PLACES_KEY_VAR: &str = "PLATE_SCORE_PLACES_KEY";

/// Check for a places API key in the PLATE_SCORE_PLACES_KEY environment variable.
/// Returns Some(key) if the env var is set and non-empty, None otherwise.
pub fn get_places_key_from_env() -> Option<String> {
    non_empty(std::env::var(ENV_PLACES_KEY_VAR).ok())
}

/// Resolve the places API key: environment first, then the config file.
///
/// A missing key is fatal; the amenity lookup cannot run without one.
pub fn resolve_places_key(config: &PlacesConfig) -> Result<String, ConfigError> {
    get_places_key_from_env()
        .or_else(|| non_empty(config.api_key.clone()))
        .ok_or_else(|| {
            ConfigError::MissingCredential(format!(
                "places API key not set. Export {} or set places.api_key in the config file",
                ENV_PLACES_KEY_VAR
            ))
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
