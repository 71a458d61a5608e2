//! Authentication settings.

use {
    crate::{constants::*, CredentialStoreError},
    derive_builder::Builder,
    serde::{Deserialize, Serialize},
    std::{fs::File, path::Path, path::PathBuf},
};

/// Settings for the authentication middleware.
///
/// Every field has a default, so a partial JSON document (or an empty builder) is valid.
#[derive(Builder, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[builder(default, derive(Debug))]
#[serde(default, rename_all = "camelCase")]
pub struct AuthConfig {
    /// Maximum allowed difference between the request timestamp and the server clock, in seconds. Also the lifetime
    /// of a recorded nonce.
    #[serde(alias = "requestMaxAgeInSeconds")]
    pub request_max_age_seconds: u64,

    /// Authorization scheme token, compared case-insensitively and echoed in the challenge header.
    #[builder(setter(into))]
    pub scheme: String,

    /// JSON file listing the registered applications.
    #[builder(setter(into))]
    #[serde(alias = "RegisteredAppsFile")]
    pub registered_apps_file: PathBuf,

    /// Scheme used to rebuild the absolute URI of origin-form requests.
    #[builder(setter(into))]
    pub uri_scheme: String,

    /// Minimum interval between sweeps of expired nonces, in seconds.
    pub nonce_sweep_interval_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            request_max_age_seconds: DEFAULT_REQUEST_MAX_AGE_SECONDS,
            scheme: DEFAULT_AUTH_SCHEME.to_string(),
            registered_apps_file: PathBuf::from(DEFAULT_REGISTERED_APPS_FILE),
            uri_scheme: DEFAULT_URI_SCHEME.to_string(),
            nonce_sweep_interval_seconds: DEFAULT_NONCE_SWEEP_INTERVAL_SECONDS,
        }
    }
}

impl AuthConfig {
    /// Create an [AuthConfigBuilder] to construct an [AuthConfig].
    #[inline]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Read settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CredentialStoreError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
