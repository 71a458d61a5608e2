//! Common constants used throughout the crate.
//!
//! Tests that are testing the content of an error code or message should not use these constants;
//! they should use hard-coded strings so the tests are also testing for misspellings.
//!
//! Please keep this file organized alphabetically.

/// Default authentication scheme token.
pub(crate) const DEFAULT_AUTH_SCHEME: &str = "amx";

/// Default interval between sweeps of expired nonces, in seconds.
pub(crate) const DEFAULT_NONCE_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Default location of the registered-applications file.
pub(crate) const DEFAULT_REGISTERED_APPS_FILE: &str = "registered-apps.json";

/// Default freshness window in seconds.
pub(crate) const DEFAULT_REQUEST_MAX_AGE_SECONDS: u64 = 300;

/// Default scheme used to rebuild an absolute URI from an origin-form request.
pub(crate) const DEFAULT_URI_SCHEME: &str = "https";

/// Error code: DuplicateNonce
pub(crate) const ERR_CODE_DUPLICATE_NONCE: &str = "DuplicateNonce";

/// Error code: InternalFailure
pub(crate) const ERR_CODE_INTERNAL_FAILURE: &str = "InternalFailure";

/// Error code: MalformedHeader
pub(crate) const ERR_CODE_MALFORMED_HEADER: &str = "MalformedHeader";

/// Error code: SignatureMismatch
pub(crate) const ERR_CODE_SIGNATURE_MISMATCH: &str = "SignatureMismatch";

/// Error code: StaleTimestamp
pub(crate) const ERR_CODE_STALE_TIMESTAMP: &str = "StaleTimestamp";

/// Error code: UnknownApplication
pub(crate) const ERR_CODE_UNKNOWN_APPLICATION: &str = "UnknownApplication";

/// Number of colon-delimited fields in the Authorization parameter.
pub(crate) const HEADER_FIELD_COUNT: usize = 4;

/// Error message: `"Authorization header does not use the expected scheme"`
pub(crate) const MSG_WRONG_SCHEME: &str = "Authorization header does not use the expected scheme";

/// Error message: `"Authorization parameter must have exactly 4 non-empty colon-delimited fields"`
pub(crate) const MSG_WRONG_FIELD_COUNT: &str =
    "Authorization parameter must have exactly 4 non-empty colon-delimited fields";

/// Error message: `"Request is missing Authorization header"`
pub(crate) const MSG_MISSING_AUTHORIZATION: &str = "Request is missing Authorization header";

/// Error message: `"Request is missing Host header"`
pub(crate) const MSG_MISSING_HOST: &str = "Request is missing Host header";

/// Error message: `"The request signature we calculated does not match the signature you provided."`
pub(crate) const MSG_REQUEST_SIGNATURE_MISMATCH: &str =
    "The request signature we calculated does not match the signature you provided.";
