//! Authorization header parsing, signing, and signature verification.

use {
    crate::{
        canonical::{body_digest, build_canonical_string},
        constants::*,
        crypto::{base64_encode, hmac_sha256},
        SharedSecret, SignatureError,
    },
    log::trace,
    std::fmt::{Display, Formatter, Result as FmtResult},
    subtle::ConstantTimeEq,
};

/// The credential carried in an Authorization header: `<scheme> <appId>:<signature>:<nonce>:<timestamp>`.
///
/// AuthorizationCredential structs are immutable. They are produced by [`AuthorizationCredential::parse`] on the
/// server and by [`sign_request`] on the client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthorizationCredential {
    app_id: String,
    signature: String,
    nonce: String,

    /// The timestamp exactly as it appears in the header. This is the text that is signed.
    timestamp_text: String,

    /// The timestamp in seconds since the Unix epoch.
    timestamp: i64,
}

impl AuthorizationCredential {
    /// Parse the value of an Authorization header.
    ///
    /// The scheme token is compared case-insensitively. The parameter must split on `:` into exactly four non-empty
    /// fields, and the timestamp must be an integer.
    pub fn parse(header_value: &str, scheme: &str) -> Result<Self, SignatureError> {
        let header_value = header_value.trim();
        let (header_scheme, parameter) = match header_value.split_once(char::is_whitespace) {
            Some((s, p)) => (s, p.trim()),
            None => (header_value, ""),
        };

        if !header_scheme.eq_ignore_ascii_case(scheme) {
            trace!("parse: scheme '{}' does not match expected scheme '{}'", header_scheme, scheme);
            return Err(SignatureError::MalformedHeader(format!("{}: expected '{}'", MSG_WRONG_SCHEME, scheme)));
        }

        let fields: Vec<&str> = parameter.split(':').collect();
        if fields.len() != HEADER_FIELD_COUNT || fields.iter().any(|f| f.is_empty()) {
            trace!("parse: parameter has {} fields, expected {}", fields.len(), HEADER_FIELD_COUNT);
            return Err(SignatureError::MalformedHeader(MSG_WRONG_FIELD_COUNT.to_string()));
        }

        let timestamp_text = fields[3];
        let timestamp = timestamp_text.parse::<i64>().map_err(|_| {
            SignatureError::MalformedHeader(format!("Authorization timestamp is not an integer: '{}'", timestamp_text))
        })?;

        Ok(Self {
            app_id: fields[0].to_string(),
            signature: fields[1].to_string(),
            nonce: fields[2].to_string(),
            timestamp_text: timestamp_text.to_string(),
            timestamp,
        })
    }

    /// Retrieve the application identifier claimed by the caller.
    #[inline]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Retrieve the base64 signature supplied by the caller.
    #[inline]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    #[inline]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Retrieve the timestamp in seconds since the Unix epoch.
    #[inline]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Retrieve the timestamp as it appeared in the header.
    #[inline]
    pub fn timestamp_text(&self) -> &str {
        &self.timestamp_text
    }

    /// Render the Authorization header value for this credential.
    pub fn to_header_value(&self, scheme: &str) -> String {
        format!("{} {}", scheme, self)
    }
}

impl Display for AuthorizationCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}:{}:{}", self.app_id, self.signature, self.nonce, self.timestamp_text)
    }
}

/// Compute the base64 HMAC-SHA256 signature of a canonical string.
pub fn compute_signature(canonical_string: &str, shared_secret: &SharedSecret) -> Result<String, SignatureError> {
    let key = shared_secret.to_key_bytes()?;
    let tag = hmac_sha256(&key, canonical_string.as_bytes())
        .map_err(|e| SignatureError::InternalFailure(format!("HMAC error: {}", e).into()))?;
    Ok(base64_encode(&tag))
}

/// Check the caller's signature against the one computed from `canonical_string` and `shared_secret`.
///
/// The comparison runs in constant time with respect to the expected signature.
pub fn verify(
    credential: &AuthorizationCredential,
    canonical_string: &str,
    shared_secret: &SharedSecret,
) -> Result<bool, SignatureError> {
    let expected = compute_signature(canonical_string, shared_secret)?;
    trace!("verify: expected signature '{}', got '{}'", expected, credential.signature());
    Ok(expected.as_bytes().ct_eq(credential.signature().as_bytes()).into())
}

/// Sign a request on behalf of a client.
///
/// `absolute_uri` must be the full URI the server will see (scheme, host, path and query). The returned credential
/// renders to an Authorization header with [`AuthorizationCredential::to_header_value`].
pub fn sign_request(
    app_id: &str,
    shared_secret: &SharedSecret,
    method: &str,
    absolute_uri: &str,
    timestamp: i64,
    nonce: &str,
    body: &[u8],
) -> Result<AuthorizationCredential, SignatureError> {
    let timestamp_text = timestamp.to_string();
    let canonical =
        build_canonical_string(app_id, method, absolute_uri, &timestamp_text, nonce, &body_digest(body));
    let signature = compute_signature(&canonical, shared_secret)?;

    Ok(AuthorizationCredential {
        app_id: app_id.to_string(),
        signature,
        nonce: nonce.to_string(),
        timestamp_text,
        timestamp,
    })
}
