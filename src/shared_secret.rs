use {
    crate::{crypto::base64_decode, SignatureError},
    derive_builder::Builder,
    std::{
        fmt::{Debug, Display, Formatter, Result as FmtResult},
        future::Future,
    },
    subtle::ConstantTimeEq,
    tower::{service_fn, util::ServiceFn, BoxError},
};

/// A per-application shared secret, held in its base64-encoded form.
///
/// The secret is decoded only when a signature is computed; a secret that is not valid base64 fails at that point.
#[derive(Clone)]
pub struct SharedSecret {
    encoded: String,
}

impl SharedSecret {
    /// Wrap a base64-encoded secret.
    pub fn new<S: Into<String>>(encoded: S) -> Self {
        Self {
            encoded: encoded.into(),
        }
    }

    /// Decode the secret into raw HMAC key bytes.
    pub fn to_key_bytes(&self) -> Result<Vec<u8>, SignatureError> {
        base64_decode(&self.encoded).map_err(|e| SignatureError::InternalFailure(Box::new(e)))
    }

    /// Retrieve the base64-encoded secret.
    #[inline]
    pub fn as_base64(&self) -> &str {
        &self.encoded
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.encoded.as_bytes().ct_eq(other.encoded.as_bytes()).into()
    }
}

impl Eq for SharedSecret {}

impl Debug for SharedSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("SharedSecret")
    }
}

impl Display for SharedSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("SharedSecret")
    }
}

/// A request for the shared secret of an application.
///
/// GetSharedSecretRequest structs are immutable. Use [`GetSharedSecretRequestBuilder`] to programmatically construct a
/// request.
#[derive(Builder, Clone, Debug)]
#[non_exhaustive]
pub struct GetSharedSecretRequest {
    /// The application identifier claimed by the request.
    #[builder(setter(into))]
    app_id: String,
}

impl GetSharedSecretRequest {
    /// Create a [GetSharedSecretRequestBuilder] to construct a [GetSharedSecretRequest].
    #[inline]
    pub fn builder() -> GetSharedSecretRequestBuilder {
        GetSharedSecretRequestBuilder::default()
    }

    /// Retrieve the application identifier.
    #[inline]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

/// A response from the shared secret provider.
#[derive(Builder, Clone, Debug)]
pub struct GetSharedSecretResponse {
    /// The shared secret of the application.
    pub(crate) shared_secret: SharedSecret,
}

impl GetSharedSecretResponse {
    /// Create a [GetSharedSecretResponseBuilder] to construct a [GetSharedSecretResponse].
    #[inline]
    pub fn builder() -> GetSharedSecretResponseBuilder {
        GetSharedSecretResponseBuilder::default()
    }

    /// Retrieve the shared secret.
    #[inline]
    pub fn shared_secret(&self) -> &SharedSecret {
        &self.shared_secret
    }
}

/// Create a Service that wraps a function that can produce a shared secret.
///
/// The function should return [`SignatureError::UnknownApplication`] (boxed) for identifiers it does not know; any
/// other error is treated as an internal failure.
pub fn service_for_shared_secret_fn<F, Fut>(f: F) -> ServiceFn<F>
where
    F: FnMut(GetSharedSecretRequest) -> Fut + Send + 'static,
    Fut: Future<Output = Result<GetSharedSecretResponse, BoxError>> + Send + 'static,
{
    service_fn(f)
}
