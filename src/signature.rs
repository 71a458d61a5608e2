use {
    crate::{
        auth::{verify, AuthorizationCredential},
        body::IntoRequestBytes,
        canonical::{absolute_uri, body_digest, build_canonical_string},
        constants::*,
        CallerIdentity, GetSharedSecretRequest, GetSharedSecretResponse, ReplayGuard, SignatureError,
    },
    bytes::Bytes,
    chrono::{DateTime, Utc},
    http::{
        header::AUTHORIZATION,
        request::{Parts, Request},
    },
    log::{debug, error, info, trace},
    scratchstack_errors::ServiceError,
    std::future::Future,
    tower::{BoxError, Service, ServiceExt},
};

/// Options that affect how a request is authenticated.
#[derive(Clone, Debug)]
pub struct SignatureOptions {
    /// The Authorization scheme token, e.g. `amx`.
    pub scheme: String,

    /// The scheme used to rebuild the absolute URI of origin-form requests.
    pub uri_scheme: String,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_AUTH_SCHEME.to_string(),
            uri_scheme: DEFAULT_URI_SCHEME.to_string(),
        }
    }
}

/// Authenticate an HTTP request.
///
/// The request moves through these checks in order, and the first failure ends it:
/// 1. The Authorization header is parsed. Nothing else is consulted if it is missing or malformed.
/// 2. The application is resolved through `get_shared_secret`.
/// 3. The replay guard checks the timestamp and records the nonce.
/// 4. The body is read, the canonical string is built, and the signature is verified.
///
/// On success this returns the request headers (as HTTP [`Parts`]), the request body (as a [`Bytes`] object, which is
/// empty if no body was provided), and the [`CallerIdentity`].
///
/// # Parameters
/// * `request` - The HTTP [`Request`] to authenticate.
/// * `get_shared_secret` - A service that can provide the shared secret of an application.
/// * `replay_guard` - The freshness and nonce check shared by all requests.
/// * `server_timestamp` - The time the request was received. Usually this is the current time, `Utc::now()`.
/// * `options` - The scheme token and URI reconstruction settings.
///
/// # Errors
/// Every failure is a [`SignatureError`]; all of them should be reported to the caller as `401 Unauthorized`. Each
/// rejection is logged at `info` level with its reason.
pub async fn validate_request<B, G, F>(
    request: Request<B>,
    get_shared_secret: &mut G,
    replay_guard: &ReplayGuard,
    server_timestamp: DateTime<Utc>,
    options: &SignatureOptions,
) -> Result<(Parts, Bytes, CallerIdentity), SignatureError>
where
    B: IntoRequestBytes,
    G: Service<GetSharedSecretRequest, Response = GetSharedSecretResponse, Error = BoxError, Future = F> + Send,
    F: Future<Output = Result<GetSharedSecretResponse, BoxError>> + Send,
{
    let (parts, body) = request.into_parts();
    let mut app_id = None;

    let result =
        authenticate(&parts, body, &mut app_id, get_shared_secret, replay_guard, server_timestamp, options).await;

    match result {
        Ok((body, identity)) => {
            debug!("Authenticated application {} for {} {}", identity, parts.method, parts.uri);
            Ok((parts, body, identity))
        }
        Err(e) => {
            let app_id = app_id.as_deref().unwrap_or("-");
            let code = e.error_code();
            match e {
                // Store or nonce backend failure.
                SignatureError::IO(_) | SignatureError::InternalFailure(_) => {
                    error!("Rejected {} {} for application {}: {}: {}", parts.method, parts.uri, app_id, code, e)
                }
                _ => info!("Rejected {} {} for application {}: {}: {}", parts.method, parts.uri, app_id, code, e),
            }
            Err(e)
        }
    }
}

async fn authenticate<B, G, F>(
    parts: &Parts,
    body: B,
    app_id_out: &mut Option<String>,
    get_shared_secret: &mut G,
    replay_guard: &ReplayGuard,
    server_timestamp: DateTime<Utc>,
    options: &SignatureOptions,
) -> Result<(Bytes, CallerIdentity), SignatureError>
where
    B: IntoRequestBytes,
    G: Service<GetSharedSecretRequest, Response = GetSharedSecretResponse, Error = BoxError, Future = F> + Send,
    F: Future<Output = Result<GetSharedSecretResponse, BoxError>> + Send,
{
    // Header parsing.
    let header = match parts.headers.get(AUTHORIZATION) {
        None => return Err(SignatureError::MalformedHeader(MSG_MISSING_AUTHORIZATION.to_string())),
        Some(value) => value.to_str().map_err(|_| {
            SignatureError::MalformedHeader("Authorization header is not valid ASCII".to_string())
        })?,
    };
    let credential = AuthorizationCredential::parse(header, &options.scheme)?;
    *app_id_out = Some(credential.app_id().to_string());
    let uri = absolute_uri(parts, &options.uri_scheme)?;
    trace!("authenticate: credential {:?} for {}", credential, uri);

    // Application lookup.
    let req = GetSharedSecretRequest::builder()
        .app_id(credential.app_id())
        .build()
        .map_err(|e| SignatureError::InternalFailure(Box::new(e)))?;
    let response = get_shared_secret.oneshot(req).await.map_err(SignatureError::from)?;

    // Freshness and replay.
    replay_guard.check_and_record(credential.nonce(), credential.timestamp(), server_timestamp.timestamp()).await?;

    // Signature.
    let body = body.into_request_bytes().await.map_err(SignatureError::from)?;
    let canonical = build_canonical_string(
        credential.app_id(),
        parts.method.as_str(),
        &uri,
        credential.timestamp_text(),
        credential.nonce(),
        &body_digest(&body),
    );
    trace!("Canonical string: {}", canonical);

    if !verify(&credential, &canonical, response.shared_secret())? {
        return Err(SignatureError::SignatureMismatch(MSG_REQUEST_SIGNATURE_MISMATCH.to_string()));
    }

    Ok((body, CallerIdentity::new(credential.app_id())))
}
