//! Tower middleware that authenticates requests before they reach the wrapped service.

use {
    crate::{
        body::IntoRequestBytes,
        signature::{validate_request, SignatureOptions},
        AuthConfig, GetSharedSecretRequest, GetSharedSecretResponse, RegisteredAppStore, ReplayGuard, SignatureError,
    },
    async_trait::async_trait,
    bytes::Bytes,
    chrono::Utc,
    http::{Request, Response},
    scratchstack_errors::ServiceError,
    std::{
        any::type_name,
        fmt::{Debug, Formatter, Result as FmtResult},
        future::Future,
        pin::Pin,
        task::{Context, Poll},
    },
    tower::{BoxError, Layer, Service, ServiceExt},
};

/// Authenticates each request and forwards it to `implementation` with a [`CallerIdentity`][crate::CallerIdentity]
/// in its extensions. Rejected requests never reach `implementation`; `error_handler` produces their response.
///
/// The wrapped service receives the buffered body as [`Bytes`].
#[derive(Clone)]
pub struct AuthService<G, S, E> {
    get_shared_secret: G,
    replay_guard: ReplayGuard,
    options: SignatureOptions,
    implementation: S,
    error_handler: E,
}

impl<G, S, E> AuthService<G, S, E> {
    pub fn new(
        get_shared_secret: G,
        replay_guard: ReplayGuard,
        options: SignatureOptions,
        implementation: S,
        error_handler: E,
    ) -> Self {
        AuthService {
            get_shared_secret,
            replay_guard,
            options,
            implementation,
            error_handler,
        }
    }

    #[inline]
    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay_guard
    }

    #[inline]
    pub fn options(&self) -> &SignatureOptions {
        &self.options
    }
}

impl<G, S, E> Debug for AuthService<G, S, E> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("AuthService")
            .field("get_shared_secret", &type_name::<G>())
            .field("replay_guard", &self.replay_guard)
            .field("options", &self.options)
            .field("implementation", &type_name::<S>())
            .field("error_handler", &type_name::<E>())
            .finish()
    }
}

impl<G, S, E, B, ResBody> Service<Request<B>> for AuthService<G, S, E>
where
    B: IntoRequestBytes + Send + 'static,
    G: Service<GetSharedSecretRequest, Response = GetSharedSecretResponse, Error = BoxError> + Clone + Send + 'static,
    G::Future: Send,
    S: Service<Request<Bytes>, Response = Response<ResBody>, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send,
    E: ErrorMapper<ResBody>,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResBody>, BoxError>> + Send>>;

    fn poll_ready(&mut self, c: &mut Context) -> Poll<Result<(), Self::Error>> {
        match self.get_shared_secret.poll_ready(c) {
            Poll::Ready(Ok(())) => self.implementation.poll_ready(c),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let get_shared_secret = self.get_shared_secret.clone();
        let replay_guard = self.replay_guard.clone();
        let options = self.options.clone();
        let implementation = self.implementation.clone();
        let error_handler = self.error_handler.clone();

        Box::pin(handle_call(req, get_shared_secret, replay_guard, options, implementation, error_handler))
    }
}

async fn handle_call<G, S, E, B, ResBody>(
    req: Request<B>,
    mut get_shared_secret: G,
    replay_guard: ReplayGuard,
    options: SignatureOptions,
    implementation: S,
    error_handler: E,
) -> Result<Response<ResBody>, BoxError>
where
    B: IntoRequestBytes + Send + 'static,
    G: Service<GetSharedSecretRequest, Response = GetSharedSecretResponse, Error = BoxError> + Clone + Send + 'static,
    G::Future: Send,
    S: Service<Request<Bytes>, Response = Response<ResBody>, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send,
    E: ErrorMapper<ResBody>,
    ResBody: Send + 'static,
{
    let result = validate_request(req, &mut get_shared_secret, &replay_guard, Utc::now(), &options).await;

    match result {
        Ok((mut parts, body, identity)) => {
            parts.extensions.insert(identity);
            let req = Request::from_parts(parts, body);
            implementation.oneshot(req).await
        }
        Err(e) => error_handler.map_error(e).await,
    }
}

/// Turns a rejected request into a response.
#[async_trait]
pub trait ErrorMapper<ResBody>: Clone + Send + 'static {
    async fn map_error(self, error: SignatureError) -> Result<Response<ResBody>, BoxError>;
}

/// Maps every rejection to an empty response with the error's status, `401 Unauthorized`.
///
/// The body never says which check failed.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnauthorizedErrorMapper;

#[async_trait]
impl<ResBody> ErrorMapper<ResBody> for UnauthorizedErrorMapper
where
    ResBody: Default + Send + 'static,
{
    async fn map_error(self, error: SignatureError) -> Result<Response<ResBody>, BoxError> {
        Response::builder().status(error.http_status()).body(ResBody::default()).map_err(Into::into)
    }
}

/// A [`Layer`] that wraps services in an [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer<G, E> {
    get_shared_secret: G,
    replay_guard: ReplayGuard,
    options: SignatureOptions,
    error_handler: E,
}

impl<G, E> AuthLayer<G, E> {
    pub fn new(get_shared_secret: G, replay_guard: ReplayGuard, options: SignatureOptions, error_handler: E) -> Self {
        AuthLayer {
            get_shared_secret,
            replay_guard,
            options,
            error_handler,
        }
    }
}

impl AuthLayer<RegisteredAppStore, UnauthorizedErrorMapper> {
    /// Build the standard stack from settings: a lazily loaded [`RegisteredAppStore`], an in-memory
    /// [`ReplayGuard`], and empty 401 responses.
    ///
    /// The registered-applications file is read on the first authenticated request. Every service produced by this
    /// layer shares the same store and nonce table.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            RegisteredAppStore::from_file(config.registered_apps_file.clone()),
            ReplayGuard::in_memory(config.request_max_age_seconds, config.nonce_sweep_interval_seconds),
            SignatureOptions {
                scheme: config.scheme.clone(),
                uri_scheme: config.uri_scheme.clone(),
            },
            UnauthorizedErrorMapper,
        )
    }
}

impl<G, E> Debug for AuthLayer<G, E> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("AuthLayer")
            .field("get_shared_secret", &type_name::<G>())
            .field("replay_guard", &self.replay_guard)
            .field("options", &self.options)
            .field("error_handler", &type_name::<E>())
            .finish()
    }
}

impl<G, E, S> Layer<S> for AuthLayer<G, E>
where
    G: Clone,
    E: Clone,
{
    type Service = AuthService<G, S, E>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService::new(
            self.get_shared_secret.clone(),
            self.replay_guard.clone(),
            self.options.clone(),
            inner,
            self.error_handler.clone(),
        )
    }
}
