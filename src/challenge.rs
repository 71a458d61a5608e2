//! Adds the `WWW-Authenticate` challenge to unauthorized responses.

use {
    crate::AuthConfig,
    http::{
        header::{InvalidHeaderValue, WWW_AUTHENTICATE},
        HeaderValue, Response, StatusCode,
    },
    log::trace,
    std::{
        future::Future,
        pin::Pin,
        task::{Context, Poll},
    },
    tower::{Layer, Service},
};

/// Appends `WWW-Authenticate: <scheme>` to every `401 Unauthorized` response produced by the wrapped service.
///
/// This looks only at the outgoing status. It applies equally to rejections from
/// [`AuthService`][crate::AuthService] and to 401 responses produced further downstream.
#[derive(Clone, Debug)]
pub struct ChallengeService<S> {
    inner: S,
    challenge: HeaderValue,
}

impl<S> ChallengeService<S> {
    pub fn new(inner: S, challenge: HeaderValue) -> Self {
        Self {
            inner,
            challenge,
        }
    }

    #[inline]
    pub fn challenge(&self) -> &HeaderValue {
        &self.challenge
    }
}

impl<S, Req, ResBody> Service<Req> for ChallengeService<S>
where
    S: Service<Req, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ResBody: 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResBody>, S::Error>> + Send>>;

    fn poll_ready(&mut self, c: &mut Context) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(c)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let challenge = self.challenge.clone();
        let future = self.inner.call(req);

        Box::pin(async move {
            let mut response = future.await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                trace!("Adding challenge {:?} to unauthorized response", challenge);
                response.headers_mut().append(WWW_AUTHENTICATE, challenge);
            }
            Ok(response)
        })
    }
}

/// A [`Layer`] that wraps services in a [`ChallengeService`].
#[derive(Clone, Debug)]
pub struct ChallengeLayer {
    challenge: HeaderValue,
}

impl ChallengeLayer {
    /// Create a layer that names `scheme` in its challenge.
    ///
    /// # Errors
    /// Fails if `scheme` cannot appear in an HTTP header value.
    pub fn new(scheme: &str) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            challenge: HeaderValue::from_str(scheme)?,
        })
    }

    /// Create a layer that names the configured scheme.
    pub fn from_config(config: &AuthConfig) -> Result<Self, InvalidHeaderValue> {
        Self::new(&config.scheme)
    }
}

impl<S> Layer<S> for ChallengeLayer {
    type Service = ChallengeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ChallengeService::new(inner, self.challenge.clone())
    }
}
