//! The `amx_hmac_signature` crate authenticates HTTP requests signed with a per-application shared secret using
//! HMAC-SHA256, with protection against replayed requests.
//!
//! A caller signs each request and sends the result in the Authorization header:
//!
//! ```text
//! Authorization: amx <appId>:<base64 signature>:<nonce>:<unix timestamp>
//! ```
//!
//! The signature covers the application identifier, the HTTP method, the absolute request URI, the timestamp, the
//! nonce, and an MD5 digest of the body. See [`canonical`] for the exact construction.
//!
//! # Workflow
//! On the server, a request is accepted only if:
//! 1. The Authorization header has the expected scheme and exactly four non-empty fields.
//! 2. The application is registered.
//! 3. The timestamp is within the freshness window of the server clock, and the nonce has not been used within that
//!    window.
//! 4. The signature matches.
//!
//! Every failure is reported to the caller as `401 Unauthorized` with a `WWW-Authenticate` challenge; the specific
//! reason is only logged.
//!
//! Most servers want [`AuthLayer`] and [`ChallengeLayer`]. [`validate_request`] is the framework-independent entry
//! point they are built on.
//!
//! ## Example
//! ```rust
//! use amx_hmac_signature::{
//!     sign_request, validate_request, RegisteredApp, RegisteredAppStore, ReplayGuard, SharedSecret, SignatureOptions,
//! };
//! use chrono::Utc;
//! use http::Request;
//!
//! const APP_ID: &str = "app1";
//! const SHARED_SECRET: &str = "c2VjcmV0";
//!
//! # tokio_test::block_on(async {
//! // Normally the store is loaded from a registered-applications file.
//! let mut store = RegisteredAppStore::from_apps(vec![RegisteredApp::new(APP_ID, SHARED_SECRET)]).unwrap();
//! let guard = ReplayGuard::in_memory(300, 60);
//! let now = Utc::now();
//!
//! // The client signs the absolute URI it is calling.
//! let credential = sign_request(
//!     APP_ID,
//!     &SharedSecret::new(SHARED_SECRET),
//!     "GET",
//!     "https://api.example.com/api/pdf/5/u1",
//!     now.timestamp(),
//!     "n1",
//!     b"",
//! )
//! .unwrap();
//!
//! // The server sees an origin-form URI and rebuilds the absolute URI from the Host header.
//! let req = Request::get("/api/pdf/5/u1")
//!     .header("Host", "api.example.com")
//!     .header("Authorization", credential.to_header_value("amx"))
//!     .body(())
//!     .unwrap();
//!
//! let (_parts, _body, identity) =
//!     validate_request(req, &mut store, &guard, now, &SignatureOptions::default()).await.unwrap();
//! assert_eq!(identity.app_id(), APP_ID);
//! # });
//! ```
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(rustdoc::missing_crate_level_docs)]

mod auth;
mod body;
pub mod canonical;
mod challenge;
mod config;
mod constants;
mod credential_store;
mod crypto;
mod error;
mod identity;
mod replay;
mod service;
mod shared_secret;
mod signature;

pub use {
    auth::{compute_signature, sign_request, verify, AuthorizationCredential},
    body::IntoRequestBytes,
    canonical::{body_digest, build_canonical_string, normalize_uri},
    challenge::{ChallengeLayer, ChallengeService},
    config::{AuthConfig, AuthConfigBuilder, AuthConfigBuilderError},
    credential_store::{RegisteredApp, RegisteredAppStore},
    error::{CredentialStoreError, SignatureError},
    identity::CallerIdentity,
    replay::{InMemoryNonceStore, NonceRecord, NonceStore, ReplayGuard},
    service::{AuthLayer, AuthService, ErrorMapper, UnauthorizedErrorMapper},
    shared_secret::{
        service_for_shared_secret_fn, GetSharedSecretRequest, GetSharedSecretRequestBuilder,
        GetSharedSecretRequestBuilderError, GetSharedSecretResponse, GetSharedSecretResponseBuilder,
        GetSharedSecretResponseBuilderError, SharedSecret,
    },
    signature::{validate_request, SignatureOptions},
};
