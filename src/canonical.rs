//! Canonical string construction.
//!
//! The signed message is the concatenation, with no separators, of:
//!
//! ```text
//! appId || method || encode(lowercase(absoluteUri)) || timestamp || nonce || base64(md5(body))
//! ```
//!
//! The body digest is the empty string when the body is empty.
//!
//! **Stability of this module is not guaranteed except for items exposed at the crate root**.

use {
    crate::{constants::*, crypto::body_md5_base64, SignatureError},
    http::{header::HOST, request::Parts},
    percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC},
    qualifier_attr::qualifiers,
};

/// Characters left untouched by form encoding: ASCII alphanumerics plus `-_.!*()`.
/// Space is handled separately since it becomes `+`.
const FORM_ENCODE_SET: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'!').remove(b'*').remove(b'(').remove(b')');

/// Lower-case and form-encode an absolute URI.
///
/// Signer and verifier must both apply exactly this normalization, so differences in case or in
/// existing percent-escapes never cause a mismatch.
pub fn normalize_uri(absolute_uri: &str) -> String {
    let lowered = absolute_uri.to_lowercase();
    let mut result = String::with_capacity(lowered.len() * 2);

    for (i, part) in lowered.split(' ').enumerate() {
        if i > 0 {
            result.push('+');
        }
        result.extend(utf8_percent_encode(part, FORM_ENCODE_SET));
    }

    result
}

/// Build the canonical string to sign.
///
/// `body_digest` is the value produced by [`body_digest`]. The method is used as-is; the timestamp is the text that
/// appeared in the Authorization header.
pub fn build_canonical_string(
    app_id: &str,
    method: &str,
    absolute_uri: &str,
    timestamp: &str,
    nonce: &str,
    body_digest: &str,
) -> String {
    let uri = normalize_uri(absolute_uri);
    let mut result = String::with_capacity(
        app_id.len() + method.len() + uri.len() + timestamp.len() + nonce.len() + body_digest.len(),
    );

    result.push_str(app_id);
    result.push_str(method);
    result.push_str(&uri);
    result.push_str(timestamp);
    result.push_str(nonce);
    result.push_str(body_digest);
    result
}

/// Base64 of the MD5 digest of the request body, or the empty string for an empty body.
#[inline]
pub fn body_digest(body: &[u8]) -> String {
    body_md5_base64(body)
}

/// Reconstruct the absolute URI of a request.
///
/// Absolute-form request targets are used as-is. Origin-form targets (path only) are prefixed with
/// `<uri_scheme>://<Host>`. An explicit port equal to the scheme's default (80 for http, 443 for https) is dropped.
#[cfg_attr(any(doc, feature = "unstable"), qualifiers(pub))]
#[cfg_attr(not(any(doc, feature = "unstable")), qualifiers(pub(crate)))]
fn absolute_uri(parts: &Parts, uri_scheme: &str) -> Result<String, SignatureError> {
    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let path_and_query = if path_and_query.is_empty() {
        "/"
    } else {
        path_and_query
    };

    if let (Some(scheme), Some(authority)) = (parts.uri.scheme_str(), parts.uri.authority()) {
        let authority = without_default_port(scheme, authority.as_str());
        return Ok(format!("{}://{}{}", scheme, authority, path_and_query));
    }

    let host = parts
        .headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| SignatureError::MalformedHeader(MSG_MISSING_HOST.to_string()))?;

    Ok(format!("{}://{}{}", uri_scheme, without_default_port(uri_scheme, host), path_and_query))
}

fn without_default_port<'a>(scheme: &str, authority: &'a str) -> &'a str {
    let default_port = if scheme.eq_ignore_ascii_case("https") {
        "443"
    } else if scheme.eq_ignore_ascii_case("http") {
        "80"
    } else {
        return authority;
    };

    match authority.rsplit_once(':') {
        Some((host, port)) if port == default_port && !host.is_empty() => host,
        _ => authority,
    }
}
