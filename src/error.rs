use {
    crate::constants::*,
    http::status::StatusCode,
    scratchstack_errors::ServiceError,
    std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
        io::Error as IOError,
    },
};

/// Error returned when an attempt at authenticating a request fails.
///
/// Every variant maps to the same `401 Unauthorized` outcome on the wire. The variant and its message exist only for
/// server-side logs.
#[derive(Debug)]
#[non_exhaustive]
pub enum SignatureError {
    /// The request signature was computed correctly but the nonce has already been accepted within the freshness
    /// window.
    DuplicateNonce(/* message */ String),

    /// Validation failed due to an underlying I/O error, typically while reading the request body.
    IO(IOError),

    /// Validation failed due to an internal failure: the credential store could not be loaded, the shared secret
    /// could not be decoded, or a backing store returned an error.
    InternalFailure(Box<dyn Error + Send + Sync>),

    /// The Authorization header is missing, uses another scheme, or does not contain exactly four non-empty
    /// colon-delimited fields. Sample messages:
    /// `Request is missing Authorization header`
    /// `Authorization parameter must have exactly 4 non-empty colon-delimited fields`
    MalformedHeader(/* message */ String),

    /// The signature supplied by the caller does not match the one computed from the request.
    SignatureMismatch(/* message */ String),

    /// The request timestamp is further from the server clock than the freshness window allows.
    StaleTimestamp(/* message */ String),

    /// The application identifier is not present in the credential store.
    UnknownApplication(/* message */ String),
}

impl SignatureError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateNonce(_) => ERR_CODE_DUPLICATE_NONCE,
            Self::IO(_) | Self::InternalFailure(_) => ERR_CODE_INTERNAL_FAILURE,
            Self::MalformedHeader(_) => ERR_CODE_MALFORMED_HEADER,
            Self::SignatureMismatch(_) => ERR_CODE_SIGNATURE_MISMATCH,
            Self::StaleTimestamp(_) => ERR_CODE_STALE_TIMESTAMP,
            Self::UnknownApplication(_) => ERR_CODE_UNKNOWN_APPLICATION,
        }
    }

    fn http_status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl ServiceError for SignatureError {
    fn error_code(&self) -> &'static str {
        SignatureError::error_code(self)
    }

    fn http_status(&self) -> StatusCode {
        SignatureError::http_status(self)
    }
}

impl Display for SignatureError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::DuplicateNonce(msg) => f.write_str(msg),
            Self::IO(ref e) => Display::fmt(e, f),
            Self::InternalFailure(ref e) => Display::fmt(e, f),
            Self::MalformedHeader(msg) => f.write_str(msg),
            Self::SignatureMismatch(msg) => f.write_str(msg),
            Self::StaleTimestamp(msg) => f.write_str(msg),
            Self::UnknownApplication(msg) => f.write_str(msg),
        }
    }
}

impl Error for SignatureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IO(ref e) => Some(e),
            Self::InternalFailure(ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<IOError> for SignatureError {
    fn from(e: IOError) -> SignatureError {
        SignatureError::IO(e)
    }
}

impl From<Box<dyn Error + Send + Sync>> for SignatureError {
    fn from(e: Box<dyn Error + Send + Sync>) -> SignatureError {
        match e.downcast::<SignatureError>() {
            Ok(sig_err) => *sig_err,
            Err(e) => SignatureError::InternalFailure(e),
        }
    }
}

/// Error returned when the registered-application table cannot be loaded.
#[derive(Debug)]
#[non_exhaustive]
pub enum CredentialStoreError {
    /// The same application identifier appears more than once in the source.
    DuplicateApplication(/* app_id */ String),

    /// The source could not be read.
    IO(IOError),

    /// The source is not a valid JSON list of registered applications.
    Parse(serde_json::Error),
}

impl Display for CredentialStoreError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::DuplicateApplication(app_id) => write!(f, "Duplicate registered application: {}", app_id),
            Self::IO(ref e) => write!(f, "Unable to read registered applications: {}", e),
            Self::Parse(ref e) => write!(f, "Unable to parse registered applications: {}", e),
        }
    }
}

impl Error for CredentialStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IO(ref e) => Some(e),
            Self::Parse(ref e) => Some(e),
            Self::DuplicateApplication(_) => None,
        }
    }
}

impl From<IOError> for CredentialStoreError {
    fn from(e: IOError) -> Self {
        CredentialStoreError::IO(e)
    }
}

impl From<serde_json::Error> for CredentialStoreError {
    fn from(e: serde_json::Error) -> Self {
        CredentialStoreError::Parse(e)
    }
}

#[cfg(test)]
mod tests {
    use {
        crate::{CredentialStoreError, SignatureError},
        scratchstack_errors::ServiceError,
        std::{
            error::Error,
            io::{Error as IOError, ErrorKind},
        },
    };

    #[test_log::test]
    fn test_from() {
        // This just exercises a few codepaths that aren't usually exercised.
        let utf8_error = Box::new(String::from_utf8(b"\x80".to_vec()).unwrap_err());
        let e: SignatureError = (utf8_error as Box<dyn Error + Send + Sync + 'static>).into();
        assert_eq!(e.error_code(), "InternalFailure");
        assert_eq!(e.http_status(), 401);
        assert!(e.source().is_some());

        let e = SignatureError::DuplicateNonce("nonce n1 already used".to_string());
        let e2 = SignatureError::from(Box::new(e) as Box<dyn Error + Send + Sync + 'static>);
        assert_eq!(e2.to_string(), "nonce n1 already used");
        assert_eq!(e2.error_code(), "DuplicateNonce");

        let e = SignatureError::from(IOError::new(ErrorKind::UnexpectedEof, "body truncated"));
        assert_eq!(e.error_code(), "InternalFailure");
        assert_eq!(e.to_string(), "body truncated");
    }

    #[test_log::test]
    fn test_every_kind_is_unauthorized() {
        let errors = vec![
            SignatureError::MalformedHeader("a".to_string()),
            SignatureError::UnknownApplication("b".to_string()),
            SignatureError::DuplicateNonce("c".to_string()),
            SignatureError::StaleTimestamp("d".to_string()),
            SignatureError::SignatureMismatch("e".to_string()),
            SignatureError::InternalFailure("f".into()),
        ];
        let codes: Vec<&str> = errors.iter().map(|e| ServiceError::error_code(e)).collect();
        assert_eq!(
            codes,
            vec![
                "MalformedHeader",
                "UnknownApplication",
                "DuplicateNonce",
                "StaleTimestamp",
                "SignatureMismatch",
                "InternalFailure"
            ]
        );
        for e in errors {
            assert_eq!(ServiceError::http_status(&e), 401);
        }
    }

    #[test_log::test]
    fn test_credential_store_error_display() {
        let e = CredentialStoreError::DuplicateApplication("app1".to_string());
        assert_eq!(e.to_string(), "Duplicate registered application: app1");
        assert!(e.source().is_none());

        let e: CredentialStoreError = serde_json::from_str::<Vec<u32>>("{").unwrap_err().into();
        assert!(e.to_string().starts_with("Unable to parse registered applications: "));
        assert!(e.source().is_some());
    }
}
