use {
    base64::{engine::general_purpose::STANDARD, Engine},
    hmac::{digest::InvalidLength, Hmac, Mac},
    md5::{Digest, Md5},
    sha2::Sha256,
};

/// Length of a SHA-256 digest in bytes.
pub(crate) const SHA256_OUTPUT_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 over `value` using `key`.
#[inline(always)]
pub(crate) fn hmac_sha256(key: &[u8], value: &[u8]) -> Result<[u8; SHA256_OUTPUT_LEN], InvalidLength> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)?;
    mac.update(value);
    let mut result = [0; SHA256_OUTPUT_LEN];
    result.copy_from_slice(mac.finalize().into_bytes().as_slice());
    Ok(result)
}

/// Base64 (standard alphabet, padded) of the MD5 digest of `body`.
///
/// An empty body yields an empty string rather than the digest of zero bytes.
pub(crate) fn body_md5_base64(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }

    STANDARD.encode(Md5::digest(body))
}

#[inline(always)]
pub(crate) fn base64_encode(value: &[u8]) -> String {
    STANDARD.encode(value)
}

#[inline(always)]
pub(crate) fn base64_decode(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(value)
}

#[cfg(test)]
mod tests {
    use super::{base64_decode, base64_encode, body_md5_base64, hmac_sha256};

    #[test_log::test]
    fn test_body_digest() {
        assert_eq!(body_md5_base64(b""), "");
        // MD5("hello") = 5d41402abc4b2a76b9719d911017c592
        assert_eq!(body_md5_base64(b"hello"), "XUFAKrxLKna5cZ2REBfFkg==");
    }

    #[test_log::test]
    fn test_hmac_rfc4231_case_2() {
        let tag = hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(base64_encode(&tag), "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
    }

    #[test_log::test]
    fn test_base64_decode() {
        assert_eq!(base64_decode("aGVsbG8=").unwrap(), b"hello");
        assert!(base64_decode("not base64!").is_err());
    }
}
