//! Request signing
//!
//! Two unrelated canonicalization rules live here and must not be mixed:
//! gateway calls sort their parameters, token-endpoint calls sign the JSON
//! body exactly as serialized. Both are pure and recomputed per request.

pub mod aliyun;
pub mod vendor_oauth;

use hmac::{Hmac, Mac};
use mowerlink_domain::{ClientError, Result};
use sha2::Sha256;

pub use aliyun::{canonical_string, AliyunSigner, SignedRequest};
pub use vendor_oauth::{OAuthSignature, OAuthSigner};

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ClientError::Config(format!("unusable signing key: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}
