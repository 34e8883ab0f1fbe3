//! Request signing for the log service API.
//!
//! `Authorization: LOG <access key id>:<signature>` where the signature is the
//! base64 HMAC-SHA1 of:
//!
//! ```text
//! VERB \n CONTENT-MD5 \n CONTENT-TYPE \n DATE \n CanonicalizedLOGHeaders CanonicalizedResource
//! ```

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::LogServiceError;

type HmacSha1 = Hmac<Sha1>;

/// The parts of a request covered by the signature.
pub(crate) struct SignedRequest<'a> {
    pub method: &'a str,
    pub content_md5: &'a str,
    pub content_type: &'a str,
    pub date: &'a str,
    pub headers: &'a BTreeMap<String, String>,
    pub resource: &'a str,
    pub params: &'a [(String, String)],
}

/// `x-log-*` and `x-acs-*` headers, lowercased and sorted, one `key:value\n` each.
fn canonical_headers(headers: &BTreeMap<String, String>) -> String {
    let mut selected: Vec<(String, &str)> = headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
        .filter(|(k, _)| k.starts_with("x-log-") || k.starts_with("x-acs-"))
        .collect();
    selected.sort();
    selected
        .into_iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect()
}

fn canonical_resource(resource: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return resource.to_string();
    }
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    let query = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", resource, query)
}

pub(crate) fn string_to_sign(request: &SignedRequest<'_>) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}{}",
        request.method,
        request.content_md5,
        request.content_type,
        request.date,
        canonical_headers(request.headers),
        canonical_resource(request.resource, request.params)
    )
}

pub(crate) fn signature(secret: &str, request: &SignedRequest<'_>) -> Result<String, LogServiceError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| LogServiceError::Config(e.to_string()))?;
    mac.update(string_to_sign(request).as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Uppercase hex MD5, as carried in `Content-MD5`.
pub(crate) fn content_md5(body: &[u8]) -> String {
    format!("{:X}", md5::compute(body))
}
