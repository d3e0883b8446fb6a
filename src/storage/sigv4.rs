//! AWS Signature Version 4 request signing
//!
//! Covers what a single-chunk `PutObject` needs: the payload is hashed up
//! front and every header already on the request is signed along with
//! `host`.

use super::StoreError;
use crate::secrets::Secret;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const DATE_HEADER: &str = "x-amz-date";
const CONTENT_HASH_HEADER: &str = "x-amz-content-sha256";
const TOKEN_HEADER: &str = "x-amz-security-token";

/// Access key pair, plus a session token for temporary credentials
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub session_token: Option<Secret>,
}

/// Signs requests to S3 in one region
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: AwsCredentials,
    region: String,
}

impl SigV4Signer {
    pub fn new(credentials: AwsCredentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
        }
    }

    /// Add the date, payload hash and `Authorization` headers to `headers`
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        headers: &mut HeaderMap,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hex_sha256(payload);

        headers.insert(HeaderName::from_static(DATE_HEADER), header_value(&amz_date)?);
        headers.insert(
            HeaderName::from_static(CONTENT_HASH_HEADER),
            header_value(&payload_hash)?,
        );
        if let Some(ref token) = self.credentials.session_token {
            headers.insert(HeaderName::from_static(TOKEN_HEADER), header_value(token.expose())?);
        }

        let (canonical_headers, signed_headers) = canonical_headers(url, headers)?;
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            url.path(),
            canonical_query(url),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let secret = format!("AWS4{}", self.credentials.secret_access_key.expose());
        let k_date = hmac_sha256(secret.as_bytes(), &date)?;
        let k_region = hmac_sha256(&k_date, &self.region)?;
        let k_service = hmac_sha256(&k_region, SERVICE)?;
        let k_signing = hmac_sha256(&k_service, "aws4_request")?;
        let signature: String = hmac_sha256(&k_signing, &string_to_sign)?
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
        );
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }
}

/// Lowercased, sorted `name:value` lines and the matching `;`-joined name list
fn canonical_headers(url: &Url, headers: &HeaderMap) -> Result<(String, String), StoreError> {
    let host = url
        .host_str()
        .ok_or_else(|| StoreError::Auth(format!("{} has no host", url)))?;
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut entries = vec![("host".to_string(), host)];
    for (name, value) in headers {
        let value = value
            .to_str()
            .map_err(|e| StoreError::Auth(format!("header {} cannot be signed: {}", name, e)))?;
        entries.push((name.as_str().to_string(), value.trim().to_string()));
    }
    entries.sort();

    let canonical = entries
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect::<String>();
    let signed = entries
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    Ok((canonical, signed))
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (urlencoding::encode(&k).into_owned(), urlencoding::encode(&v).into_owned()))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn hex_sha256(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &str) -> Result<Vec<u8>, StoreError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| StoreError::Auth(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn header_value(value: &str) -> Result<HeaderValue, StoreError> {
    HeaderValue::from_str(value).map_err(|e| StoreError::Auth(format!("invalid header value: {}", e)))
}
