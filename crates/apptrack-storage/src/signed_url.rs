//! Signed retrieval URLs.

use chrono::{DateTime, Utc};
use http::Method;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Lifetime of every URL issued by the gateway.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(30 * 60);

/// A freshly signed URL plus the window it is valid for.
///
/// Values are never cached or reused: each gateway call signs a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedUrl {
    url: String,
    #[serde(serialize_with = "serialize_method")]
    method: Method,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SignedUrl {
    /// Wrap a URL signed at `issued_at` for `ttl`.
    pub fn new(url: String, method: Method, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::seconds(ttl.as_secs() as i64)
            + chrono::Duration::nanoseconds(i64::from(ttl.subsec_nanos()));
        Self {
            url,
            method,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn into_string(self) -> String {
        self.url
    }

    /// HTTP method the signature is scoped to
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl AsRef<str> for SignedUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl From<SignedUrl> for String {
    fn from(url: SignedUrl) -> Self {
        url.url
    }
}

fn serialize_method<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(method.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_issue_time_plus_ttl() {
        let issued_at = Utc::now();
        let url = SignedUrl::new(
            "https://storage.example.com/b/k?sig=1".to_string(),
            Method::GET,
            issued_at,
            SIGNED_URL_TTL,
        );

        assert_eq!(url.expires_at() - url.issued_at(), chrono::Duration::minutes(30));
        assert!(!url.is_expired_at(issued_at + chrono::Duration::minutes(29)));
        assert!(url.is_expired_at(issued_at + chrono::Duration::minutes(30)));
        assert_eq!(*url.method(), Method::GET);
    }

    #[test]
    fn serializes_method_as_string() {
        let url = SignedUrl::new(
            "https://storage.example.com/b/k".to_string(),
            Method::GET,
            Utc::now(),
            SIGNED_URL_TTL,
        );
        let json = serde_json::to_value(&url).unwrap();
        assert_eq!(json["method"], "GET");
        assert_eq!(json["url"], "https://storage.example.com/b/k");
        assert!(json["expires_at"].is_string());
    }
}
