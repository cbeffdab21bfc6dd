//! Cached response items and header filtering.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header names never stored with a cached response (lowercase)
///
/// These are connection-scoped, describe the original exchange, or would
/// contradict a body replayed later.
pub const EXCLUDED_HEADERS: &[&str] = &[
    "date",
    "connection",
    "transfer-encoding",
    "content-length",
    "server",
    "via",
    "alt-svc",
    "cf-ray",
    "cf-cache-status",
    "cf-connecting-ip",
    "cf-worker",
    "x-real-ip",
    "x-forwarded-for",
    "x-forwarded-proto",
    "x-request-id",
    "x-request-start",
    "x-response-time",
    "x-runtime",
];

/// Whether a header name is excluded from cached items
#[must_use]
pub fn is_excluded_header(name: &str) -> bool {
    EXCLUDED_HEADERS
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(name))
}

/// A cached response: body plus filtered headers
///
/// Header names are lowercase and never include an excluded name. Items are
/// immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CacheRecord")]
pub struct CacheItem {
    #[serde(with = "base64_body")]
    body: Vec<u8>,
    headers: BTreeMap<String, Vec<String>>,
}

/// Wire shape of an item, re-filtered when decoded
#[derive(Deserialize)]
struct CacheRecord {
    #[serde(with = "base64_body")]
    body: Vec<u8>,
    #[serde(default)]
    headers: BTreeMap<String, Vec<String>>,
}

impl From<CacheRecord> for CacheItem {
    fn from(record: CacheRecord) -> Self {
        Self::new(record.body, record.headers)
    }
}

impl CacheItem {
    /// Build an item, dropping excluded headers and lowercasing names
    pub fn new<I, K>(body: impl Into<Vec<u8>>, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: AsRef<str>,
    {
        let mut filtered: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, values) in headers {
            let name = name.as_ref();
            if is_excluded_header(name) {
                continue;
            }
            filtered
                .entry(name.to_ascii_lowercase())
                .or_default()
                .extend(values);
        }

        Self {
            body: body.into(),
            headers: filtered,
        }
    }

    /// Build an item from a response body and its header map
    ///
    /// Values that are not valid UTF-8 are dropped.
    pub fn from_response(body: impl Into<Vec<u8>>, headers: &HeaderMap) -> Self {
        let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                grouped
                    .entry(name.as_str())
                    .or_default()
                    .push(value.to_string());
            }
        }
        Self::new(body, grouped)
    }

    /// An item with no headers
    pub fn body_only(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    /// The response body
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The filtered headers
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// Rebuild a header map for replay, skipping anything unrepresentable
    #[must_use]
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, values) in &self.headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            for value in values {
                if let Ok(value) = HeaderValue::from_str(value) {
                    map.append(name.clone(), value);
                }
            }
        }
        map
    }

    /// Consume the item
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, BTreeMap<String, Vec<String>>) {
        (self.body, self.headers)
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
