//! Outbound request descriptor
//!
//! Built once per call and borrowed by the dispatcher, which may send it a
//! second time after a refresh. The body is serialized up front so the replay
//! is byte-identical.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::error::{ApiError, Result};

/// Cache behaviour requested from intermediaries, sent as `Cache-Control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDirective {
    NoStore,
    NoCache,
    MaxAge(u32),
}

impl CacheDirective {
    pub fn header_value(&self) -> HeaderValue {
        match self {
            CacheDirective::NoStore => HeaderValue::from_static("no-store"),
            CacheDirective::NoCache => HeaderValue::from_static("no-cache"),
            CacheDirective::MaxAge(secs) => HeaderValue::from_str(&format!("max-age={secs}"))
                .unwrap_or_else(|_| HeaderValue::from_static("no-cache")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    headers: HeaderMap,
    cache: Option<CacheDirective>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            cache: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ApiError::transport(format!("encoding request body: {e}")))?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Add a header override. Replaces the default for the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a query pair. Pairs are sent in insertion order.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn cache(mut self, directive: CacheDirective) -> Self {
        self.cache = Some(directive);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn header_overrides(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cache_directive(&self) -> Option<CacheDirective> {
        self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    #[test]
    fn json_body_is_serialized_once() {
        let descriptor = RequestDescriptor::post("/agendamento")
            .json(&serde_json::json!({"status": "CONFIRMADO"}))
            .unwrap();
        assert_eq!(descriptor.method(), &Method::POST);
        assert_eq!(descriptor.body(), Some(br#"{"status":"CONFIRMADO"}"#.as_slice()));
    }

    #[test]
    fn later_header_override_wins() {
        let descriptor = RequestDescriptor::get("/x")
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        assert_eq!(
            descriptor.header_overrides().get(CONTENT_TYPE).unwrap(),
            "application/xml"
        );
    }

    #[test]
    fn cache_directives_render() {
        assert_eq!(CacheDirective::NoStore.header_value(), "no-store");
        assert_eq!(CacheDirective::NoCache.header_value(), "no-cache");
        assert_eq!(CacheDirective::MaxAge(60).header_value(), "max-age=60");
    }

    #[test]
    fn query_pairs_keep_order() {
        let descriptor = RequestDescriptor::get("/agendamento")
            .query("status", "AGENDADO")
            .query("medicoId", "m1");
        assert_eq!(
            descriptor.query_pairs(),
            &[
                ("status".to_string(), "AGENDADO".to_string()),
                ("medicoId".to_string(), "m1".to_string()),
            ]
        );
    }
}
