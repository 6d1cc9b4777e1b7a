use std::collections::HashMap;

use super::types::{Headers, Message};

pub const TENANT_ID_HEADER: &str = "X-Tenant-Id";
pub const AUTHOR_HEADER: &str = "X-Author";
pub const AUTHOR_ID_HEADER: &str = "X-Author-Id";
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

/// Headers propagated from the request context onto every published message,
/// in the order they are written.
pub const CORRELATION_HEADERS: [&str; 4] = [
    TENANT_ID_HEADER,
    AUTHOR_HEADER,
    AUTHOR_ID_HEADER,
    CORRELATION_ID_HEADER,
];

/// Ambient metadata of the request being served (tenant, author, correlation id).
///
/// Lookups go by well-known header name. Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    values: HashMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_tenant_id(self, tenant_id: impl Into<String>) -> Self {
        self.with(TENANT_ID_HEADER, tenant_id)
    }

    pub fn with_author(self, author: impl Into<String>) -> Self {
        self.with(AUTHOR_HEADER, author)
    }

    pub fn with_author_id(self, author_id: impl Into<String>) -> Self {
        self.with(AUTHOR_ID_HEADER, author_id)
    }

    pub fn with_correlation_id(self, correlation_id: impl Into<String>) -> Self {
        self.with(CORRELATION_ID_HEADER, correlation_id)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.get(TENANT_ID_HEADER)
    }

    pub fn author_id(&self) -> Option<&str> {
        self.get(AUTHOR_ID_HEADER)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.get(CORRELATION_ID_HEADER)
    }

    /// Picks the correlation headers out of an inbound message
    pub fn from_headers(headers: &Headers) -> Self {
        CORRELATION_HEADERS
            .iter()
            .filter_map(|name| headers.get_str(name).map(|value| (*name, value)))
            .fold(Self::new(), |ctx, (name, value)| ctx.with(name, value))
    }

    /// Outgoing header set: every known key present in the context, plus a
    /// freshly generated correlation id when the context has none.
    ///
    /// The result always holds exactly one non-empty correlation id.
    pub fn to_headers(&self) -> Headers {
        let mut headers = Headers::new();
        for name in CORRELATION_HEADERS {
            if let Some(value) = self.get(name) {
                headers.push(name, value);
            }
        }

        if self.correlation_id().is_none() {
            headers.push(CORRELATION_ID_HEADER, uuid::Uuid::new_v4().to_string());
        }

        headers
    }
}

/// Execution context of one handler attempt.
///
/// Built fresh for every attempt and dropped when the handler returns.
#[derive(Debug)]
pub struct ProcessingContext<'a> {
    pub message: &'a Message,
    /// Attempts left including this one
    pub remaining_retries: u32,
    /// Set when the consumer runs without any retry budget
    pub faulted: bool,
    /// 1-based attempt number
    pub attempt: u32,
    pub request: RequestContext,
}

impl<'a> ProcessingContext<'a> {
    pub(crate) fn new(message: &'a Message, remaining_retries: u32, attempt: u32) -> Self {
        Self {
            message,
            remaining_retries,
            faulted: remaining_retries == 0,
            attempt,
            request: RequestContext::from_headers(&message.headers),
        }
    }

    /// Deserializes the message value as JSON; a null value is an empty document
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(self.message.value.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_correlation_id_once_when_missing() {
        let ctx = RequestContext::new().with_tenant_id("acme");
        let headers = ctx.to_headers();

        assert_eq!(headers.count(CORRELATION_ID_HEADER), 1);
        let generated = headers.get_str(CORRELATION_ID_HEADER).unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());
        assert_eq!(headers.get_str(TENANT_ID_HEADER), Some("acme"));
    }

    #[test]
    fn test_keeps_existing_correlation_id() {
        let ctx = RequestContext::new().with_correlation_id("req-42");
        let headers = ctx.to_headers();

        assert_eq!(headers.count(CORRELATION_ID_HEADER), 1);
        assert_eq!(headers.get_str(CORRELATION_ID_HEADER), Some("req-42"));
    }

    #[test]
    fn test_empty_correlation_id_is_replaced_not_duplicated() {
        let ctx = RequestContext::new().with_correlation_id("");
        let headers = ctx.to_headers();

        assert_eq!(headers.count(CORRELATION_ID_HEADER), 1);
        assert!(!headers.get_str(CORRELATION_ID_HEADER).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_keys_are_not_propagated() {
        let ctx = RequestContext::new()
            .with("X-Internal-Flag", "1")
            .with_author("jo")
            .with_author_id("u-1");
        let headers = ctx.to_headers();

        assert_eq!(headers.get("X-Internal-Flag"), None);
        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec![AUTHOR_HEADER, AUTHOR_ID_HEADER, CORRELATION_ID_HEADER]);
    }

    #[test]
    fn test_processing_context_reads_inbound_headers() {
        let mut headers = Headers::new();
        headers.push(TENANT_ID_HEADER, "acme");
        headers.push(CORRELATION_ID_HEADER, "req-7");
        let msg = Message::new("orders", br#"{"id":1}"#.to_vec()).with_headers(headers);

        let ctx = ProcessingContext::new(&msg, 3, 1);
        assert_eq!(ctx.request.tenant_id(), Some("acme"));
        assert_eq!(ctx.request.correlation_id(), Some("req-7"));
        assert!(!ctx.faulted);

        let value: serde_json::Value = ctx.json().unwrap();
        assert_eq!(value["id"], 1);
    }
}
