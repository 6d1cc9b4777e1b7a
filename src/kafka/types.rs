use rdkafka::message::{BorrowedMessage, Headers as _, Message as _};

use crate::error::DeliveryError;

/// Desired shape of a topic. Identity is the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
        }
    }
}

/// Ordered message headers. Names may repeat and values may be null,
/// matching what Kafka itself allows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, Option<Vec<u8>>)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.push((name.into(), Some(value.into())));
    }

    /// Appends a header without a value
    pub fn push_null(&mut self, name: impl Into<String>) {
        self.0.push((name.into(), None));
    }

    /// First value stored under `name`
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// First value under `name` decoded as UTF-8
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn count(&self, name: &str) -> usize {
        self.0.iter().filter(|(key, _)| key == name).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[u8]>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A broker message owned by the courier core.
///
/// The consumer owns it until it is processed or handed to the dead-letter
/// router, which only rewrites `topic` and `partition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    /// `None` means "any partition" when producing
    pub partition: Option<i32>,
    /// `None` for messages that have not been written yet
    pub offset: Option<i64>,
    pub key: Option<Vec<u8>>,
    /// `None` is a null value (tombstone), distinct from an empty one
    pub value: Option<Vec<u8>>,
    pub headers: Headers,
}

impl Message {
    /// Outgoing message for `topic` with the partition left to the broker
    pub fn new(topic: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            offset: None,
            key: None,
            value: Some(value),
            headers: Headers::new(),
        }
    }

    /// Outgoing message with a null value
    pub fn tombstone(topic: impl Into<String>) -> Self {
        Self {
            value: None,
            ..Self::new(topic, Vec::new())
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}

impl From<&BorrowedMessage<'_>> for Message {
    fn from(msg: &BorrowedMessage<'_>) -> Self {
        let mut headers = Headers::new();
        if let Some(borrowed) = msg.headers() {
            for header in borrowed.iter() {
                headers
                    .0
                    .push((header.key.to_string(), header.value.map(<[u8]>::to_vec)));
            }
        }

        Self {
            topic: msg.topic().to_string(),
            partition: Some(msg.partition()),
            offset: Some(msg.offset()),
            key: msg.key().map(<[u8]>::to_vec),
            value: msg.payload().map(<[u8]>::to_vec),
            headers,
        }
    }
}

/// Broker acknowledgement for one enqueued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

pub type DeliveryReport = Result<Delivered, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_keep_insertion_order_and_duplicates() {
        let mut headers = Headers::new();
        headers.push("X-Tenant-Id", "acme");
        headers.push("X-Trace", "a");
        headers.push("X-Trace", "b");

        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["X-Tenant-Id", "X-Trace", "X-Trace"]);
        assert_eq!(headers.get_str("X-Trace"), Some("a"));
        assert_eq!(headers.count("X-Trace"), 2);
        assert_eq!(headers.get("missing"), None);
    }

    #[test]
    fn test_new_message_targets_any_partition() {
        let msg = Message::new("orders", b"{}".to_vec()).with_key("order-1");
        assert_eq!(msg.partition, None);
        assert_eq!(msg.offset, None);
        assert_eq!(msg.key.as_deref(), Some(&b"order-1"[..]));
    }

    #[test]
    fn test_tombstone_has_null_value() {
        let msg = Message::tombstone("orders");
        assert_eq!(msg.value, None);
        assert_ne!(msg, Message::new("orders", Vec::new()));
    }
}
