use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::message::request::Request;
use crate::message::response::{BoxResponse, Response};
use crate::{CourierError, Result};

static NEXT_REQUEST_KEY: AtomicU64 = AtomicU64::new(1);

/// Surrogate identity of one request instance within the engine.
///
/// Assigned when a request enters a batch. Two field-for-field identical
/// request objects still get distinct keys: responses are reconciled by
/// instance identity, never by structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(u64);

impl RequestKey {
    pub(crate) fn next() -> Self {
        Self(NEXT_REQUEST_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request together with its assigned identity key.
pub struct KeyedRequest {
    pub key: RequestKey,
    pub request: Box<dyn Request>,
}

/// Ordered collection of keyed requests handed to the send pipeline.
#[derive(Default)]
pub struct RequestBatch {
    items: Vec<KeyedRequest>,
}

impl RequestBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request, assigning and returning its identity key.
    pub fn push(&mut self, request: Box<dyn Request>) -> RequestKey {
        let key = RequestKey::next();
        self.items.push(KeyedRequest { key, request });
        key
    }

    /// Adds a request under a key assigned earlier (deferred sends keep the
    /// key handed out at queue time).
    pub(crate) fn push_keyed(&mut self, key: RequestKey, request: Box<dyn Request>) {
        self.items.push(KeyedRequest { key, request });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyedRequest> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, KeyedRequest> {
        self.items.iter_mut()
    }

    pub fn keys(&self) -> Vec<RequestKey> {
        self.items.iter().map(|item| item.key).collect()
    }

    pub fn into_items(self) -> Vec<KeyedRequest> {
        self.items
    }
}

/// Identity-keyed result map from a dispatched batch.
#[derive(Default, Debug)]
pub struct ResponsesGroup {
    entries: HashMap<RequestKey, BoxResponse>,
}

impl ResponsesGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: RequestKey, response: BoxResponse) {
        self.entries.insert(key, response);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: RequestKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> Vec<RequestKey> {
        self.entries.keys().copied().collect()
    }

    pub fn get(&self, key: RequestKey) -> Option<&dyn Response> {
        self.entries.get(&key).map(|response| response.as_ref())
    }

    /// Typed view of one response.
    pub fn get_as<T: Response + 'static>(&self, key: RequestKey) -> Result<&T> {
        let response = self.entries.get(&key).ok_or_else(|| {
            CourierError::Contract(format!("no response recorded for request {key}"))
        })?;
        let actual = response.type_name();
        response.as_any().downcast_ref::<T>().ok_or_else(|| {
            CourierError::Contract(format!(
                "response for request {key} is {actual}, expected {}",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn take(&mut self, key: RequestKey) -> Option<BoxResponse> {
        self.entries.remove(&key)
    }

    /// Removes and downcasts one response.
    pub fn take_as<T: Response + 'static>(&mut self, key: RequestKey) -> Result<T> {
        let response = self.entries.remove(&key).ok_or_else(|| {
            CourierError::Contract(format!("no response recorded for request {key}"))
        })?;
        let actual = response.type_name();
        match response.into_any().downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(_) => Err(CourierError::Contract(format!(
                "response for request {key} is {actual}, expected {}",
                std::any::type_name::<T>()
            ))),
        }
    }

    /// Absorbs another group, e.g. when merging per-processor results.
    pub fn merge(&mut self, other: ResponsesGroup) {
        self.entries.extend(other.entries);
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::message::request::{Request, RequestInfo};
    use crate::message::response::ResponseInfo;

    struct Blank {
        info: RequestInfo,
    }

    impl Blank {
        fn new() -> Self {
            Self {
                info: RequestInfo::new(),
            }
        }
    }

    impl Request for Blank {
        fn request_info(&self) -> &RequestInfo {
            &self.info
        }

        fn request_info_mut(&mut self) -> &mut RequestInfo {
            &mut self.info
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct BlankResponse {
        info: ResponseInfo,
    }

    impl Response for BlankResponse {
        fn response_info(&self) -> &ResponseInfo {
            &self.info
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
            self
        }
    }

    #[test]
    fn identical_requests_get_distinct_keys() {
        let mut batch = RequestBatch::new();
        let first = batch.push(Box::new(Blank::new()));
        let second = batch.push(Box::new(Blank::new()));
        assert_ne!(first, second);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn take_as_reports_type_mismatches() {
        let mut batch = RequestBatch::new();
        let key = batch.push(Box::new(Blank::new()));

        let mut group = ResponsesGroup::new();
        group.insert(
            key,
            Box::new(BlankResponse {
                info: ResponseInfo::default(),
            }),
        );

        #[derive(Debug)]
        struct OtherResponse;
        impl Response for OtherResponse {
            fn response_info(&self) -> &ResponseInfo {
                unreachable!()
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
                self
            }
        }

        let err = group.take_as::<OtherResponse>(key).unwrap_err();
        assert!(err.to_string().contains("BlankResponse"));
    }
}
