//! Identifier generation for traces, spans, and requests.

use uuid::Uuid;

/// New trace identifier: 32 lowercase hex characters.
#[must_use]
pub fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// New span identifier: 16 lowercase hex characters.
#[must_use]
pub fn new_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

/// New request identifier: hyphenated UUID v4.
#[must_use]
pub fn new_request_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}
