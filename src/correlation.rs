use std::future::Future;
use uuid::Uuid;

/// Transport header carrying the correlation id across message boundaries.
pub const CORRELATION_HEADER: &str = "correlation-id";

tokio::task_local! {
    static CORRELATION_ID: String;
}

/// Run a future with an ambient correlation id visible to everything it
/// calls, publishers included.
pub async fn with_correlation_id<F: Future>(id: String, f: F) -> F::Output {
    CORRELATION_ID.scope(id, f).await
}

/// The ambient correlation id of the current operation, if one was set.
pub fn current() -> Option<String> {
    CORRELATION_ID.try_with(Clone::clone).ok()
}

pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// Ambient id when present, otherwise freshly generated.
pub fn current_or_generate() -> String {
    current().unwrap_or_else(generate)
}

/// Consumer-side resolution: transport header wins, then the message body,
/// then a freshly generated id.
pub fn resolve(header: Option<&str>, body: Option<&str>) -> String {
    header
        .filter(|h| !h.is_empty())
        .or(body.filter(|b| !b.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(generate)
}
