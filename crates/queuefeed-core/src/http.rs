use std::time::Duration;

const USER_AGENT: &str = concat!("queuefeed/", env!("CARGO_PKG_VERSION"));
const MAX_BODY_EXCERPT: usize = 512;

/// Client shared by the record source and the uploader.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Shortens a response body for inclusion in an error message.
pub(crate) fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
