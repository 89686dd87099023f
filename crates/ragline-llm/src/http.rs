//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create a shared HTTP client with standard ragline configuration.
///
/// Config: 30s connect timeout, 120s idle read timeout, rustls TLS,
/// `ragline/{version}` user-agent, redirect limit 10. There is no total request
/// timeout so long generation streams are not cut off mid-answer.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .read_timeout(Duration::from_secs(120))
        .user_agent(concat!("ragline/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("default HTTP client construction must not fail")
}
