//! Shared blocking HTTP client.

use std::time::Duration;

use reqwest::blocking::Client;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Build the client used for both feed fetches and webhook calls.
///
/// `None` disables the request timeout entirely.
pub fn client(timeout: Option<Duration>) -> reqwest::Result<Client> {
    Client::builder().user_agent(USER_AGENT).timeout(timeout).build()
}
