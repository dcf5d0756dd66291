//! Manual redirect following for indexer download links.

use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Maximum number of requests issued while resolving one URL.
pub const MAX_REDIRECTS: usize = 10;

/// Timeout for each individual hop.
pub const HOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while resolving a download URL.
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Redirect response without Location header")]
    MissingLocation,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Exceeded maximum of {0} redirects")]
    TooManyRedirects(usize),
}

/// Build an HTTP client that never follows redirects on its own.
pub(crate) fn manual_redirect_client() -> Client {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Follow `initial_url` through HTTP redirects to the final download URL.
///
/// Relative `Location` headers are resolved against the URL that produced
/// them. A redirect to a magnet URI ends the chain immediately. `client`
/// must have automatic redirects disabled.
pub async fn follow_redirects(client: &Client, initial_url: &str) -> Result<String, RedirectError> {
    let mut current = Url::parse(initial_url)?;

    for _ in 0..MAX_REDIRECTS {
        let response = client
            .get(current.clone())
            .timeout(HOP_TIMEOUT)
            .send()
            .await?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or(RedirectError::MissingLocation)?;
            current = current.join(location)?;
            debug!(url = %current, "Following redirect");

            if current.scheme() == "magnet" {
                return Ok(current.to_string());
            }
        } else if status.is_client_error() || status.is_server_error() {
            return Err(RedirectError::HttpStatus(status.as_u16()));
        } else {
            return Ok(current.to_string());
        }
    }

    Err(RedirectError::TooManyRedirects(MAX_REDIRECTS))
}
