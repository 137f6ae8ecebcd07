use std::fs::File;
use std::io::Write;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::GeodataError;

pub trait DatasetClient: Send + Sync {
    /// Streams the body at `url` into `destination`, returning the byte count.
    fn download(&self, url: &str, destination: &mut File) -> Result<u64, GeodataError>;
}

#[derive(Clone)]
pub struct HttpDatasetClient {
    client: Client,
}

impl HttpDatasetClient {
    /// `timeout` of `None` blocks until the transport gives up.
    pub fn new(timeout: Option<Duration>) -> Result<Self, GeodataError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("geodata-cache/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GeodataError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| GeodataError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

impl DatasetClient for HttpDatasetClient {
    fn download(&self, url: &str, destination: &mut File) -> Result<u64, GeodataError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| GeodataError::Http(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "request failed".to_string());
            return Err(GeodataError::HttpStatus { status, message });
        }
        let bytes = std::io::copy(&mut response, destination)
            .map_err(|err| GeodataError::Http(err.to_string()))?;
        destination
            .flush()
            .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        Ok(bytes)
    }
}
