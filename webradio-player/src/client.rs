//! Remote client for the HTTP API

use crate::error::{Error, Result};
use futures::stream::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Client for a running web radio
pub struct RadioClient {
    base_url: String,
    http: reqwest::Client,
}

impl RadioClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: format!("http://{}:{}", host, port),
            http,
        })
    }

    /// Execute API `api` with query parameters.
    ///
    /// Returns the HTTP status and the JSON body (`null` if the body is empty
    /// or not JSON).
    pub async fn exec(&self, api: &str, params: &[(String, String)]) -> Result<(u16, Value)> {
        let url = format!("{}/api/{}", self.base_url, api);
        debug!("GET {} {:?}", url, params);

        let response = self.http.get(&url).query(params).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        Ok((status, value))
    }

    /// Names of all API operations
    pub async fn api_list(&self) -> Result<Vec<String>> {
        let (_, value) = self.exec("get_api_list", &[]).await?;
        serde_json::from_value(value).map_err(|e| Error::Common(e.into()))
    }

    /// Follow the server's event stream; every item is one event object
    pub async fn events(&self) -> Result<impl Stream<Item = Result<Value>>> {
        let url = format!("{}/api/get_events", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;
        let mut body = response.bytes_stream();

        Ok(async_stream::try_stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = body.next().await {
                buffer.extend_from_slice(&chunk?);
                while let Some(end) = find_block_end(&buffer) {
                    let block: Vec<u8> = buffer.drain(..end).collect();
                    if let Some(event) = parse_sse_block(&String::from_utf8_lossy(&block))? {
                        yield event;
                    }
                }
            }
        })
    }
}

/// Index just past the first blank-line separator
fn find_block_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| pos + 2)
}

/// JSON payload of one SSE block, `None` for blocks without data
fn parse_sse_block(block: &str) -> Result<Option<Value>> {
    let data: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if data.is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(&data.join("\n")).map_err(|e| Error::Common(e.into()))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_splitting() {
        assert_eq!(find_block_end(b"data: 1\n\ndata: 2"), Some(9));
        assert_eq!(find_block_end(b"data: 1\n"), None);
    }

    #[test]
    fn test_parse_block() {
        let event = parse_sse_block("data: {\"type\":\"vol_set\",\"value\":5,\"text\":\"x\"}\n\n")
            .unwrap()
            .unwrap();
        assert_eq!(event["type"], "vol_set");

        assert!(parse_sse_block(": comment\n\n").unwrap().is_none());
        assert!(parse_sse_block("data: {broken\n\n").is_err());
    }
}
