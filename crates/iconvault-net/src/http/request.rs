//! HTTP request builder.

use super::client::HttpClient;
use super::response::HttpResponse;
use crate::error::Result;

/// Builder for constructing GET requests.
pub struct HttpRequestBuilder {
    client: HttpClient,
    url: String,
    headers: http::HeaderMap,
}

impl HttpRequestBuilder {
    pub(crate) fn new(client: HttpClient, url: String) -> Self {
        Self {
            client,
            url,
            headers: http::HeaderMap::new(),
        }
    }

    /// Add a header to the request. Invalid names or values are ignored.
    pub fn header(
        mut self,
        name: impl TryInto<http::HeaderName>,
        value: impl TryInto<http::HeaderValue>,
    ) -> Self {
        if let (Ok(name), Ok(value)) = (name.try_into(), value.try_into()) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Send the request and wait for the response headers.
    pub async fn send(self) -> Result<HttpResponse> {
        let url = url::Url::parse(&self.url)?;
        let response = self
            .client
            .reqwest_client()
            .get(url)
            .headers(self.headers)
            .send()
            .await?;
        Ok(HttpResponse::from_reqwest(
            response,
            self.client.config().max_body_bytes,
        ))
    }
}
