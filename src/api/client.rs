//! Implements the `Http` trait with `reqwest`.

use crate::api::{ApiError, Http, HttpRequest, HttpResponse, Method};
use crate::error::Res;
use anyhow::Context;
use reqwest::header::ACCEPT;
use std::time::Duration;

pub(crate) struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    /// Every request is abandoned after `timeout`.
    pub(crate) fn new(timeout: Duration) -> Res<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Unable to create the HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Http for ReqwestHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, request.url)
            .header(ACCEPT, "application/json");
        if let Some(token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::network(format!("the request timed out ({e})"))
    } else if e.is_connect() {
        ApiError::network(e.to_string())
    } else {
        ApiError::unknown(e.status().map(|s| s.as_u16()), e.to_string())
    }
}
