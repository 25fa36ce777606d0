// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the advertising platform open API.

use std::sync::Once;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::PlatformError;
use crate::upstream::envelope::Envelope;

/// Header carrying the advertiser's access token.
pub const ACCESS_TOKEN_HEADER: &str = "Access-Token";

/// Longest error body kept in a transport error message.
const MAX_ERROR_BODY: usize = 512;

/// Install the ring crypto provider for rustls once per process.
pub fn ensure_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// A file attached to a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub field: String,
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Shared client for every platform call. Holds one connection pool.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    base_url: String,
    client: Client,
}

impl PlatformClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        ensure_crypto_provider();
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { base_url, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_token(req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) if !token.is_empty() => req.header(ACCESS_TOKEN_HEADER, token),
            _ => req,
        }
    }

    /// Issue a request and decode the envelope.
    ///
    /// For GET the top-level keys of `body` become query parameters; other
    /// methods send `body` as JSON.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Envelope, PlatformError> {
        let mut req = self.client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            req = if method == Method::GET { req.query(&query_pairs(body)) } else { req.json(body) };
        }
        let resp = Self::apply_token(req, token).send().await?;
        let envelope = decode_envelope(resp).await?;
        if !envelope.is_success() {
            tracing::debug!(path, code = envelope.code, request_id = %envelope.request_id, "platform rejected call");
        }
        envelope.into_result()
    }

    /// Like [`call`](Self::call) but deserializes `data` into `T`.
    pub async fn call_typed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<T, PlatformError> {
        self.call(method, path, token, body).await?.decode_data()
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        params: &Value,
    ) -> Result<T, PlatformError> {
        self.call_typed(Method::GET, path, Some(token), Some(params)).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<T, PlatformError> {
        self.call_typed(Method::POST, path, token, Some(body)).await
    }

    /// Send a `multipart/form-data` upload with extra text fields.
    pub async fn upload(
        &self,
        path: &str,
        token: &str,
        file: UploadFile,
        fields: &[(&str, String)],
    ) -> Result<Envelope, PlatformError> {
        let mut part = Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(ref mime) = file.mime {
            part = part
                .mime_str(mime)
                .map_err(|e| PlatformError::Decode(format!("invalid mime type {mime:?}: {e}")))?;
        }
        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name.to_string(), value.clone());
        }
        form = form.part(file.field, part);

        let req = self.client.post(self.url(path)).multipart(form);
        let resp = Self::apply_token(req, Some(token)).send().await?;
        decode_envelope(resp).await?.into_result()
    }
}

/// Flatten a JSON object into query pairs.
///
/// Strings are sent verbatim; arrays, objects, and numbers are JSON-encoded;
/// nulls are dropped.
pub fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Some(map) = params.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

async fn decode_envelope(resp: Response) -> Result<Envelope, PlatformError> {
    let status = resp.status();
    if !status.is_success() {
        let mut text = resp.text().await.unwrap_or_default();
        if text.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        return Err(PlatformError::Transport { status: Some(status.as_u16()), message: text });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| PlatformError::Decode(format!("invalid envelope: {e}")))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
