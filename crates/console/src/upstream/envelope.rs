// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response envelope and pagination shared by every platform endpoint.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Hard cap on pages fetched by [`collect_pages`].
pub const MAX_PAGES: u32 = 200;

/// Uniform `{code, message, request_id, data}` wrapper around every response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero business code into [`PlatformError::Api`].
    pub fn into_result(self) -> Result<Self, PlatformError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PlatformError::Api {
                code: self.code,
                message: self.message,
                request_id: self.request_id,
            })
        }
    }

    /// Deserialize `data` into the caller's shape.
    pub fn decode_data<T: DeserializeOwned>(self) -> Result<T, PlatformError> {
        serde_json::from_value(self.data).map_err(|e| {
            PlatformError::Decode(format!("unexpected data shape (request_id={}): {e}", self.request_id))
        })
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
    #[serde(default)]
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total_number: u64,
    #[serde(default)]
    pub total_page: u32,
}

impl PageInfo {
    pub fn has_next(&self) -> bool {
        self.page < self.total_page
    }
}

/// Walk a paged endpoint from page 1 until the last page.
///
/// Stops early on an empty page and after [`MAX_PAGES`].
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, PlatformError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, PlatformError>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch(page).await?;
        let empty = batch.list.is_empty();
        items.extend(batch.list);
        if empty || !batch.page_info.has_next() {
            break;
        }
        if page >= MAX_PAGES {
            tracing::warn!(page, total_page = batch.page_info.total_page, "page cap reached");
            break;
        }
        page += 1;
    }
    Ok(items)
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
