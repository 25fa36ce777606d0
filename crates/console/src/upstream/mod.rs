// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advertising platform communication: HTTP client, envelope decoding, and
//! the remote resources the console syncs.

pub mod advertiser;
pub mod client;
pub mod envelope;

pub use client::PlatformClient;
pub use envelope::{collect_pages, Envelope, Page, PageInfo};
