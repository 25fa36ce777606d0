// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advertiser-scoped remote resources: account info, wallet, daily report,
//! and image upload.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::PlatformError;
use crate::upstream::client::{PlatformClient, UploadFile};
use crate::upstream::envelope::{collect_pages, Page};

pub const ADVERTISER_INFO_PATH: &str = "/2/advertiser/info/";
pub const WALLET_PATH: &str = "/v1.0/qianchuan/finance/wallet/get/";
pub const DAILY_REPORT_PATH: &str = "/v1.0/qianchuan/report/advertiser/get/";
pub const IMAGE_UPLOAD_PATH: &str = "/2/file/image/ad/";

const REPORT_PAGE_SIZE: u32 = 100;

/// Remote account metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvertiserInfo {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub company: String,
}

/// Wallet balances in minor units (fen).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub valid_balance: i64,
    #[serde(default)]
    pub cash_balance: i64,
}

/// Wallet balances in major units (yuan).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub balance: f64,
    pub valid_balance: f64,
    pub cash_balance: f64,
}

impl Wallet {
    pub fn to_major(self) -> Balance {
        Balance {
            balance: minor_to_major(self.balance),
            valid_balance: minor_to_major(self.valid_balance),
            cash_balance: minor_to_major(self.cash_balance),
        }
    }
}

/// Convert a minor-unit amount (1/100) to major units.
pub fn minor_to_major(minor: i64) -> f64 {
    minor as f64 / 100.0
}

/// One row of the advertiser daily report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(default)]
    pub stat_datetime: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub show_cnt: i64,
    #[serde(default)]
    pub click_cnt: i64,
    #[serde(default)]
    pub convert_cnt: i64,
    #[serde(default)]
    pub pay_order_cnt: i64,
    #[serde(default)]
    pub pay_order_amount: f64,
}

#[derive(Debug, Deserialize)]
struct InfoList {
    #[serde(default)]
    list: Vec<AdvertiserInfo>,
}

/// Fetch metadata for one advertiser. `None` if the platform omits it.
pub async fn get_info(
    client: &PlatformClient,
    token: &str,
    advertiser_id: i64,
) -> Result<Option<AdvertiserInfo>, PlatformError> {
    let params = json!({ "advertiser_ids": [advertiser_id] });
    let infos: InfoList = client.get(ADVERTISER_INFO_PATH, token, &params).await?;
    Ok(infos.list.into_iter().find(|info| info.id == advertiser_id))
}

pub async fn get_wallet(
    client: &PlatformClient,
    token: &str,
    advertiser_id: i64,
) -> Result<Wallet, PlatformError> {
    client.get(WALLET_PATH, token, &json!({ "advertiser_id": advertiser_id })).await
}

/// Fetch every report row for `[start_date, end_date]` (`YYYY-MM-DD`).
pub async fn get_daily_report(
    client: &PlatformClient,
    token: &str,
    advertiser_id: i64,
    start_date: &str,
    end_date: &str,
) -> Result<Vec<ReportRow>, PlatformError> {
    collect_pages(|page| {
        let params = json!({
            "advertiser_id": advertiser_id,
            "start_date": start_date,
            "end_date": end_date,
            "page": page,
            "page_size": REPORT_PAGE_SIZE,
        });
        async move { client.get::<Page<ReportRow>>(DAILY_REPORT_PATH, token, &params).await }
    })
    .await
}

/// Uploaded image descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadedImage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub signature: String,
}

/// Upload an image into the advertiser's material library.
pub async fn upload_image(
    client: &PlatformClient,
    token: &str,
    advertiser_id: i64,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<UploadedImage, PlatformError> {
    let file = UploadFile {
        field: "image_file".into(),
        file_name: file_name.to_owned(),
        mime: None,
        bytes,
    };
    let fields = [
        ("advertiser_id", advertiser_id.to_string()),
        ("upload_type", "UPLOAD_BY_FILE".to_owned()),
    ];
    client.upload(IMAGE_UPLOAD_PATH, token, file, &fields).await?.decode_data()
}
