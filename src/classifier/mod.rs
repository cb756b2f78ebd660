//! 分類サービス呼び出し
//!
//! `POST /classify/classify-rash` に画像を1枚送り、ラベルと信頼度を受け取る。
//! - ファイルURIの画像: multipartの `image` フィールドでバイナリ送信
//! - インライン画像: JSON `{ "image": "<base64>" }` で送信

mod retry;

pub use retry::RetryPolicy;

use crate::config::Config;
use crate::error::{RashScanError, Result};
use crate::storage::read_image_bytes;
use async_trait::async_trait;
use rash_scan_common::{
    error_message_from_body, parse_classify_response, Classification, ImageRef,
};
use reqwest::multipart::{Form, Part};
use serde_json::json;
use std::time::Duration;

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &ImageRef) -> Result<Classification>;
}

/// ステータスとボディから結果を判定する
pub fn interpret_response(status: u16, reason: &str, body: &str) -> Result<Classification> {
    if !(200..300).contains(&status) {
        return Err(RashScanError::ClassificationHttp {
            status,
            body: error_message_from_body(body, reason),
        });
    }

    parse_classify_response(body).map_err(|e| RashScanError::ClassificationParse(e.to_string()))
}

/// 送信前の検証（サービス側と同じ制限）
pub fn validate_upload(mime_type: &str, size: u64, max_bytes: u64) -> Result<()> {
    if !mime_type.starts_with("image/") {
        return Err(RashScanError::InvalidUpload(format!(
            "画像ファイルではありません ({})",
            mime_type
        )));
    }
    if size == 0 {
        return Err(RashScanError::InvalidUpload("画像が空です".into()));
    }
    if size > max_bytes {
        return Err(RashScanError::InvalidUpload(format!(
            "画像が大きすぎます ({} bytes, 上限 {} bytes)",
            size, max_bytes
        )));
    }
    Ok(())
}

pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
    max_upload_bytes: u64,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RashScanError::Config(format!("HTTPクライアント初期化エラー: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            retry: RetryPolicy::default(),
            max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_BYTES,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.classify_url(), config.timeout())?
            .with_retry(RetryPolicy {
                max_retries: config.max_retries,
                backoff: Duration::from_millis(config.retry_backoff_ms),
            })
            .with_max_upload_bytes(config.max_upload_bytes))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_once(&self, image: &ImageRef, bytes: &[u8]) -> Result<Classification> {
        let request = match image {
            ImageRef::Uri {
                display_name,
                mime_type,
                ..
            } => {
                let part = Part::bytes(bytes.to_vec())
                    .file_name(display_name.clone())
                    .mime_str(mime_type)
                    .map_err(|e| RashScanError::InvalidUpload(e.to_string()))?;
                self.client
                    .post(&self.url)
                    .multipart(Form::new().part("image", part))
            }
            ImageRef::Inline { data, .. } => {
                self.client.post(&self.url).json(&json!({ "image": data }))
            }
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        log::debug!("分類レスポンス: HTTP {} ({} bytes)", status.as_u16(), body.len());

        interpret_response(
            status.as_u16(),
            status.canonical_reason().unwrap_or("HTTP error"),
            &body,
        )
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, image: &ImageRef) -> Result<Classification> {
        let bytes = read_image_bytes(image).await?;
        validate_upload(image.mime_type(), bytes.len() as u64, self.max_upload_bytes)?;

        log::info!("分類リクエスト送信: {} -> {}", image.display_name(), self.url);
        self.retry.run(|| self.send_once(image, &bytes)).await
    }
}
