use crate::error::{RashScanError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENDPOINT_ENV: &str = "RASH_SCAN_ENDPOINT";
pub const DATA_DIR_ENV: &str = "RASH_SCAN_DATA_DIR";

/// 分類サービスの受け付ける最大サイズ (5MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 分類サービスのベースURL
    pub endpoint: String,
    pub timeout_seconds: u64,
    /// 通信エラー時の再送回数（HTTPエラーは再送しない）
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_upload_bytes: u64,
    /// 履歴と画像の保存先（省略時はOS標準のデータディレクトリ）
    pub data_dir: Option<PathBuf>,
    /// 撮影コマンド。`{output}` が保存先パスに置換される
    pub camera_command: Option<String>,
    /// 同じ内容の画像が保存済みでも上書きする
    pub overwrite_existing_images: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".into(),
            timeout_seconds: 30,
            max_retries: 1,
            retry_backoff_ms: 500,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            data_dir: None,
            camera_command: None,
            overwrite_existing_images: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RashScanError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("rash-scan").join("config.json"))
    }

    /// 環境変数を優先
    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint.trim().to_string();
            }
        }
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.data_dir = Some(PathBuf::from(dir.trim()));
            }
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| RashScanError::Config("データディレクトリが見つかりません".into()))?;
        Ok(base.join("rash-scan"))
    }

    pub fn store_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("store"))
    }

    pub fn images_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("images"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    pub fn classify_url(&self) -> String {
        format!("{}/classify/classify-rash", self.endpoint.trim_end_matches('/'))
    }

    pub fn set_endpoint(&mut self, endpoint: String) -> Result<()> {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(RashScanError::Config(format!(
                "URLは http:// または https:// で始まる必要があります: {}",
                endpoint
            )));
        }
        self.endpoint = endpoint;
        self.save()
    }

    pub fn set_camera_command(&mut self, command: String) -> Result<()> {
        self.camera_command = if command.trim().is_empty() {
            None
        } else {
            Some(command)
        };
        self.save()
    }
}
