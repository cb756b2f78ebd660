//! 分類履歴ストア
//!
//! 1つの固定キーに分類記録の配列をJSONで保存する。
//! 追記は「全件読み込み→末尾に追加→全件書き戻し」。書き込み手は
//! フォアグラウンドの画面1つだけなので、複数ライター間の排他は行わない。

use super::kv::KeyValueStore;
use crate::error::{RashScanError, Result};
use rash_scan_common::ClassificationRecord;
use std::sync::Arc;

pub const HISTORY_KEY: &str = "classifications";

#[derive(Clone)]
pub struct HistoryStore {
    kv: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// 保存順で全件取得（未保存なら空）
    pub async fn read_all(&self) -> Result<Vec<ClassificationRecord>> {
        match self.kv.get(HISTORY_KEY).await? {
            Some(content) if !content.trim().is_empty() => serde_json::from_str(&content)
                .map_err(|e| RashScanError::StoreIo(format!("履歴の読み込みに失敗: {}", e))),
            _ => Ok(Vec::new()),
        }
    }

    /// 1件追記
    pub async fn append(&self, record: ClassificationRecord) -> Result<()> {
        let mut records = self.read_all().await?;
        records.push(record);
        let content = serde_json::to_string(&records)
            .map_err(|e| RashScanError::StoreIo(format!("履歴のシリアライズに失敗: {}", e)))?;
        self.kv.set(HISTORY_KEY, &content).await
    }

    /// キーごと削除
    pub async fn clear(&self) -> Result<()> {
        self.kv.remove(HISTORY_KEY).await
    }
}
