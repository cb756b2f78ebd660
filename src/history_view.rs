//! 履歴画面
//!
//! ストアから読み込み、新しい順に並べて表示する。

use crate::error::Result;
use crate::storage::HistoryStore;
use chrono::{DateTime, Local, Utc};
use rash_scan_common::{compute_stats, sort_by_recency, ClassificationRecord, HistoryStats};
use std::path::Path;

pub struct HistoryView {
    store: HistoryStore,
    rows: Vec<ClassificationRecord>,
}

impl HistoryView {
    /// 読み込まずに作る（壊れた履歴の削除用）
    pub fn new(store: HistoryStore) -> Self {
        Self {
            store,
            rows: Vec::new(),
        }
    }

    /// 画面表示時の読み込み
    pub async fn load(store: HistoryStore) -> Result<Self> {
        let mut view = Self::new(store);
        view.refresh().await?;
        Ok(view)
    }

    /// 再読み込み（引っ張って更新）
    pub async fn refresh(&mut self) -> Result<()> {
        let mut rows = self.store.read_all().await?;
        sort_by_recency(&mut rows);
        self.rows = rows;
        Ok(())
    }

    /// 全件削除して再読み込み
    pub async fn clear_all(&mut self) -> Result<()> {
        self.store.clear().await?;
        self.refresh().await
    }

    /// 新しい順
    pub fn rows(&self) -> &[ClassificationRecord] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn stats(&self, now: DateTime<Utc>) -> HistoryStats {
        compute_stats(&self.rows, now)
    }

    /// 表示用の行
    pub fn render_lines(&self) -> Vec<String> {
        self.rows.iter().map(render_row).collect()
    }

    /// 並べ替え済みの履歴をJSONで書き出す
    pub fn export(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.rows)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn render_row(record: &ClassificationRecord) -> String {
    let when = record
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M");
    let label = if record.label == rash_scan_common::types::INCONCLUSIVE_LABEL {
        "該当なし"
    } else {
        record.label.as_str()
    };
    match &record.image_path {
        Some(path) => format!("{}  {} ({}%)  {}", when, label, record.percent(), path),
        None => format!("{}  {} ({}%)", when, label, record.percent()),
    }
}
