//! 分類履歴の並び替え・集計

use crate::types::ClassificationRecord;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// 新しい順に並び替える（同時刻は保存順を維持）
pub fn sort_by_recency(records: &mut [ClassificationRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// 履歴の集計値
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    /// 総スキャン数
    pub total: usize,
    /// 直近7日間のスキャン数
    pub this_week: usize,
}

pub fn compute_stats(records: &[ClassificationRecord], now: DateTime<Utc>) -> HistoryStats {
    let week_ago = now - Duration::days(7);
    HistoryStats {
        total: records.len(),
        this_week: records
            .iter()
            .filter(|r| r.timestamp > week_ago && r.timestamp <= now)
            .count(),
    }
}
