//! デバイス権限の確認
//!
//! 許可と恒久的な拒否はキャッシュし、2回目以降は確認しない。
//! 一時的な拒否は次回の撮影時に再確認する。

use async_trait::async_trait;
use rash_scan_common::{PermissionKind, PermissionStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request(&self, kind: PermissionKind) -> PermissionStatus;
}

type AskFn = dyn Fn(PermissionKind) -> PermissionStatus + Send + Sync;

pub struct CachedPermissions {
    ask: Arc<AskFn>,
    answers: Mutex<HashMap<PermissionKind, PermissionStatus>>,
}

impl CachedPermissions {
    /// `ask` はブロッキングしてよい（端末での確認など）
    pub fn new<F>(ask: F) -> Self
    where
        F: Fn(PermissionKind) -> PermissionStatus + Send + Sync + 'static,
    {
        Self {
            ask: Arc::new(ask),
            answers: Mutex::new(HashMap::new()),
        }
    }

    /// 常に同じ答えを返す
    pub fn fixed(status: PermissionStatus) -> Self {
        Self::new(move |_| status)
    }
}

#[async_trait]
impl PermissionGate for CachedPermissions {
    async fn request(&self, kind: PermissionKind) -> PermissionStatus {
        // 問い合わせ中もロックを保持する
        let mut answers = self.answers.lock().await;
        if let Some(status) = answers.get(&kind) {
            return *status;
        }

        let ask = self.ask.clone();
        let status = tokio::task::spawn_blocking(move || ask(kind))
            .await
            .unwrap_or(PermissionStatus::Denied);
        log::debug!("権限確認: {:?} -> {:?}", kind, status);

        if status != PermissionStatus::Denied {
            answers.insert(kind, status);
        }
        status
    }
}
