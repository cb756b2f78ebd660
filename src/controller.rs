//! 撮影画面のコントローラ
//!
//! 取得→送信→保存→表示を順に await し、各段階の結果を
//! `rash_scan_common::workflow` の状態遷移に流し込む。
//! セッションのロックは外部呼び出しの await 中には保持しないので、
//! 送信中でも `dismiss` を呼べる。閉じた後に届いた結果は世代番号で
//! 判別してログに残し、表示も保存もせずに捨てる。
//! サイクルが終わると一時保存先に作られた画像は削除する。

use crate::acquisition::Acquirer;
use crate::classifier::Classifier;
use crate::error::RashScanError;
use crate::storage::{HistoryStore, ImageArchive};
use chrono::Utc;
use rash_scan_common::types::INCONCLUSIVE_LABEL;
use rash_scan_common::{
    AcquireRequest, Card, ClassificationRecord, Ignored, ImageRef, PermissionKind, Session,
    WorkflowEvent, WorkflowState,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 1回の撮影サイクルの結末
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// 前のサイクルが進行中で開始しなかった
    Busy,
    /// ユーザーが選ばずに閉じた
    Cancelled,
    /// 権限が拒否された
    Denied { kind: PermissionKind, permanent: bool },
    /// 取得または分類に失敗した
    Failed { message: String },
    /// 分類成功。`persisted` は履歴への追記が成功したか
    Succeeded {
        record: ClassificationRecord,
        persisted: bool,
    },
    /// 結果が届く前にカードが閉じられた
    Discarded { generation: u64 },
}

#[derive(Clone)]
pub struct CaptureController {
    session: Arc<Mutex<Session>>,
    acquirer: Arc<Acquirer>,
    classifier: Arc<dyn Classifier>,
    history: HistoryStore,
    archive: Option<ImageArchive>,
}

impl CaptureController {
    pub fn new(
        acquirer: Arc<Acquirer>,
        classifier: Arc<dyn Classifier>,
        history: HistoryStore,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new())),
            acquirer,
            classifier,
            history,
            archive: None,
        }
    }

    /// 画像のコピー先。ファイル領域のない環境では設定しない
    pub fn with_archive(mut self, archive: ImageArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub async fn state(&self) -> WorkflowState {
        self.session.lock().await.state.clone()
    }

    pub async fn card(&self) -> Option<Card> {
        self.session.lock().await.card.clone()
    }

    /// 撮影ボタンを有効にしてよいか
    pub async fn can_capture(&self) -> bool {
        self.session.lock().await.can_capture()
    }

    /// 結果/エラーカードを閉じる（送信中なら結果を無効化する）
    pub async fn dismiss(&self) -> bool {
        self.apply(WorkflowEvent::Dismissed).await.is_ok()
    }

    /// 権限カードを閉じる
    pub async fn acknowledge_permission(&self) -> bool {
        self.apply(WorkflowEvent::PermissionAcknowledged).await.is_ok()
    }

    async fn apply(&self, event: WorkflowEvent) -> Result<(), Ignored> {
        let mut session = self.session.lock().await;
        let before = session.state.name();
        let result = session.apply(event);
        match &result {
            Ok(()) => log::debug!("ワークフロー遷移: {} -> {}", before, session.state.name()),
            Err(reason) => log::debug!("イベントを無視 ({}): {:?}", before, reason),
        }
        result
    }

    /// 撮影サイクルを1回実行する
    pub async fn capture(&self, request: AcquireRequest) -> CaptureOutcome {
        let generation = {
            let mut session = self.session.lock().await;
            if session.apply(WorkflowEvent::CaptureRequested).is_err() {
                log::debug!("撮影サイクル進行中のため無視");
                return CaptureOutcome::Busy;
            }
            session.generation
        };
        log::debug!("撮影開始 (世代 {}, {})", generation, request.source);

        // 1. 画像取得
        let image = match self.acquirer.acquire(&request).await {
            Ok(image) => image,
            Err(err) => return self.acquisition_failed(generation, err).await,
        };

        let outcome = self.submit(generation, &image).await;
        self.acquirer.release(&image).await;
        outcome
    }

    /// 取得済み画像の送信・表示・保存
    async fn submit(&self, generation: u64, image: &ImageRef) -> CaptureOutcome {
        if let Err(reason) = self.apply(WorkflowEvent::ImageAcquired { generation }).await {
            return self.discard(generation, reason);
        }

        // 2. 送信
        let classification = match self.classifier.classify(image).await {
            Ok(c) => c,
            Err(err) => {
                let message = err.to_string();
                log::warn!("分類失敗: {}", message);
                return match self
                    .apply(WorkflowEvent::Failed {
                        generation,
                        message: message.clone(),
                    })
                    .await
                {
                    Ok(()) => CaptureOutcome::Failed { message },
                    Err(reason) => self.discard(generation, reason),
                };
            }
        };

        // 3. 表示
        let shown = self
            .apply(WorkflowEvent::ClassificationSucceeded {
                generation,
                label: classification.label.clone(),
                confidence: classification.confidence,
            })
            .await;
        if let Err(reason) = shown {
            return self.discard(generation, reason);
        }

        // 4. 画像コピー（失敗しても記録は残す）
        let image_path = match &self.archive {
            Some(archive) => match archive.store(image).await {
                Ok(path) => Some(path.display().to_string()),
                Err(err) => {
                    log::warn!("画像の保存に失敗（画像なしで記録）: {}", err);
                    None
                }
            },
            None => None,
        };

        // 5. 履歴追記（失敗しても結果表示はそのまま）
        let record = ClassificationRecord::from_classification(&classification, image_path, Utc::now());
        let persisted = match self.history.append(record.clone()).await {
            Ok(()) => true,
            Err(err) => {
                log::warn!("履歴の保存に失敗: {}", err);
                false
            }
        };

        CaptureOutcome::Succeeded { record, persisted }
    }

    async fn acquisition_failed(&self, generation: u64, err: RashScanError) -> CaptureOutcome {
        let (event, outcome) = match err {
            RashScanError::AcquisitionCancelled => (
                WorkflowEvent::AcquisitionCancelled { generation },
                CaptureOutcome::Cancelled,
            ),
            RashScanError::AcquisitionDenied { kind, permanent } => (
                WorkflowEvent::AcquisitionDenied {
                    generation,
                    kind,
                    permanent,
                },
                CaptureOutcome::Denied { kind, permanent },
            ),
            other => {
                let message = other.to_string();
                log::warn!("画像取得失敗: {}", message);
                (
                    WorkflowEvent::Failed {
                        generation,
                        message: message.clone(),
                    },
                    CaptureOutcome::Failed { message },
                )
            }
        };

        match self.apply(event).await {
            Ok(()) => outcome,
            Err(reason) => self.discard(generation, reason),
        }
    }

    fn discard(&self, generation: u64, reason: Ignored) -> CaptureOutcome {
        log::warn!("閉じられた撮影サイクルの結果を破棄 (世代 {}): {:?}", generation, reason);
        CaptureOutcome::Discarded { generation }
    }
}

/// カードの表示文言
pub fn render_card(card: &Card) -> String {
    match card {
        Card::Result { label, percent } if label == INCONCLUSIVE_LABEL => {
            format!("該当する分類はありません (信頼度 {}%)", percent)
        }
        Card::Result { label, percent } => format!("分類結果: {} (信頼度 {}%)", label, percent),
        Card::Error { message } => format!("エラー: {}", message),
        Card::Permission { kind, permanent: true } => {
            format!("{}へのアクセスが拒否されています。設定から許可してください", kind)
        }
        Card::Permission { kind, permanent: false } => {
            format!("{}へのアクセスを許可してください", kind)
        }
    }
}
