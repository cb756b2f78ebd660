//! 撮影→分類→保存ワークフローの状態遷移
//!
//! 画面1つにつき1つの `Session` を持ち、イベントを `transition` に渡して
//! 次の状態を得る。I/Oは一切行わないため、UIなしで単体テストできる。
//!
//! 状態: Idle → Acquiring → Submitting → {Succeeded | Failed} → Idle
//!
//! 各撮影サイクルには世代番号が振られ、取得・分類の完了イベントは
//! 開始時の世代を持ち帰る。結果カードを閉じると世代が進むため、
//! 閉じた後に届いた古い結果は `Ignored::Stale` として破棄される。

use crate::types::{confidence_percent, PermissionKind};
use serde::{Deserialize, Serialize};

/// ワークフローの状態
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WorkflowState {
    #[default]
    Idle,
    Acquiring,
    Submitting,
    Succeeded { label: String, confidence: f64 },
    Failed { message: String },
}

impl WorkflowState {
    /// 撮影サイクルが進行中か（撮影ボタンを無効化すべき状態）
    pub fn is_busy(&self) -> bool {
        matches!(self, WorkflowState::Acquiring | WorkflowState::Submitting)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Acquiring => "acquiring",
            WorkflowState::Submitting => "submitting",
            WorkflowState::Succeeded { .. } => "succeeded",
            WorkflowState::Failed { .. } => "failed",
        }
    }
}

/// 画面に表示するカード（同時に1枚まで）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "card", rename_all = "camelCase")]
pub enum Card {
    /// 分類結果
    Result { label: String, percent: u8 },
    /// 一時的なエラー表示
    Error { message: String },
    /// 権限要求（自動では消えない）
    Permission { kind: PermissionKind, permanent: bool },
}

/// ワークフローへの入力イベント
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// 撮影・選択ボタンが押された
    CaptureRequested,
    /// 画像を取得できた
    ImageAcquired { generation: u64 },
    /// ピッカーが選択なしで閉じられた
    AcquisitionCancelled { generation: u64 },
    /// 必要な権限が拒否された
    AcquisitionDenied {
        generation: u64,
        kind: PermissionKind,
        permanent: bool,
    },
    /// 分類に成功した
    ClassificationSucceeded {
        generation: u64,
        label: String,
        confidence: f64,
    },
    /// 取得または分類に失敗した
    Failed { generation: u64, message: String },
    /// 結果/エラーカードが閉じられた
    Dismissed,
    /// 権限カードが確認された
    PermissionAcknowledged,
}

impl WorkflowEvent {
    fn generation(&self) -> Option<u64> {
        match self {
            WorkflowEvent::ImageAcquired { generation }
            | WorkflowEvent::AcquisitionCancelled { generation }
            | WorkflowEvent::AcquisitionDenied { generation, .. }
            | WorkflowEvent::ClassificationSucceeded { generation, .. }
            | WorkflowEvent::Failed { generation, .. } => Some(*generation),
            _ => None,
        }
    }
}

/// イベントが適用されなかった理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ignored {
    /// 撮影サイクル進行中のため新しい撮影を受け付けない
    Busy,
    /// 閉じられた（または置き換えられた）サイクルの結果
    Stale { event: u64, current: u64 },
    /// 現在の状態では意味を持たないイベント
    NotApplicable { state: &'static str },
}

/// 遷移結果
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Next(Session),
    Ignored(Ignored),
}

/// 画面ごとのワークフローセッション（永続化しない）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub state: WorkflowState,
    pub card: Option<Card>,
    /// 現在の撮影サイクルの世代番号
    pub generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// イベントを適用し、適用できなかった場合は理由を返す
    pub fn apply(&mut self, event: WorkflowEvent) -> Result<(), Ignored> {
        match transition(self, event) {
            Step::Next(next) => {
                *self = next;
                Ok(())
            }
            Step::Ignored(reason) => Err(reason),
        }
    }

    pub fn can_capture(&self) -> bool {
        !self.state.is_busy()
    }
}

/// (状態, イベント) から次の状態を求める純粋関数
pub fn transition(session: &Session, event: WorkflowEvent) -> Step {
    if let Some(generation) = event.generation() {
        if generation != session.generation {
            return Step::Ignored(Ignored::Stale {
                event: generation,
                current: session.generation,
            });
        }
    }

    let not_applicable = || {
        Step::Ignored(Ignored::NotApplicable {
            state: session.state.name(),
        })
    };

    match (&session.state, event) {
        (state, WorkflowEvent::CaptureRequested) => {
            if state.is_busy() {
                return Step::Ignored(Ignored::Busy);
            }
            // 新しい撮影で前回のカードは消える
            Step::Next(Session {
                state: WorkflowState::Acquiring,
                card: None,
                generation: session.generation + 1,
            })
        }

        (WorkflowState::Acquiring, WorkflowEvent::ImageAcquired { .. }) => Step::Next(Session {
            state: WorkflowState::Submitting,
            card: None,
            generation: session.generation,
        }),

        (WorkflowState::Acquiring, WorkflowEvent::AcquisitionCancelled { .. }) => {
            Step::Next(Session {
                state: WorkflowState::Idle,
                card: None,
                generation: session.generation,
            })
        }

        (WorkflowState::Acquiring, WorkflowEvent::AcquisitionDenied { kind, permanent, .. }) => {
            Step::Next(Session {
                state: WorkflowState::Idle,
                card: Some(Card::Permission { kind, permanent }),
                generation: session.generation,
            })
        }

        (
            WorkflowState::Submitting,
            WorkflowEvent::ClassificationSucceeded {
                label, confidence, ..
            },
        ) => Step::Next(Session {
            card: Some(Card::Result {
                label: label.clone(),
                percent: confidence_percent(confidence),
            }),
            state: WorkflowState::Succeeded { label, confidence },
            generation: session.generation,
        }),

        (
            WorkflowState::Acquiring | WorkflowState::Submitting,
            WorkflowEvent::Failed { message, .. },
        ) => Step::Next(Session {
            card: Some(Card::Error {
                message: message.clone(),
            }),
            state: WorkflowState::Failed { message },
            generation: session.generation,
        }),

        // 送信中に閉じても通信は止まらない。世代を進めて遅れて届く結果を無効化する
        (
            WorkflowState::Submitting | WorkflowState::Succeeded { .. } | WorkflowState::Failed { .. },
            WorkflowEvent::Dismissed,
        ) => Step::Next(Session {
            state: WorkflowState::Idle,
            card: None,
            generation: session.generation + 1,
        }),

        (WorkflowState::Idle, WorkflowEvent::PermissionAcknowledged) => match session.card {
            Some(Card::Permission { .. }) => Step::Next(Session {
                state: WorkflowState::Idle,
                card: None,
                generation: session.generation,
            }),
            _ => not_applicable(),
        },

        _ => not_applicable(),
    }
}
