use rash_scan_common::PermissionKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RashScanError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("{kind}の権限がありません")]
    AcquisitionDenied { kind: PermissionKind, permanent: bool },

    #[error("画像の選択がキャンセルされました")]
    AcquisitionCancelled,

    #[error("画像の取得元が利用できません: {0}")]
    SourceUnavailable(String),

    #[error("撮影エラー: {0}")]
    Capture(String),

    #[error("対応していない画像形式です: {0}")]
    UnsupportedImage(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("送信できない画像です: {0}")]
    InvalidUpload(String),

    #[error("分類サービスがエラーを返しました (HTTP {status}): {body}")]
    ClassificationHttp { status: u16, body: String },

    #[error("分類サービスに接続できません: {0}")]
    ClassificationNetwork(String),

    #[error("分類結果の解析に失敗: {0}")]
    ClassificationParse(String),

    #[error("履歴の保存領域エラー: {0}")]
    StoreIo(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] rash_scan_common::Error),
}

impl RashScanError {
    /// 自動リトライの対象となる一時的な通信エラーか
    ///
    /// HTTPステータスエラーやパースエラーは再送しても結果が変わらないため対象外
    pub fn is_transient(&self) -> bool {
        matches!(self, RashScanError::ClassificationNetwork(_))
    }
}

impl From<reqwest::Error> for RashScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RashScanError::ClassificationParse(err.to_string())
        } else {
            RashScanError::ClassificationNetwork(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RashScanError>;
