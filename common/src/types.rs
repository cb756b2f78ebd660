//! 分類結果・画像参照の型定義
//!
//! CLIとWeb(WASM)で共有される型:
//! - Classification: 分類サービスの出力
//! - ClassificationRecord: 履歴に保存される1件分の記録
//! - ImageRef: 取得した画像の転送用表現（URI / インラインBase64）

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 信頼度が低い場合にサービスが返すラベル
pub const INCONCLUSIVE_LABEL: &str = "none";

/// 分類サービスの結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f64,
}

impl Classification {
    /// 表示用のパーセント値（四捨五入）
    pub fn percent(&self) -> u8 {
        confidence_percent(self.confidence)
    }

    /// サービスが該当なし（信頼度50%未満）と判定したか
    pub fn is_inconclusive(&self) -> bool {
        self.label == INCONCLUSIVE_LABEL
    }
}

/// 信頼度(0.0-1.0)をパーセントに変換
pub fn confidence_percent(confidence: f64) -> u8 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// 履歴に保存される分類記録
///
/// 成功した分類からのみ生成される（保留中の記録は存在しない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRecord {
    /// 分類完了時刻
    pub timestamp: DateTime<Utc>,

    /// アプリ内に保存した画像のパス（保存できない環境ではNone）
    #[serde(default)]
    pub image_path: Option<String>,

    /// 旧フォーマットとの互換のため `classification` として保存
    #[serde(rename = "classification")]
    pub label: String,

    pub confidence: f64,
}

impl ClassificationRecord {
    pub fn from_classification(
        classification: &Classification,
        image_path: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            image_path,
            label: classification.label.clone(),
            confidence: classification.confidence,
        }
    }

    pub fn percent(&self) -> u8 {
        confidence_percent(self.confidence)
    }
}

/// 画像の取得元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AcquisitionSource {
    /// カメラ撮影
    Camera,
    /// カメラロール（写真ライブラリ）から選択
    Library,
    /// 任意のファイルを選択
    File,
}

impl AcquisitionSource {
    /// 取得に必要な権限
    pub fn required_permission(&self) -> Option<PermissionKind> {
        match self {
            AcquisitionSource::Camera => Some(PermissionKind::Camera),
            AcquisitionSource::Library => Some(PermissionKind::MediaLibrary),
            AcquisitionSource::File => None,
        }
    }
}

impl std::fmt::Display for AcquisitionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionSource::Camera => write!(f, "camera"),
            AcquisitionSource::Library => write!(f, "library"),
            AcquisitionSource::File => write!(f, "file"),
        }
    }
}

/// 画像取得リクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRequest {
    pub source: AcquisitionSource,
    /// JPEG再圧縮の品質 (1-100)、Noneなら元画像のまま
    pub quality: Option<u8>,
    /// インラインBase64で受け取る（ファイルURIが使えない環境向け）
    pub inline: bool,
}

impl AcquireRequest {
    pub fn new(source: AcquisitionSource) -> Self {
        Self {
            source,
            quality: None,
            inline: false,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality.clamp(1, 100));
        self
    }

    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }
}

/// デバイス権限の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionKind {
    Camera,
    MediaLibrary,
    Location,
}

impl std::fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionKind::Camera => write!(f, "カメラ"),
            PermissionKind::MediaLibrary => write!(f, "写真ライブラリ"),
            PermissionKind::Location => write!(f, "位置情報"),
        }
    }
}

/// 権限の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// 再確認できない拒否（設定画面から許可が必要）
    DeniedPermanently,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

/// 取得した画像の転送用表現
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImageRef {
    /// ファイルシステム上の画像（モバイル/デスクトップ）
    #[serde(rename_all = "camelCase")]
    Uri {
        path: String,
        display_name: String,
        mime_type: String,
    },
    /// Base64エンコード済みの画像（ファイルURIのない環境）
    #[serde(rename_all = "camelCase")]
    Inline {
        data: String,
        display_name: String,
        mime_type: String,
    },
}

impl ImageRef {
    /// バイト列からインライン表現を作成
    pub fn inline_from_bytes(bytes: &[u8], display_name: &str, mime_type: &str) -> Self {
        ImageRef::Inline {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            display_name: display_name.to_string(),
            mime_type: mime_type.to_string(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ImageRef::Uri { display_name, .. } | ImageRef::Inline { display_name, .. } => {
                display_name
            }
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            ImageRef::Uri { mime_type, .. } | ImageRef::Inline { mime_type, .. } => mime_type,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ImageRef::Inline { .. })
    }

    /// インライン画像のバイト列をデコード
    pub fn decode_inline(&self) -> crate::Result<Option<Vec<u8>>> {
        match self {
            ImageRef::Inline { data, .. } => Ok(Some(
                base64::engine::general_purpose::STANDARD.decode(data)?,
            )),
            ImageRef::Uri { .. } => Ok(None),
        }
    }
}

/// 拡張子からMIMEタイプを判定
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "heic" => Some("image/heic"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// MIMEタイプから保存用の拡張子を決定
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/heic" => "heic",
        "image/webp" => "webp",
        _ => "jpg",
    }
}
