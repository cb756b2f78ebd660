//! 外部コマンドによるカメラ撮影
//!
//! 設定の `camera_command` を実行し、`{output}` に書き出された画像を使う。
//! 例: `fswebcam -r 1280x720 --no-banner {output}`

use super::{image_ref_from_path, ImageSource};
use crate::error::{RashScanError, Result};
use async_trait::async_trait;
use rash_scan_common::{AcquisitionSource, ImageRef};
use std::path::{Path, PathBuf};
use tokio::process::Command;

const OUTPUT_PLACEHOLDER: &str = "{output}";

pub struct CommandCamera {
    command: Option<String>,
    scratch_dir: PathBuf,
}

impl CommandCamera {
    pub fn new(command: Option<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            scratch_dir: scratch_dir.into(),
        }
    }

    fn build_command(template: &str, output: &Path) -> Command {
        let quoted = quote_path(output);
        let line = if template.contains(OUTPUT_PLACEHOLDER) {
            template.replace(OUTPUT_PLACEHOLDER, &quoted)
        } else {
            format!("{} {}", template, quoted)
        };

        // Windowsではcmd /c経由
        #[cfg(windows)]
        let command = {
            let mut c = Command::new("cmd");
            c.args(["/c", &line]);
            c
        };

        #[cfg(not(windows))]
        let command = {
            let mut c = Command::new("sh");
            c.args(["-c", &line]);
            c
        };

        command
    }
}

/// シェルに渡すパスを1語としてクォートする
#[cfg(not(windows))]
fn quote_path(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

#[cfg(windows)]
fn quote_path(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

#[async_trait]
impl ImageSource for CommandCamera {
    fn kind(&self) -> AcquisitionSource {
        AcquisitionSource::Camera
    }

    async fn acquire(&self) -> Result<ImageRef> {
        let template = self.command.as_deref().ok_or_else(|| {
            RashScanError::SourceUnavailable(
                "カメラが設定されていません。`rash-scan config --set-camera-command` で設定してください".into(),
            )
        })?;

        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let output = self.scratch_dir.join(format!(
            "capture-{}.jpg",
            chrono::Utc::now().format("%Y%m%d%H%M%S%f")
        ));

        log::info!("撮影コマンド実行: {}", template);
        let status = Self::build_command(template, &output)
            .status()
            .await
            .map_err(|e| RashScanError::Capture(format!("撮影コマンド実行エラー: {}", e)))?;

        if !status.success() {
            return Err(RashScanError::Capture(format!(
                "撮影コマンドが失敗しました (code {:?})",
                status.code()
            )));
        }

        // 正常終了でも画像がなければ撮影せずに閉じたとみなす
        let written = tokio::fs::metadata(&output)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !written {
            return Err(RashScanError::AcquisitionCancelled);
        }

        image_ref_from_path(&output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_camera_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let camera = CommandCamera::new(None, dir.path());
        assert!(matches!(
            camera.acquire().await,
            Err(RashScanError::SourceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_command_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let camera = CommandCamera::new(Some("printf 'jpeg' > {output}".into()), dir.path());

        let image = camera.acquire().await.unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
        match image {
            ImageRef::Uri { path, .. } => assert_eq!(std::fs::read(path).unwrap(), b"jpeg"),
            other => panic!("Expected Uri, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_output_path_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("Application Support").join("rash-scan").join("tmp");
        let camera = CommandCamera::new(Some("printf 'jpeg' > {output}".into()), &scratch);

        let image = camera.acquire().await.unwrap();
        match image {
            ImageRef::Uri { path, .. } => {
                assert!(Path::new(&path).starts_with(&scratch));
                assert_eq!(std::fs::read(path).unwrap(), b"jpeg");
            }
            other => panic!("Expected Uri, got {:?}", other),
        }
    }

    #[test]
    fn test_quote_path_escapes_single_quote() {
        assert_eq!(quote_path(Path::new("/tmp/it's here")), r"'/tmp/it'\''s here'");
    }

    #[tokio::test]
    async fn test_command_without_output_is_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let camera = CommandCamera::new(Some("true".into()), dir.path());
        // `true {output}` は何も書き出さない
        assert!(matches!(
            camera.acquire().await,
            Err(RashScanError::AcquisitionCancelled)
        ));
    }

    #[tokio::test]
    async fn test_command_failure() {
        let dir = tempfile::tempdir().unwrap();
        let camera = CommandCamera::new(Some("exit 3".into()), dir.path());
        assert!(matches!(
            camera.acquire().await,
            Err(RashScanError::Capture(_))
        ));
    }
}
