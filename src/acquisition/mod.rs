//! 画像取得
//!
//! カメラ撮影・写真ライブラリ・ファイル選択のいずれかから画像を得て、
//! 送信用の `ImageRef`（ファイルURI / インラインBase64）に正規化する。

mod camera;
mod library;
mod permissions;

pub use camera::CommandCamera;
pub use library::{scan_folder, LibraryImage, LibrarySource};
pub use permissions::{CachedPermissions, PermissionGate};

use crate::error::{RashScanError, Result};
use crate::storage::read_image_bytes;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use rash_scan_common::{
    mime_from_extension, AcquireRequest, AcquisitionSource, ImageRef, PermissionStatus,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[async_trait]
pub trait ImageSource: Send + Sync {
    fn kind(&self) -> AcquisitionSource;

    /// 画像を1枚取得する
    ///
    /// ユーザーが選ばずに閉じた場合は `AcquisitionCancelled`
    async fn acquire(&self) -> Result<ImageRef>;
}

/// パスから `ImageRef::Uri` を作る
pub fn image_ref_from_path(path: &Path) -> Result<ImageRef> {
    if !path.is_file() {
        return Err(RashScanError::ImageLoad(format!(
            "ファイルが見つかりません: {}",
            path.display()
        )));
    }

    let mime_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_from_extension)
        .ok_or_else(|| RashScanError::UnsupportedImage(path.display().to_string()))?;

    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(ImageRef::Uri {
        path: path.display().to_string(),
        display_name,
        mime_type: mime_type.to_string(),
    })
}

/// 起動時に指定されたファイルを使う
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ImageSource for FileSource {
    fn kind(&self) -> AcquisitionSource {
        AcquisitionSource::File
    }

    async fn acquire(&self) -> Result<ImageRef> {
        image_ref_from_path(&self.path)
    }
}

/// JPEGで再圧縮する
pub fn recompress_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| RashScanError::ImageLoad(format!("画像のデコードに失敗: {}", e)))?;

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&decoded.to_rgb8())
        .map_err(|e| RashScanError::ImageLoad(format!("JPEGエンコードに失敗: {}", e)))?;
    Ok(out)
}

fn jpeg_name(display_name: &str) -> String {
    let stem = Path::new(display_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    format!("{}.jpg", stem)
}

/// 権限確認と取得元の振り分け、取得後の正規化を行う
pub struct Acquirer {
    permissions: Arc<dyn PermissionGate>,
    sources: Vec<Arc<dyn ImageSource>>,
    scratch_dir: PathBuf,
}

impl Acquirer {
    pub fn new(permissions: Arc<dyn PermissionGate>) -> Self {
        Self {
            permissions,
            sources: Vec::new(),
            scratch_dir: std::env::temp_dir().join("rash-scan"),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// 再圧縮した画像の一時保存先（撮影コマンドの出力先もこの下に置く）
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub async fn acquire(&self, request: &AcquireRequest) -> Result<ImageRef> {
        let source = self
            .sources
            .iter()
            .find(|s| s.kind() == request.source)
            .ok_or_else(|| {
                RashScanError::SourceUnavailable(format!("{}は利用できません", request.source))
            })?;

        if let Some(kind) = request.source.required_permission() {
            let status = self.permissions.request(kind).await;
            if !status.is_granted() {
                return Err(RashScanError::AcquisitionDenied {
                    kind,
                    permanent: status == PermissionStatus::DeniedPermanently,
                });
            }
        }

        let image = source.acquire().await?;
        log::debug!("画像を取得: {} ({})", image.display_name(), image.mime_type());
        self.normalize(image, request).await
    }

    /// 一時保存先にある画像ファイルを削除する
    ///
    /// 撮影コマンドの出力と再圧縮した画像が対象。それ以外の画像には何もしない
    pub async fn release(&self, image: &ImageRef) {
        let ImageRef::Uri { path, .. } = image else {
            return;
        };
        let path = Path::new(path);
        if !path.starts_with(&self.scratch_dir) {
            return;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => log::debug!("一時ファイルを削除: {}", path.display()),
            Err(e) => log::warn!("一時ファイルの削除に失敗: {}: {}", path.display(), e),
        }
    }

    async fn normalize(&self, image: ImageRef, request: &AcquireRequest) -> Result<ImageRef> {
        if let Some(quality) = request.quality {
            let bytes = read_image_bytes(&image).await?;
            self.release(&image).await;
            let compressed =
                tokio::task::spawn_blocking(move || recompress_jpeg(&bytes, quality))
                    .await
                    .map_err(|e| RashScanError::ImageLoad(e.to_string()))??;
            let name = jpeg_name(image.display_name());

            if request.inline {
                return Ok(ImageRef::inline_from_bytes(&compressed, &name, "image/jpeg"));
            }

            tokio::fs::create_dir_all(&self.scratch_dir).await?;
            let path = self.scratch_dir.join(format!(
                "q{}-{}-{}",
                quality,
                chrono::Utc::now().format("%Y%m%d%H%M%S%f"),
                name
            ));
            tokio::fs::write(&path, &compressed).await?;
            return Ok(ImageRef::Uri {
                path: path.display().to_string(),
                display_name: name,
                mime_type: "image/jpeg".to_string(),
            });
        }

        if request.inline && !image.is_inline() {
            let bytes = read_image_bytes(&image).await?;
            self.release(&image).await;
            return Ok(ImageRef::inline_from_bytes(
                &bytes,
                image.display_name(),
                image.mime_type(),
            ));
        }

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_png(path: &Path) {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 30, 30]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        std::fs::write(path, buf.into_inner()).unwrap();
    }

    #[test]
    fn test_image_ref_from_path_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"text").unwrap();
        assert!(matches!(
            image_ref_from_path(&path),
            Err(RashScanError::UnsupportedImage(_))
        ));
    }

    #[test]
    fn test_image_ref_from_path_missing() {
        assert!(matches!(
            image_ref_from_path(Path::new("/nonexistent/a.jpg")),
            Err(RashScanError::ImageLoad(_))
        ));
    }

    #[tokio::test]
    async fn test_file_source_needs_no_permission() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arm.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let acquirer = Acquirer::new(Arc::new(CachedPermissions::fixed(
            PermissionStatus::DeniedPermanently,
        )))
        .with_source(Arc::new(FileSource::new(&path)));

        let image = acquirer
            .acquire(&AcquireRequest::new(AcquisitionSource::File))
            .await
            .unwrap();
        assert_eq!(image.display_name(), "arm.jpg");
        assert!(!image.is_inline());
    }

    #[tokio::test]
    async fn test_library_denied() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = Acquirer::new(Arc::new(CachedPermissions::fixed(PermissionStatus::Denied)))
            .with_source(Arc::new(LibrarySource::new(dir.path(), |_| Some(0))));

        let result = acquirer
            .acquire(&AcquireRequest::new(AcquisitionSource::Library))
            .await;
        assert!(matches!(
            result,
            Err(RashScanError::AcquisitionDenied { permanent: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_source_is_unavailable() {
        let acquirer = Acquirer::new(Arc::new(CachedPermissions::fixed(PermissionStatus::Granted)));
        let result = acquirer
            .acquire(&AcquireRequest::new(AcquisitionSource::Camera))
            .await;
        assert!(matches!(result, Err(RashScanError::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_inline_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leg.png");
        std::fs::write(&path, b"png-bytes").unwrap();

        let acquirer = Acquirer::new(Arc::new(CachedPermissions::fixed(PermissionStatus::Granted)))
            .with_source(Arc::new(FileSource::new(&path)));
        let image = acquirer
            .acquire(&AcquireRequest::new(AcquisitionSource::File).inline(true))
            .await
            .unwrap();

        assert!(image.is_inline());
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.decode_inline().unwrap().unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_quality_recompresses_to_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rash.png");
        write_png(&path);

        let acquirer = Acquirer::new(Arc::new(CachedPermissions::fixed(PermissionStatus::Granted)))
            .with_source(Arc::new(FileSource::new(&path)))
            .with_scratch_dir(dir.path().join("scratch"));
        let image = acquirer
            .acquire(&AcquireRequest::new(AcquisitionSource::File).with_quality(60))
            .await
            .unwrap();

        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.display_name(), "rash.jpg");
        let bytes = read_image_bytes(&image).await.unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_recompress_rejects_non_image() {
        assert!(matches!(
            recompress_jpeg(b"not an image", 80),
            Err(RashScanError::ImageLoad(_))
        ));
    }
}
