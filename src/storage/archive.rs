//! 画像の内容アドレス保存
//!
//! 画像のSHA-256をファイル名にしてアプリ専用ディレクトリへコピーする。
//! 同じ内容の画像は常に同じパスになる。ハッシュ衝突は考慮しない。

use crate::error::{RashScanError, Result};
use rash_scan_common::{extension_for_mime, ImageRef};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// バイト列のSHA-256（16進小文字）
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// 画像参照からバイト列を取り出す
pub async fn read_image_bytes(image: &ImageRef) -> Result<Vec<u8>> {
    match image {
        ImageRef::Uri { path, .. } => tokio::fs::read(path)
            .await
            .map_err(|e| RashScanError::ImageLoad(format!("{}: {}", path, e))),
        ImageRef::Inline { .. } => Ok(image.decode_inline()?.unwrap_or_default()),
    }
}

#[derive(Debug, Clone)]
pub struct ImageArchive {
    dir: PathBuf,
    overwrite_existing: bool,
}

impl ImageArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            overwrite_existing: false,
        }
    }

    /// 保存済みでも毎回書き直す
    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 画像内容から保存先パスを決める
    pub fn path_for(&self, bytes: &[u8], mime_type: &str) -> PathBuf {
        self.dir.join(format!(
            "{}.{}",
            content_hash(bytes),
            extension_for_mime(mime_type)
        ))
    }

    /// 画像をコピーして保存先パスを返す
    pub async fn store(&self, image: &ImageRef) -> Result<PathBuf> {
        let bytes = read_image_bytes(image).await?;
        let dest = self.path_for(&bytes, image.mime_type());

        if !self.overwrite_existing && tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            log::debug!("保存済みの画像を再利用: {}", dest.display());
            return Ok(dest);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = dest.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &dest).await?;
        log::debug!("画像を保存: {}", dest.display());
        Ok(dest)
    }
}
