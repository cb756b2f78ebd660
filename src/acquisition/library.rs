//! 写真ライブラリ（カメラロール）からの選択

use super::{image_ref_from_path, ImageSource};
use crate::error::{RashScanError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use rash_scan_common::{mime_from_extension, AcquisitionSource, ImageRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct LibraryImage {
    pub path: PathBuf,
    pub file_name: String,
    pub modified: Option<DateTime<Local>>,
}

/// フォルダ直下の画像を新しい順に列挙
pub fn scan_folder(folder: &Path) -> Result<Vec<LibraryImage>> {
    if !folder.is_dir() {
        return Err(RashScanError::SourceUnavailable(format!(
            "写真フォルダが見つかりません: {}",
            folder.display()
        )));
    }

    let mut images: Vec<LibraryImage> = WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(mime_from_extension)
                .is_some()
        })
        .map(|e| LibraryImage {
            file_name: e.file_name().to_string_lossy().to_string(),
            modified: e
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Local>::from),
            path: e.into_path(),
        })
        .collect();

    // カメラロールと同じく新しい順、同時刻はファイル名順
    images.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });

    Ok(images)
}

type PickFn = dyn Fn(&[LibraryImage]) -> Option<usize> + Send + Sync;

/// フォルダを写真ライブラリとして扱い、`picker` に1枚選ばせる
///
/// `picker` がNoneを返したらキャンセル扱い
pub struct LibrarySource {
    folder: PathBuf,
    picker: Arc<PickFn>,
}

impl LibrarySource {
    pub fn new<F>(folder: impl Into<PathBuf>, picker: F) -> Self
    where
        F: Fn(&[LibraryImage]) -> Option<usize> + Send + Sync + 'static,
    {
        Self {
            folder: folder.into(),
            picker: Arc::new(picker),
        }
    }
}

#[async_trait]
impl ImageSource for LibrarySource {
    fn kind(&self) -> AcquisitionSource {
        AcquisitionSource::Library
    }

    async fn acquire(&self) -> Result<ImageRef> {
        let folder = self.folder.clone();
        let picker = self.picker.clone();

        let picked = tokio::task::spawn_blocking(move || -> Result<Option<LibraryImage>> {
            let images = scan_folder(&folder)?;
            if images.is_empty() {
                return Err(RashScanError::SourceUnavailable(format!(
                    "写真がありません: {}",
                    folder.display()
                )));
            }
            Ok(picker(&images).and_then(|index| images.into_iter().nth(index)))
        })
        .await
        .map_err(|e| RashScanError::SourceUnavailable(e.to_string()))??;

        match picked {
            Some(image) => image_ref_from_path(&image.path),
            None => Err(RashScanError::AcquisitionCancelled),
        }
    }
}
