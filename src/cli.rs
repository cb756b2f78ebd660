use clap::{Parser, Subcommand};
use rash_scan_common::{AcquireRequest, AcquisitionSource};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rash-scan")]
#[command(about = "皮膚画像の撮影・分類・履歴管理ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像を取得して分類し、履歴に保存
    Classify {
        /// 画像ファイル（ファイル選択）
        #[arg(conflicts_with_all = ["library", "camera"])]
        image: Option<PathBuf>,

        /// 写真フォルダから選択
        #[arg(short, long, conflicts_with = "camera")]
        library: Option<PathBuf>,

        /// カメラで撮影（設定の camera_command を使用）
        #[arg(short, long)]
        camera: bool,

        /// Base64のJSONで送信
        #[arg(long)]
        inline: bool,

        /// JPEG再圧縮の品質 (1-100)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,

        /// 権限確認をすべて許可
        #[arg(short, long)]
        yes: bool,
    },

    /// 分類履歴を表示
    History {
        /// 履歴をすべて削除
        #[arg(long)]
        clear: bool,

        /// JSONで出力
        #[arg(long)]
        json: bool,

        /// 履歴をJSONファイルに書き出す
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// 分類サービスのURLを設定
        #[arg(long)]
        set_endpoint: Option<String>,

        /// 撮影コマンドを設定（`{output}` が保存先に置換される。空文字で解除）
        #[arg(long)]
        set_camera_command: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

/// 引数から取得元を決める（指定なしはファイル選択）
pub fn acquisition_source(image: Option<&PathBuf>, library: Option<&PathBuf>, camera: bool) -> AcquisitionSource {
    if camera {
        AcquisitionSource::Camera
    } else if library.is_some() || image.is_none() {
        AcquisitionSource::Library
    } else {
        AcquisitionSource::File
    }
}

pub fn acquire_request(source: AcquisitionSource, quality: Option<u8>, inline: bool) -> AcquireRequest {
    let request = AcquireRequest::new(source).inline(inline);
    match quality {
        Some(q) => request.with_quality(q),
        None => request,
    }
}
