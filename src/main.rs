use anyhow::Context;
use clap::Parser;
use rash_scan::acquisition::{
    Acquirer, CachedPermissions, CommandCamera, FileSource, LibraryImage, LibrarySource,
};
use rash_scan::classifier::HttpClassifier;
use rash_scan::cli::{acquire_request, acquisition_source, Cli, Commands};
use rash_scan::config::Config;
use rash_scan::controller::{render_card, CaptureController, CaptureOutcome};
use rash_scan::history_view::HistoryView;
use rash_scan::storage::{FileKeyValueStore, HistoryStore, ImageArchive};
use rash_scan_common::{AcquisitionSource, PermissionKind, PermissionStatus};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = Config::load().context("設定の読み込みに失敗しました")?;

    match cli.command {
        Commands::Classify { image, library, camera, inline, quality, yes } => {
            println!("📸 rash-scan - 画像分類\n");

            let source = acquisition_source(image.as_ref(), library.as_ref(), camera);
            let scratch_dir = config.data_dir()?.join("tmp");

            let permissions = CachedPermissions::new(move |kind| {
                if yes {
                    PermissionStatus::Granted
                } else {
                    prompt_permission(kind)
                }
            });
            let acquirer = Acquirer::new(Arc::new(permissions)).with_scratch_dir(&scratch_dir);
            let acquirer = match source {
                AcquisitionSource::File => {
                    let path = image.context("画像ファイルを指定してください")?;
                    acquirer.with_source(Arc::new(FileSource::new(path)))
                }
                AcquisitionSource::Library => {
                    let folder = library
                        .or_else(dirs::picture_dir)
                        .context("写真フォルダが見つかりません。--library で指定してください")?;
                    acquirer.with_source(Arc::new(LibrarySource::new(folder, pick_from_library)))
                }
                AcquisitionSource::Camera => acquirer.with_source(Arc::new(CommandCamera::new(
                    config.camera_command.clone(),
                    &scratch_dir,
                ))),
            };

            let classifier = HttpClassifier::from_config(&config)?;
            let history = HistoryStore::new(Arc::new(FileKeyValueStore::new(config.store_dir()?)));
            let archive = ImageArchive::new(config.images_dir()?)
                .overwrite_existing(config.overwrite_existing_images);

            let controller =
                CaptureController::new(Arc::new(acquirer), Arc::new(classifier), history)
                    .with_archive(archive);

            println!("- 分類サービス: {}", config.classify_url());
            let outcome = controller
                .capture(acquire_request(source, quality, inline))
                .await;

            if let Some(card) = controller.card().await {
                println!("\n{}", render_card(&card));
            }

            match outcome {
                CaptureOutcome::Succeeded { record, persisted } => {
                    if let Some(path) = &record.image_path {
                        println!("  画像: {}", path);
                    }
                    if persisted {
                        println!("\n✅ 履歴に保存しました");
                    } else {
                        println!("\n⚠ 履歴に保存できませんでした（結果は上記のとおり）");
                    }
                }
                CaptureOutcome::Cancelled => println!("キャンセルしました"),
                CaptureOutcome::Denied { .. } | CaptureOutcome::Failed { .. } => {
                    std::process::exit(1);
                }
                CaptureOutcome::Busy | CaptureOutcome::Discarded { .. } => {}
            }
        }

        Commands::History { clear, json, export } => {
            let history = HistoryStore::new(Arc::new(FileKeyValueStore::new(config.store_dir()?)));

            // 読み込まずに削除する
            if clear {
                HistoryView::new(history).clear_all().await?;
                println!("✔ 履歴を削除しました");
                return Ok(());
            }

            let view = HistoryView::load(history)
                .await
                .context("履歴の読み込みに失敗しました")?;

            if let Some(path) = export {
                view.export(&path)
                    .with_context(|| format!("write {}", path.display()))?;
                println!("✔ 履歴を書き出しました: {}", path.display());
                return Ok(());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(view.rows())?);
                return Ok(());
            }

            let stats = view.stats(chrono::Utc::now());
            println!("分類履歴:");
            println!("  総スキャン数: {}", stats.total);
            println!("  今週: {}", stats.this_week);
            if view.is_empty() {
                println!("\n履歴はありません");
            } else {
                println!();
                for line in view.render_lines() {
                    println!("  {}", line);
                }
            }
        }

        Commands::Config { set_endpoint, set_camera_command, show } => {
            let mut config = config;

            if let Some(endpoint) = set_endpoint {
                config.set_endpoint(endpoint)?;
                println!("✔ 分類サービスのURLを設定しました");
            }

            if let Some(command) = set_camera_command {
                config.set_camera_command(command)?;
                println!("✔ 撮影コマンドを設定しました");
            }

            if show {
                println!("設定:");
                println!("  分類サービス: {}", config.endpoint);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  再送回数: {}", config.max_retries);
                println!("  最大画像サイズ: {} bytes", config.max_upload_bytes);
                println!("  保存先: {}", config.data_dir()?.display());
                println!(
                    "  撮影コマンド: {}",
                    config.camera_command.as_deref().unwrap_or("未設定")
                );
            }
        }
    }

    Ok(())
}

fn prompt_permission(kind: PermissionKind) -> PermissionStatus {
    match dialoguer::Confirm::new()
        .with_prompt(format!("{}へのアクセスを許可しますか?", kind))
        .default(false)
        .interact()
    {
        Ok(true) => PermissionStatus::Granted,
        Ok(false) => PermissionStatus::Denied,
        // 端末がなく確認できない
        Err(_) => PermissionStatus::DeniedPermanently,
    }
}

fn pick_from_library(images: &[LibraryImage]) -> Option<usize> {
    let items: Vec<String> = images
        .iter()
        .map(|img| match img.modified {
            Some(t) => format!("{}  ({})", img.file_name, t.format("%Y-%m-%d %H:%M")),
            None => img.file_name.clone(),
        })
        .collect();

    dialoguer::Select::new()
        .with_prompt("写真を選択 (Escでキャンセル)")
        .items(&items)
        .default(0)
        .interact_opt()
        .ok()
        .flatten()
}
