//! Command execution.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use blockload_blob::{BlobClient, BlobTarget};
use blockload_crypto::{AesGcmEncoder, BlockEncoder, EncryptionKey, PlaintextEncoder};
use blockload_protocol::{ByteRange, UploadTarget};
use blockload_uploader::{BlockUploader, UploadEvent, UploadResult, download_object};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::{Command, TargetArgs};
use crate::config::Config;

pub async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    match command {
        Command::Upload {
            file,
            block_size,
            concurrency,
            content_type,
            encrypt,
            no_md5,
            result,
            target,
        } => {
            let mut options = config.upload.clone();
            if let Some(block_size) = block_size {
                options.block_size = block_size;
            }
            if let Some(concurrency) = concurrency {
                options.concurrency = concurrency;
            }
            if let Some(content_type) = content_type {
                options.content_type = content_type;
            }
            if no_md5 {
                options.content_md5 = false;
            }

            let key = if encrypt {
                Some(resolve_key(&target, &config)?)
            } else {
                None
            };
            let upload_target = resolve_target(&target, &config)?;

            let client = BlobClient::new()?.with_content_md5(options.content_md5);
            let store = Arc::new(BlobTarget::new(client, upload_target));
            let mut uploader = BlockUploader::new(store, options);
            if let Some(key) = &key {
                uploader = uploader.with_encryption(key);
            }

            if let Some(events) = uploader.take_events() {
                tokio::spawn(report_progress(events));
            }
            let cancel = uploader.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling upload");
                    cancel.cancel();
                }
            });

            let outcome = uploader.upload(&file).await?;
            write_result(&outcome, result.as_deref())
        }
        Command::Stat { target } => {
            let upload_target = resolve_target(&target, &config)?;
            let props = BlobClient::new()?
                .get_blob_properties(&upload_target)
                .await?;
            println!("{}", serde_json::to_string_pretty(&props)?);
            Ok(())
        }
        Command::Get {
            range,
            artifacts,
            out,
            target,
        } => {
            let upload_target = resolve_target(&target, &config)?;
            let client = BlobClient::new()?;

            let data = match artifacts {
                Some(path) => {
                    download_with_artifacts(client, upload_target, &path, &target, &config).await?
                }
                None => fetch(&client, &upload_target, range).await?,
            };
            write_output(&data, out.as_deref())
        }
        Command::Keygen { save } => {
            let key = EncryptionKey::generate();
            if save {
                let mut config = config;
                config.encryption_key = Some(key.to_base64());
                let path = config.save()?;
                info!(path = %path.display(), "encryption key saved");
            } else {
                println!("{}", key.to_base64());
            }
            Ok(())
        }
    }
}

/// `--url` wins, keeping the configured headers; otherwise `[target]`.
fn resolve_target(args: &TargetArgs, config: &Config) -> anyhow::Result<UploadTarget> {
    match (&args.url, &config.target) {
        (Some(url), Some(configured)) => Ok(UploadTarget {
            url: url.clone(),
            headers: configured.headers.clone(),
        }),
        (Some(url), None) => Ok(UploadTarget::new(url.clone())),
        (None, Some(configured)) => Ok(configured.clone()),
        (None, None) => bail!("no target URL: pass --url or set [target] url in the config"),
    }
}

fn resolve_key(args: &TargetArgs, config: &Config) -> anyhow::Result<EncryptionKey> {
    let encoded = args
        .key
        .as_deref()
        .or(config.encryption_key.as_deref())
        .context("no encryption key: pass --key, set encryption_key, or run `blockload keygen --save`")?;
    Ok(EncryptionKey::from_base64(encoded)?)
}

async fn fetch(
    client: &BlobClient,
    target: &UploadTarget,
    range: Option<ByteRange>,
) -> anyhow::Result<Vec<u8>> {
    Ok(client.get_block(&target.url, range, &target.headers).await?)
}

async fn download_with_artifacts(
    client: BlobClient,
    upload_target: UploadTarget,
    result_path: &Path,
    args: &TargetArgs,
    config: &Config,
) -> anyhow::Result<Vec<u8>> {
    let content = std::fs::read_to_string(result_path)
        .with_context(|| format!("reading {}", result_path.display()))?;
    let result: UploadResult = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", result_path.display()))?;

    let encoder: Box<dyn BlockEncoder> = if result.is_encrypted() {
        Box::new(AesGcmEncoder::new(&resolve_key(args, config)?))
    } else {
        Box::new(PlaintextEncoder)
    };

    let store = BlobTarget::new(client, upload_target);
    Ok(download_object(&store, encoder.as_ref(), result.artifacts.as_deref()).await?)
}

async fn report_progress(mut events: mpsc::Receiver<UploadEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::Started {
                upload_id,
                total_size,
                block_count,
            } => {
                info!(upload_id = %upload_id, total_size, blocks = block_count, "upload started");
            }
            UploadEvent::Progress {
                completed_blocks,
                block_count,
                progress,
                bytes_per_second,
                eta,
                ..
            } => {
                info!(
                    completed = completed_blocks,
                    total = block_count,
                    percent = format_args!("{:.1}", progress * 100.0),
                    speed = %format_speed(bytes_per_second),
                    eta_secs = eta.map(|d| d.as_secs()),
                    "uploading"
                );
            }
            UploadEvent::Committed { .. } | UploadEvent::Failed { .. } => break,
        }
    }
}

fn format_speed(bytes_per_second: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    if bytes_per_second >= MIB {
        format!("{:.1} MiB/s", bytes_per_second / MIB)
    } else if bytes_per_second >= KIB {
        format!("{:.1} KiB/s", bytes_per_second / KIB)
    } else {
        format!("{bytes_per_second:.0} B/s")
    }
}

fn write_result(result: &UploadResult, path: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    match path {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "upload result written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn write_output(data: &[u8], path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = data.len(), "object written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
