use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use colored::Colorize;
use okv_controller::{AppenderController, StorageController};
use okv_store::RemoteConfig;
use okv_types::Metadata;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let storage = build_storage(&cli)?;
    match cli.layer {
        Layer::Storage => run_storage(storage, cli.command).await,
        Layer::Appender => {
            run_appender(AppenderController::from_storage(storage), cli.command).await
        }
    }
}

fn build_storage(cli: &Cli) -> anyhow::Result<StorageController> {
    match cli.service {
        Service::InMemory => Ok(StorageController::in_memory()),
        Service::FlatFile => {
            let base = cli
                .base_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("okv_store"));
            Ok(StorageController::flat_file(base))
        }
        Service::Remote => {
            let mut config = match &cli.endpoint {
                Some(endpoint) => RemoteConfig::new(endpoint.clone()),
                None => RemoteConfig::for_region(&cli.region),
            };
            config.region = cli.region.clone();
            config = config.with_acl(cli.acl.clone());
            Ok(StorageController::remote(config)?)
        }
    }
}

async fn run_storage(storage: StorageController, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get(args) => {
            match storage
                .get(&args.namespace, &args.id, args.key.as_deref())
                .await?
            {
                Some(record) => write_payload(&record.payload)?,
                None => println!("No object found."),
            }
            Ok(())
        }
        Command::Put(args) => {
            let payload = read_payload_file(args.file.as_deref(), "put")?;
            let metadata = Metadata {
                gzip: args.gzip,
                mime_type: args.mime_type,
                ttl: None,
            };
            storage
                .put(&args.namespace, &args.id, args.key.as_deref(), payload, metadata)
                .await?;
            println!("{} Put successful.", "✓".green());
            Ok(())
        }
        Command::Delete(args) => {
            storage
                .delete(&args.namespace, &args.id, args.key.as_deref())
                .await?;
            println!("{} Item deleted.", "✓".green());
            Ok(())
        }
        Command::Scan(args) => {
            let hits = storage
                .scan(&args.namespace, args.id.as_deref(), args.key.as_deref())
                .await?;
            print_scan(&hits);
            Ok(())
        }
        Command::Append(_) | Command::GetLatest(_) => {
            bail!("invalid action for the storage layer; use --layer appender")
        }
    }
}

async fn run_appender(appender: AppenderController, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get(args) => {
            match appender
                .get(&args.namespace, &args.id, args.key.as_deref())
                .await?
            {
                Some(record) => write_payload(&record.payload)?,
                None => println!("No object found."),
            }
            Ok(())
        }
        Command::Append(args) => {
            let payload = read_payload_file(args.file.as_deref(), "append")?;
            let key = args
                .key
                .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string());
            let metadata = Metadata {
                gzip: args.gzip,
                mime_type: args.mime_type,
                ttl: None,
            };
            appender
                .append(&args.namespace, &args.id, &key, payload, metadata)
                .await?;
            println!("{} Appended version {}.", "✓".green(), key.yellow());
            Ok(())
        }
        Command::GetLatest(args) => {
            match appender.get_latest(&args.namespace, &args.id).await? {
                Some(record) => write_payload(&record.payload)?,
                None => println!("No latest object found."),
            }
            Ok(())
        }
        Command::Delete(args) => {
            appender
                .delete(&args.namespace, &args.id, args.key.as_deref())
                .await?;
            println!("{} Item deleted.", "✓".green());
            Ok(())
        }
        Command::Scan(args) => {
            let hits = appender
                .scan(&args.namespace, args.id.as_deref(), args.key.as_deref())
                .await?;
            print_scan(&hits);
            Ok(())
        }
        Command::Put(_) => {
            bail!("invalid action for the appender layer; use --layer storage or `append`")
        }
    }
}

fn read_payload_file(file: Option<&std::path::Path>, action: &str) -> anyhow::Result<Vec<u8>> {
    let Some(path) = file else {
        bail!("--file is required for the {action} action");
    };
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_payload(payload: &[u8]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(payload)?;
    stdout.flush()?;
    Ok(())
}

fn print_scan(hits: &[okv_types::ScanEntry]) {
    if hits.is_empty() {
        println!("No objects found.");
        return;
    }
    for hit in hits {
        let mime = hit
            .record
            .metadata
            .mime_type
            .as_deref()
            .unwrap_or("-");
        let gzip = if hit.record.metadata.gzip { " gzip" } else { "" };
        println!(
            "{}  {} bytes  {}{}",
            hit.address.to_string().bold(),
            hit.record.payload.len(),
            mime,
            gzip
        );
    }
}
