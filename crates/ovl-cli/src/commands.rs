use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use ovl_server::{OverlayServer, Scheme, ServerConfig};
use ovl_store::{EntryStore, FsEntryStore, WriteMode};
use ovl_types::StoreKey;
use tokio::signal;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Key(args) => cmd_key(args, &cli.format),
        Command::Show(args) => cmd_show(args, &cli.format).await,
        Command::Rm(args) => cmd_rm(args).await,
    }
}

/// Config file first, then flag overrides.
fn server_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(addr) = args.listen {
        config.bind_addr = addr;
    }
    if let Some(host) = &args.origin {
        config.origin.host = host.clone();
    }
    if let Some(dir) = &args.data {
        config.store_root = dir.clone();
    }
    if let Some(scheme) = args.origin_scheme {
        config.origin.scheme = match scheme {
            OriginScheme::Http => Scheme::Http,
            OriginScheme::Https => Scheme::Https,
        };
    }
    if args.insecure {
        config.origin.insecure_skip_verify = true;
    }
    if args.staged_writes {
        config.write_mode = WriteMode::Staged;
    }
    if args.max_shadow_bytes.is_some() {
        config.max_shadow_bytes = args.max_shadow_bytes;
    }
    if let Some(secs) = args.request_timeout {
        config.request_timeout = Duration::from_secs(secs);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = server_config(&args)?;
    println!(
        "{} Overlay on {} → {} (store: {})",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.origin.base_url().cyan(),
        config.store_root.display()
    );
    OverlayServer::new(config)
        .serve_with_shutdown(shutdown_signal())
        .await
        .context("overlay server failed")
}

fn cmd_key(args: KeyArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let key = StoreKey::derive(&args.path);
    match format {
        OutputFormat::Text => println!("{}", key.to_hex()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "path": args.path, "key": key.to_hex() })
        ),
    }
    Ok(())
}

/// What `show` reports about one stored entry.
#[derive(Debug)]
struct EntrySummary {
    path: String,
    key: StoreKey,
    file: PathBuf,
    headers: Vec<(String, String)>,
    body_bytes: u64,
}

async fn open_existing(root: &Path) -> anyhow::Result<FsEntryStore> {
    if !root.is_dir() {
        bail!("store root {} does not exist", root.display());
    }
    Ok(FsEntryStore::open(root, WriteMode::Direct).await?)
}

async fn load_entry(root: &Path, path: &str) -> anyhow::Result<EntrySummary> {
    let store = open_existing(root).await?;
    let entry = store
        .get(path)
        .await
        .with_context(|| format!("failed to read entry {path}"))?;
    let (headers, mut body) = entry.into_parts();
    let body_bytes = tokio::io::copy(&mut body, &mut tokio::io::sink())
        .await
        .with_context(|| format!("failed to read body of {path}"))?;
    Ok(EntrySummary {
        path: path.to_string(),
        key: StoreKey::derive(path),
        file: store.location(path),
        headers: headers.into_iter().collect(),
        body_bytes,
    })
}

async fn cmd_show(args: ShowArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let summary = load_entry(&args.data, &args.path).await?;
    match format {
        OutputFormat::Text => {
            println!("Entry {} ({})", summary.path.bold(), summary.key.short_hex().yellow());
            println!("  File: {}", summary.file.display().to_string().dimmed());
            for (name, value) in &summary.headers {
                println!("  {}: {}", name.cyan(), value);
            }
            println!("  Body: {} bytes", summary.body_bytes);
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "path": summary.path,
                "key": summary.key.to_hex(),
                "file": summary.file,
                "headers": summary.headers,
                "body_bytes": summary.body_bytes,
            })
        ),
    }
    Ok(())
}

async fn cmd_rm(args: RmArgs) -> anyhow::Result<()> {
    let store = open_existing(&args.data).await?;
    store
        .delete(&args.path)
        .await
        .with_context(|| format!("failed to delete entry {}", args.path))?;
    println!("{} Deleted {}", "✓".green(), args.path.bold());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovl_store::Entry;
    use ovl_types::HeaderSet;

    fn serve_args() -> ServeArgs {
        ServeArgs {
            config: None,
            listen: None,
            origin: None,
            data: None,
            origin_scheme: None,
            insecure: false,
            staged_writes: false,
            max_shadow_bytes: None,
            request_timeout: None,
        }
    }

    #[test]
    fn serve_requires_origin() {
        assert!(server_config(&serve_args()).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ovl.toml");
        std::fs::write(
            &file,
            "bind_addr = \"127.0.0.1:7000\"\nstore_root = \"/srv/ovl\"\n\n[origin]\nhost = \"a.example\"\ninsecure_skip_verify = false\n",
        )
        .unwrap();

        let mut args = serve_args();
        args.config = Some(file);
        args.origin = Some("b.example:8443".into());
        args.origin_scheme = Some(OriginScheme::Http);
        args.staged_writes = true;
        args.request_timeout = Some(3);
        let config = server_config(&args).unwrap();

        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.store_root, PathBuf::from("/srv/ovl"));
        assert_eq!(config.origin.base_url(), "http://b.example:8443");
        assert!(!config.origin.insecure_skip_verify);
        assert_eq!(config.write_mode, WriteMode::Staged);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn show_and_rm_work_on_a_store_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEntryStore::open(dir.path(), WriteMode::Direct).await.unwrap();
        let headers: HeaderSet = [("Content-Type", "text/plain")].into_iter().collect();
        store
            .set("/foo", Entry::from_bytes(headers, "hello"))
            .await
            .unwrap();

        let summary = load_entry(dir.path(), "/foo").await.unwrap();
        assert_eq!(summary.body_bytes, 5);
        assert_eq!(
            summary.headers,
            vec![("Content-Type".to_string(), "text/plain".to_string())]
        );
        assert_eq!(summary.file, dir.path().join(StoreKey::derive("/foo").to_hex()));

        cmd_rm(RmArgs {
            path: "/foo".into(),
            data: dir.path().to_path_buf(),
        })
        .await
        .unwrap();
        assert!(load_entry(dir.path(), "/foo").await.is_err());
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_entry(&dir.path().join("nope"), "/foo").await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
