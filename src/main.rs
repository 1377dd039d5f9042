//! Command line access to a Baidu Netdisk through the filesystem adapter.

use anyhow::{anyhow, Context, Result};
use baidu_netdisk_fs::config::{ProjectConfig, Settings};
use baidu_netdisk_fs::log_appender::setup_logging;
use baidu_netdisk_fs::netdisk_service::netdisk_models::RenamePolicy;
use baidu_netdisk_fs::{
    AdapterFactory, FilesystemAdapter, NetdiskAdapter, StorageAttributes, WriteOptions,
};
use chrono::{DateTime, Utc};
use clap::{Arg, ArgAction, ArgMatches, Command};
use futures::StreamExt;
use log::{info, LevelFilter};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

fn cli() -> Command {
    Command::new("bdfs")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Browse and transfer files on Baidu Netdisk")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Settings file (defaults to the per-user settings.json)")
                .global(true),
        )
        .arg(
            Arg::new("access-token")
                .long("access-token")
                .value_name("TOKEN")
                .env("BDFS_ACCESS_TOKEN")
                .help("Access token, overrides the settings file")
                .global(true),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("PATH")
                .help("Remote directory all paths are relative to")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log debug output")
                .global(true),
        )
        .subcommand(
            Command::new("ls")
                .about("List a directory")
                .arg(Arg::new("path").default_value(""))
                .arg(
                    Arg::new("recursive")
                        .short('r')
                        .long("recursive")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("stat")
                .about("Show size and modification time of a file")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("get")
                .about("Download a file")
                .arg(Arg::new("remote").required(true))
                .arg(Arg::new("local")),
        )
        .subcommand(
            Command::new("put")
                .about("Upload a file")
                .arg(Arg::new("local").required(true))
                .arg(Arg::new("remote").required(true))
                .arg(
                    Arg::new("rtype")
                        .long("rtype")
                        .value_name("N")
                        .help("Conflict policy: 0 fail, 1 rename, 2 rename if different, 3 overwrite")
                        .value_parser(clap::value_parser!(u8))
                        .default_value("0"),
                ),
        )
        .subcommand(
            Command::new("mkdir")
                .about("Create a directory")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("rm")
                .about("Delete a file or directory")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("mv")
                .about("Move a file or directory")
                .arg(Arg::new("source").required(true))
                .arg(Arg::new("destination").required(true)),
        )
        .subcommand(
            Command::new("cp")
                .about("Copy a file or directory")
                .arg(Arg::new("source").required(true))
                .arg(Arg::new("destination").required(true)),
        )
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: {}", name))
}

fn format_mtime(mtime: Option<i64>) -> String {
    mtime
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// An explicit `--config` file replaces the per-user settings entirely.
fn load_settings(matches: &ArgMatches) -> Result<Settings> {
    let mut settings = match matches.get_one::<String>("config") {
        Some(path) => Settings::load_settings_from_file(Path::new(path))
            .with_context(|| format!("Failed to load settings from {}", path))?,
        None => {
            ProjectConfig::new()
                .context("Failed to load project configuration")?
                .settings
        }
    };

    if let Some(token) = matches.get_one::<String>("access-token") {
        settings.access_token = Some(token.clone());
    }
    if let Some(root) = matches.get_one::<String>("root") {
        settings.root = Some(root.clone());
    }
    Ok(settings)
}

async fn run(adapter: &NetdiskAdapter, command: &str, matches: &ArgMatches) -> Result<()> {
    let options = WriteOptions::default();

    match command {
        "ls" => {
            let path = arg(matches, "path")?;
            let recursive = matches.get_flag("recursive");
            let mut listing = adapter.list_contents(path, recursive);
            while let Some(item) = listing.next().await {
                match item? {
                    StorageAttributes::File(file) => println!(
                        "{:>12}  {}  {}",
                        file.file_size.unwrap_or_default(),
                        format_mtime(file.last_modified),
                        file.path
                    ),
                    StorageAttributes::Directory(dir) => println!(
                        "{:>12}  {}  {}/",
                        "<dir>",
                        format_mtime(dir.last_modified),
                        dir.path
                    ),
                }
            }
        }
        "stat" => {
            let path = arg(matches, "path")?;
            let size = adapter.file_size(path).await?;
            let modified = adapter.last_modified(path).await?;
            println!("path:     {}", size.path);
            println!("size:     {}", size.file_size.unwrap_or_default());
            println!("modified: {}", format_mtime(modified.last_modified));
        }
        "get" => {
            let remote = arg(matches, "remote")?;
            let local = match matches.get_one::<String>("local") {
                Some(local) => PathBuf::from(local),
                None => PathBuf::from(remote.rsplit('/').next().unwrap_or(remote)),
            };
            let mut stream = adapter.read_stream(remote).await?;
            let mut file = tokio::fs::File::create(&local)
                .await
                .with_context(|| format!("Failed to create {}", local.display()))?;
            let size = tokio::io::copy(&mut stream, &mut file).await?;
            file.flush().await?;
            info!("Saved {} bytes to {}", size, local.display());
        }
        "put" => {
            let local = arg(matches, "local")?;
            let remote = arg(matches, "remote")?;
            let code = matches.get_one::<u8>("rtype").copied().unwrap_or_default();
            let rtype = RenamePolicy::from_code(code)
                .ok_or_else(|| anyhow!("Unknown rtype: {}", code))?;
            let mut file = tokio::fs::File::open(local)
                .await
                .with_context(|| format!("Failed to open {}", local))?;
            adapter
                .write_stream(remote, &mut file, &WriteOptions::with_rtype(rtype))
                .await?;
        }
        "mkdir" => adapter.create_directory(arg(matches, "path")?, &options).await?,
        "rm" => adapter.delete(arg(matches, "path")?).await?,
        "mv" => {
            adapter
                .move_file(arg(matches, "source")?, arg(matches, "destination")?, &options)
                .await?
        }
        "cp" => {
            adapter
                .copy_file(arg(matches, "source")?, arg(matches, "destination")?, &options)
                .await?
        }
        other => return Err(anyhow!("Unknown command: {}", other)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    // Global flags are propagated down, so everything is read from the subcommand
    let (command, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("No command given"))?;

    let project_dirs = ProjectConfig::project_dirs()?;
    let level = if sub_matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    setup_logging(project_dirs.data_dir(), level).context("Failed to setup logging")?;

    let settings = load_settings(sub_matches)?;
    let adapter = AdapterFactory::from_config(settings.to_adapter_config()?);

    run(&adapter, command, sub_matches).await
}
