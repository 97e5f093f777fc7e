//! Pack commands: install, uninstall, list and single sticker fetch.

use clap::Args;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::common::{describe_pack, parse_link, Manager};
use crate::error::CliError;

/// Arguments for `fetch`.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Share link of the pack
    pub link: String,

    /// Sticker index within the pack
    pub index: u32,

    /// Copy the decrypted sticker to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Install the pack behind `link` and all of its stickers.
pub async fn run_install(manager: &Manager, link: &str) -> Result<(), CliError> {
    let identity = parse_link(link)?;
    let manifest = manager.install(&identity).await?;

    let installed = manager.installed_stickers(&identity, true)?.len();
    println!("Installed {}", describe_pack(&manifest));
    if installed < manifest.items.len() {
        warn!(
            pack_id = %identity.pack_id_hex(),
            installed,
            total = manifest.items.len(),
            "Some stickers could not be downloaded"
        );
        println!(
            "  {} of {} stickers downloaded; run 'stickerdepot refresh' to retry",
            installed,
            manifest.items.len()
        );
    }
    Ok(())
}

/// Uninstall the pack behind `link`.
pub fn run_uninstall(manager: &Manager, link: &str) -> Result<(), CliError> {
    let identity = parse_link(link)?;
    if manager.uninstall(&identity)? {
        println!("Uninstalled pack {}", identity.pack_id_hex());
    } else {
        println!("Pack {} is not saved", identity.pack_id_hex());
    }
    Ok(())
}

/// Print installed packs, then saved but uninstalled ones.
pub fn run_list(manager: &Manager, all: bool) -> Result<(), CliError> {
    let installed = manager.installed_packs()?;
    if installed.is_empty() {
        println!("No installed packs");
    }
    for manifest in &installed {
        println!("{}", describe_pack(manifest));
    }

    if all {
        for manifest in manager.available_packs()? {
            println!("{}", describe_pack(&manifest));
        }
    }
    Ok(())
}

/// Fetch one sticker, downloading it if needed.
pub async fn run_fetch(manager: &Manager, args: FetchArgs) -> Result<(), CliError> {
    let identity = parse_link(&args.link)?;
    let file = manager.fetch_sticker(&identity.sticker(args.index)).await?;

    match args.output {
        Some(output) => {
            copy_to(&file, &output)?;
            println!("{}", output.display());
        }
        None => println!("{}", file.display()),
    }
    Ok(())
}

fn copy_to(source: &Path, target: &Path) -> Result<(), CliError> {
    std::fs::copy(source, target)
        .map(|_| ())
        .map_err(|error| CliError::FileWrite {
            path: target.display().to_string(),
            error,
        })
}
