//! Main entry point for the packer CLI application.
//!
//! Resolves the filesystem the same way an application embedding assets
//! would, then lets the user look inside it.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use packer::cli::Command;
use packer::{Cli, File, FileInfo, FileSystem, HttpRangeReader, LocalFileReader, Root};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let mut remote = None;
    let root = if cli.is_http_url() {
        let url = cli.file.clone().unwrap_or_default();
        let reader = HttpRangeReader::new(url.clone())
            .await
            .with_context(|| format!("cannot open {url}"))?;
        let reader = Arc::new(reader);
        remote = Some(reader.clone());
        packer::open_root_from(reader, &cli.dir).await?
    } else if let Some(file) = &cli.file {
        let reader = LocalFileReader::new(Path::new(file))
            .with_context(|| format!("cannot open {file}"))?;
        packer::open_root_from(Arc::new(reader), &cli.dir).await?
    } else {
        packer::open_root(&cli.dir).await?
    };

    let result = match &cli.command {
        Command::Info => info(&root),
        Command::Ls { path, long } => list(&root, path, *long).await,
        Command::Cat {
            path,
            offset,
            length,
        } => cat(&root, path, *offset, *length).await,
        Command::Stat { path } => stat(&root, path).await,
    };

    // Display network transfer statistics for HTTP sources
    if let Some(reader) = remote {
        log::info!("total bytes transferred: {}", reader.transferred_bytes());
    }

    result
}

fn info(root: &Root) -> Result<()> {
    match root {
        Root::Embedded { bounds, fs } => {
            let archive = fs.archive();
            println!("embedded archive: yes");
            println!("offset:           {}", bounds.start);
            println!("length:           {}", archive.size());
            println!("entries:          {}", archive.entries().len());
            if !archive.comment().is_empty() {
                println!(
                    "comment:          {}",
                    String::from_utf8_lossy(archive.comment())
                );
            }
        }
        Root::Directory(fs) => {
            println!("embedded archive: no");
            println!("serving:          {}", fs.root().display());
        }
    }
    Ok(())
}

async fn list(root: &Root, path: &str, long: bool) -> Result<()> {
    let mut dir = root.open(path).await?;

    let mut entries = Vec::new();
    let listed = read_dir(dir.as_mut(), &mut entries).await;
    dir.close().await?;
    listed.with_context(|| format!("cannot list {path}"))?;

    for entry in &entries {
        let name = if entry.is_dir {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        };
        if long {
            println!(
                "{:>10}  {}  {}",
                entry.size,
                entry.modified.format("%Y-%m-%d %H:%M"),
                name
            );
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

async fn read_dir(dir: &mut dyn File, out: &mut Vec<FileInfo>) -> packer::Result<()> {
    while let Some(batch) = dir.readdir(64).await? {
        out.extend(batch);
    }
    Ok(())
}

async fn cat(root: &Root, path: &str, offset: u64, length: Option<u64>) -> Result<()> {
    let mut file = root.open(path).await?;
    let copied = copy_range(file.as_mut(), offset, length).await;
    file.close().await?;
    copied.with_context(|| format!("cannot read {path}"))
}

async fn copy_range(file: &mut dyn File, offset: u64, length: Option<u64>) -> Result<()> {
    if offset > 0 {
        file.seek(std::io::SeekFrom::Start(offset)).await?;
    }

    let mut stdout = tokio::io::stdout();
    let mut remaining = length.unwrap_or(u64::MAX);
    let mut buf = vec![0u8; 64 * 1024];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..want]).await?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n]).await?;
        remaining -= n as u64;
    }
    stdout.flush().await?;
    Ok(())
}

async fn stat(root: &Root, path: &str) -> Result<()> {
    let mut file = root.open(path).await?;
    let info = file.stat().await;
    file.close().await?;
    let info = info?;

    println!("name:     {}", info.name);
    println!("path:     {}", info.path);
    println!("size:     {}", info.size);
    println!("modified: {}", info.modified.to_rfc3339());
    println!("kind:     {}", if info.is_dir { "directory" } else { "file" });
    Ok(())
}
