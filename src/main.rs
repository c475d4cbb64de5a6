mod cli;

use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use trackforged::assembler::Progress;
use trackforged::config::{self, Config};
use trackforged::context::DownloadContext;
use trackforged::download::{download_batch, download_track};
use trackforged_media::{build_segment_plan, decode_manifest, inject_tags, read_custom_tags};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| cli.default_log_filter().to_string());

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Download {
            track_ids,
            quality,
            concurrency,
            output_dir,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            if let Some(quality) = quality {
                config.download.quality = quality.parse().map_err(anyhow::Error::msg)?;
            }
            if let Some(concurrency) = concurrency {
                config.download.concurrency = concurrency;
            }
            if let Some(dir) = output_dir {
                config.download.output_dir = dir;
            }

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(download(config, &track_ids))
        }
        Commands::Manifest { mime_type, payload } => print_manifest(&mime_type, &payload),
        Commands::Tag { file, tags } => tag_file(&file, &tags),
        Commands::Tags { file } => list_tags(&file),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("trackforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn report_progress(progress: Progress) {
    match progress {
        Progress::Fraction(f) => eprint!("\r{:>5.1}%", f * 100.0),
        Progress::Indeterminate { bytes_received } => {
            eprint!("\r{} KiB", bytes_received / 1024)
        }
    }
    let _ = std::io::stderr().flush();
}

async fn download(config: Config, track_ids: &[u64]) -> Result<()> {
    let ctx = DownloadContext::init(config).context("Failed to initialize downloader")?;

    let result = if let [track_id] = track_ids {
        download_track(&ctx, *track_id, &report_progress)
            .await
            .map(|outcome| {
                eprintln!();
                println!("{}", outcome.path.display());
            })
            .with_context(|| format!("Failed to download track {}", track_id))
    } else {
        let report = download_batch(
            &ctx,
            track_ids,
            &|position, total, track_id| {
                eprintln!("[{}/{}] track {}", position + 1, total, track_id);
            },
            &report_progress,
        )
        .await;
        eprintln!();

        for outcome in &report.completed {
            println!("{}", outcome.path.display());
        }
        for (track_id, e) in &report.failed {
            eprintln!("✗ {}: {}", track_id, e);
        }
        if report.completed.is_empty() && !report.failed.is_empty() {
            Err(anyhow::anyhow!("All {} tracks failed", report.failed.len()))
        } else {
            Ok(())
        }
    };

    ctx.dispose();
    result
}

fn print_manifest(mime_type: &str, payload: &str) -> Result<()> {
    let manifest = decode_manifest(payload, mime_type).context("Failed to decode manifest")?;
    let plan = build_segment_plan(&manifest);

    println!("Transport: {:?}", manifest.transport_kind());
    if let Some(ref codecs) = manifest.codecs {
        println!("Codecs: {}", codecs);
    }
    println!("Segments: {}", plan.len());
    for (i, url) in plan.urls.iter().enumerate() {
        println!("  [{}] {}", i, url);
    }

    Ok(())
}

fn tag_file(file: &Path, tags: &[(String, String)]) -> Result<()> {
    let original =
        std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;

    match inject_tags(&original, tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))) {
        Cow::Owned(patched) => {
            let tmp = temp_sibling(file);
            std::fs::write(&tmp, &patched)
                .with_context(|| format!("Failed to write {:?}", tmp))?;
            std::fs::rename(&tmp, file)
                .with_context(|| format!("Failed to replace {:?}", file))?;
            println!(
                "✓ Wrote {} tag(s) ({} bytes added)",
                tags.iter().filter(|(_, v)| !v.is_empty()).count(),
                patched.len() - original.len()
            );
        }
        Cow::Borrowed(_) => {
            println!("No moov/udta/meta/ilst chain or no non-empty values; file unchanged");
        }
    }

    Ok(())
}

fn temp_sibling(file: &Path) -> PathBuf {
    let mut name = file.file_name().unwrap_or_default().to_os_string();
    name.push(".tagging");
    file.with_file_name(name)
}

fn list_tags(file: &Path) -> Result<()> {
    let buf = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let tags = read_custom_tags(&buf);

    if tags.is_empty() {
        println!("No freeform tags");
    }
    for tag in tags {
        println!("{}={}", tag.name, tag.value);
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let ffmpeg_override = config::load_config_or_default(config_path)
        .ok()
        .and_then(|c| c.tools.ffmpeg_path);
    let tools = trackforged_av::check_tools(ffmpeg_override.as_deref());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable downloads.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  API: {}", config.api.base_url);
            println!("  Country: {}", config.api.country_code);
            println!("  Access token: {}", config.api.access_token.is_some());
            println!("  Quality: {}", config.download.quality);
            println!("  Concurrency: {}", config.download.concurrency);
            println!("  Output: {}", config.download.output_dir.display());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  API: {}", config.api.base_url);
            println!("  Quality: {}", config.download.quality);
        }
    }

    Ok(())
}
