//! ec2ova CLI - Generate OVF descriptors for EC2 image export tasks.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ec2ova_core::ovf::ResourceType;
use ec2ova_core::{
    export_tasks, parse_ovf, DirectoryStore, ExportOptions, ExportPhase, ExportProgress,
    Inventory, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

/// Generate OVF descriptors for EC2 image export tasks.
#[derive(Parser)]
#[command(name = "ec2ova")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "info", "ec2ova_core=debug").
    #[arg(long, global = true, env = "EC2OVA_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and upload the OVF descriptor for one or more export tasks.
    Export {
        /// Export image task ids.
        #[arg(required = true)]
        task_ids: Vec<String>,

        /// JSON inventory of export tasks, images, instances, and instance types.
        #[arg(short, long, env = "EC2OVA_INVENTORY")]
        inventory: PathBuf,

        /// Directory holding uploaded objects as <bucket>/<key>.
        #[arg(short, long, env = "EC2OVA_STORE_DIR", default_value = ".")]
        store_dir: PathBuf,

        /// Number of threads to use (0 = auto-detect).
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Suppress progress output.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Parse and check an OVF descriptor.
    Inspect {
        /// Path to the OVF file.
        ovf_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Export {
            task_ids,
            inventory,
            store_dir,
            threads,
            quiet,
        } => {
            run_export(&task_ids, &inventory, &store_dir, threads, quiet)?;
        }
        Commands::Inspect { ovf_file } => {
            show_inspect(&ovf_file)?;
        }
    }

    Ok(())
}

/// Send log output to stderr so stdout only carries documents.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_export(
    task_ids: &[String],
    inventory_path: &Path,
    store_dir: &Path,
    threads: usize,
    quiet: bool,
) -> Result<()> {
    let inventory = Inventory::load(inventory_path)
        .with_context(|| format!("Unable to load inventory {}", inventory_path.display()))?;
    let store = DirectoryStore::new(store_dir);
    let options = ExportOptions::new(threads);

    // Set up progress tracking
    let progress_bar = if quiet {
        None
    } else {
        let pb = ProgressBar::new(task_ids.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {pos}/{len} tasks {msg}")?;
        pb.set_style(style);
        Some(pb)
    };

    let callback: Option<ProgressCallback> = progress_bar.clone().map(|pb| {
        Box::new(move |progress: ExportProgress| {
            if progress.phase == ExportPhase::Complete {
                pb.inc(1);
            }
            pb.set_message(format!("{} {}", progress.phase, progress.task_id));
        }) as ProgressCallback
    });

    let results = export_tasks(task_ids, &inventory, &store, &options, callback.as_ref())?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    let mut failures = 0;
    for (task_id, result) in &results {
        match result {
            Ok(report) => {
                print!("{}", report.document);
                println!("Done");
                if !quiet {
                    eprintln!(
                        "{}: wrote {}/{} ({} disk(s), {} network(s), sha256 {})",
                        task_id,
                        report.bucket,
                        report.key,
                        report.disk_count,
                        report.network_count,
                        report.sha256
                    );
                }
            }
            Err(err) => {
                failures += 1;
                eprintln!("Unable to export {}: {}", task_id, err);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} export task(s) failed", failures, results.len());
    }

    Ok(())
}

fn show_inspect(ovf_file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(ovf_file)
        .with_context(|| format!("Unable to read {}", ovf_file.display()))?;
    let envelope = parse_ovf(&content)
        .with_context(|| format!("Unable to parse {}", ovf_file.display()))?;

    let system = &envelope.virtual_system;
    let items = &system.hardware.items;

    println!("OVF Descriptor");
    println!("==============");
    println!();
    println!("Name:      {}", system.name);
    println!("System ID: {}", system.id);
    println!("Guest OS:  {}", system.operating_system.guest_os);
    if let Some(cpu) = envelope.items_of(ResourceType::Processor).next() {
        println!("CPUs:      {}", cpu.virtual_quantity.unwrap_or_default());
    }
    if let Some(memory) = envelope.items_of(ResourceType::Memory).next() {
        println!("Memory:    {} MB", memory.virtual_quantity.unwrap_or_default());
    }
    println!("Items:     {}", items.len());
    println!();

    if envelope.disks.is_empty() {
        println!("Disks:     None");
    } else {
        println!("Disks:");
        for (i, disk) in envelope.disks.iter().enumerate() {
            let href = envelope
                .file(&disk.file_ref)
                .map(|file| file.href.as_str())
                .unwrap_or("<missing file>");
            println!(
                "  {}. {} - {} ({})",
                i + 1,
                disk.disk_id,
                format_bytes(disk.capacity),
                href
            );
        }
    }

    if envelope.networks.is_empty() {
        println!("Networks:  None");
    } else {
        println!("Networks:");
        for network in &envelope.networks {
            println!("  - {}", network.name);
        }
    }
    println!();

    envelope
        .validate()
        .with_context(|| format!("{} is inconsistent", ovf_file.display()))?;
    println!("Cross-references: OK");

    Ok(())
}

/// Format bytes as human-readable string.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
