//! systopo - inspect, check and convert hardware topology documents

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use systopo_core::Topology;
use systopo_xml::{XmlConfig, XmlExporter, XmlImporter};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "systopo")]
#[command(about = "Inspect and convert hardware topology documents")]
#[command(version)]
struct Args {
    /// Exchange format configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the component tree of a document
    Show {
        file: PathBuf,
        /// Levels below the root to print
        #[arg(long)]
        max_depth: Option<usize>,
        /// Also list every data path
        #[arg(long)]
        data_paths: bool,
    },
    /// Report structural inconsistencies; exits non-zero if any are found
    Check { file: PathBuf },
    /// Read a document and write it again using the configured format
    Convert { input: PathBuf, output: PathBuf },
    /// Write the exchange format configuration in effect (defaults unless --config)
    InitConfig { output: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => XmlConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => XmlConfig::default(),
    };

    match args.command {
        Command::Show {
            file,
            max_depth,
            data_paths,
        } => {
            let topology = load(&file, &config)?;
            let root = topology.root();
            let size = topology.topology_size(root)?;
            print!("{}", topology.render_subtree(root, max_depth)?);
            if data_paths {
                print!("{}", topology.render_data_paths(root)?);
            }
            println!(
                "{} components, {} data paths",
                size.components, size.data_paths
            );
        }
        Command::Check { file } => {
            let topology = load(&file, &config)?;
            let report = topology.check_consistency(topology.root())?;
            for violation in &report.violations {
                println!("{}", violation);
            }
            if !report.is_consistent() {
                bail!(
                    "{} inconsistencies in {} components",
                    report.violations.len(),
                    report.checked
                );
            }
            println!("{} components checked, no inconsistencies", report.checked);
        }
        Command::Convert { input, output } => {
            let topology = load(&input, &config)?;
            XmlExporter::new()
                .with_config(config)
                .export_to_file(&topology, topology.root(), &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        Command::InitConfig { output } => {
            config.to_file(&output)?;
            info!(path = %output.display(), "Wrote configuration");
        }
    }
    Ok(())
}

fn load(path: &Path, config: &XmlConfig) -> Result<Topology> {
    XmlImporter::new()
        .with_config(config.clone())
        .import_file(path)
        .with_context(|| format!("Failed to import {}", path.display()))
}
