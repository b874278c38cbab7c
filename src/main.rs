use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ct_scan_store::container::hdf5::Hdf5Opener;
use ct_scan_store::{LoadOptions, ScanLoader, ScanStoreConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "scan-tool")]
#[command(about = "Inspect CT scan containers and maintain the compressed volume cache")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the scan containers
    #[arg(long)]
    scans_dir: Option<PathBuf>,

    /// Directory holding the compressed volumes
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Log filter, e.g. "info" or "ct_scan_store=debug"
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the geometry and metadata of a scan
    Info { uid: String },
    /// Read a scan volume from its container and write the compressed cache
    Cache { uid: String },
    /// Print worklist entries, skipping scans that fail to load
    List { uids: Vec<String> },
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ScanStoreConfig::from_toml_file(path)?,
        None => ScanStoreConfig::default(),
    };
    if let Some(dir) = args.scans_dir {
        config.scans_dir = dir;
    }
    if let Some(dir) = args.cache_dir {
        config.compressed_volumes_dir = Some(dir);
    }

    let loader = ScanLoader::new(Hdf5Opener, config);

    match args.command {
        Command::Info { uid } => {
            let scan = loader.load(&uid, LoadOptions::metadata_only())?;
            let (slices, rows, columns) = scan.size();
            println!("uid:        {}", scan.uid());
            println!("name:       {}", scan.name());
            println!(
                "accession:  {}",
                scan.metadata().accession_number.as_deref().unwrap_or("-")
            );
            println!("body part:  {}", scan.body_part());
            println!("plane:      {}", scan.plane());
            println!("size:       {slices} x {rows} x {columns}");
            if let (Some(first), Some(last)) =
                (scan.image_positions().first(), scan.image_positions().last())
            {
                println!("positions:  {first:?} .. {last:?}");
            }
            println!("metadata:   {}", serde_json::to_string(scan.metadata())?);
        }
        Command::Cache { uid } => {
            let options = LoadOptions {
                read_volume: true,
                prefer_compressed_cache: false,
            };
            let scan = loader.load(&uid, options)?;
            if scan.store_compressed_volume()? {
                info!(uid = %uid, path = %scan.cache_path().display(), "cached volume");
            }
        }
        Command::List { uids } => {
            for summary in loader.load_many(&uids) {
                println!("{}", serde_json::to_string(&summary)?);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
