//! k2geoip-gen: CLI tool for building MaxMind DB files from IP range CSV tables.

use clap::{Parser, Subcommand};
use k2geoip::mmdb::MmdbWriter;
use k2geoip::{GeneratorConfig, Pipeline, TableReader};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "k2geoip-gen")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Build MaxMind DB files from IP range CSV tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV range table to an MMDB file
    Convert {
        /// Input CSV file (.csv or .csv.gz)
        #[arg(long, default_value = "country.csv")]
        csv_in: PathBuf,

        /// Output MMDB file
        #[arg(long, default_value = "country.mmdb")]
        mmdb_out: PathBuf,

        /// Generator config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Tree record size in bits (24, 28 or 32)
        #[arg(long)]
        record_size: Option<u16>,

        /// Skip invalid rows instead of aborting
        #[arg(long)]
        skip_invalid: bool,

        /// Also write <mmdb-out>.sha256
        #[arg(long)]
        checksum: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the CIDR blocks covering an address range
    Decompose {
        /// First address of the range
        start: String,

        /// Last address of the range (inclusive)
        end: String,
    },

    /// Look up addresses in a generated MMDB file
    Lookup {
        /// MMDB file to query
        #[arg(short, long)]
        mmdb: PathBuf,

        /// Addresses to look up
        #[arg(required = true)]
        ips: Vec<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            csv_in,
            mmdb_out,
            config,
            record_size,
            skip_invalid,
            checksum,
            verbose,
        } => {
            let options = ConvertOptions {
                config,
                record_size,
                skip_invalid,
                checksum,
                verbose,
            };
            convert_file(&csv_in, &mmdb_out, &options)
        }
        Commands::Decompose { start, end } => decompose_range(&start, &end),
        Commands::Lookup { mmdb, ips } => lookup_ips(&mmdb, &ips),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

struct ConvertOptions {
    config: Option<PathBuf>,
    record_size: Option<u16>,
    skip_invalid: bool,
    checksum: bool,
    verbose: bool,
}

fn convert_file(input: &Path, output: &Path, opts: &ConvertOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &opts.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };
    if let Some(bits) = opts.record_size {
        config.record_size = bits;
    }
    if opts.skip_invalid {
        config.skip_invalid_rows = true;
    }

    let options = config.mmdb_options()?;
    if opts.verbose {
        println!("Reading input file: {:?}", input);
        println!(
            "Database type: {:?}, record size: {}, IP version: {}",
            options.database_type,
            options.record_size.bits(),
            options.ip_version.as_u16()
        );
    }

    let table = TableReader::open(input)?;
    let mut writer = MmdbWriter::new(options);
    let stats = Pipeline::new(config.error_policy()).run(table.rows(), &mut writer)?;

    if opts.verbose {
        println!(
            "Processed rows: {} ({} skipped), blocks: {} IPv4, {} IPv6, distinct records: {}",
            stats.rows,
            stats.skipped_rows,
            stats.v4_blocks,
            stats.v6_blocks,
            writer.record_count()
        );
    }

    let data = writer.write()?;
    write_atomic(output, &data)?;

    if opts.checksum {
        let (sidecar, digest) = write_checksum(output, &data)?;
        if opts.verbose {
            println!("Checksum: {} -> {:?}", digest, sidecar);
        }
    }

    log::info!(
        "Wrote {:?}: {} blocks from {} rows ({} bytes)",
        output,
        stats.blocks,
        stats.rows,
        data.len()
    );
    println!("Successfully converted {:?} -> {:?}", input, output);
    Ok(())
}

/// Write through a temp file in the target directory, then rename.
fn write_atomic(output: &Path, data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(output)?;
    Ok(())
}

fn checksum_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Write `<output>.sha256` in `sha256sum` format; returns its path and the digest.
fn write_checksum(output: &Path, data: &[u8]) -> Result<(PathBuf, String), Box<dyn std::error::Error>> {
    let digest = format!("{:x}", Sha256::digest(data));
    let file_name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sidecar = checksum_path(output);
    fs::write(&sidecar, format!("{}  {}\n", digest, file_name))?;
    Ok((sidecar, digest))
}

fn decompose_range(start: &str, end: &str) -> Result<(), Box<dyn std::error::Error>> {
    let range = k2geoip::validate(start, end)?;
    for block in range.blocks() {
        println!("{}", block);
    }
    Ok(())
}

fn lookup_ips(mmdb: &Path, ips: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let reader = maxminddb::Reader::open_readfile(mmdb).map_err(k2geoip::Error::from)?;
    log::debug!(
        "Opened {:?}: {} ({} nodes, {}-bit records)",
        mmdb,
        reader.metadata.database_type,
        reader.metadata.node_count,
        reader.metadata.record_size
    );

    for ip in ips {
        let addr: IpAddr = ip.trim().parse().map_err(|_| format!("invalid IP address: {}", ip))?;
        match reader.lookup_prefix::<serde_json::Value>(addr) {
            Ok((record, prefix_len)) => {
                println!("{}/{}\t{}", addr, prefix_len, serde_json::to_string(&record)?);
            }
            Err(maxminddb::MaxMindDBError::AddressNotFoundError(_)) => {
                println!("{}\tnot found", addr);
            }
            Err(e) => return Err(k2geoip::Error::from(e).into()),
        }
    }
    Ok(())
}
