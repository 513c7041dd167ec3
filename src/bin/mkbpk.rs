use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use clap_num::maybe_hex;
use colored::Colorize;

use bpk::error::Error;
use bpk::types::{
    BPK_TYPE_DEZC, BPK_TYPE_FWV, BPK_TYPE_INVALID, BPK_TYPE_KER, BPK_TYPE_PBL, BPK_TYPE_PBLV,
    BPK_TYPE_RFS,
};
use bpk::{zio, Bpk};

/// Partition type names accepted in partition specs, in listing order.
const TYPE_NAMES: &[(&str, u32)] = &[
    ("version", BPK_TYPE_FWV),
    ("pboot", BPK_TYPE_PBL),
    ("pboot_version", BPK_TYPE_PBLV),
    ("pker", BPK_TYPE_KER),
    ("prootfs", BPK_TYPE_RFS),
    ("desc", BPK_TYPE_DEZC),
];

fn type_by_name(name: &str) -> Option<u32> {
    TYPE_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, t)| *t)
}

fn type_name(part_type: u32) -> &'static str {
    TYPE_NAMES
        .iter()
        .find(|(_, t)| *t == part_type)
        .map(|(n, _)| *n)
        .unwrap_or("unknown")
}

/// One `type[:hw_id][:z]:path` partition argument.
///
/// `type` is a known name or a decimal/hex tag value, `hw_id` defaults to
/// 0, and `z` requests gzip streaming of the payload.
#[derive(Debug, Clone)]
struct PartSpec {
    part_type: u32,
    hw_id: u32,
    gz: bool,
    path: PathBuf,
}

impl FromStr for PartSpec {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut fields: Vec<&str> = value.split(':').collect();
        if fields.len() < 2 {
            return Err(format!("expected type[:hw_id][:z]:path, got '{}'", value));
        }

        let type_str = fields.remove(0);
        let part_type = match type_by_name(type_str) {
            Some(part_type) => part_type,
            None => maybe_hex::<u32>(type_str)
                .map_err(|_| format!("unknown partition type: '{}'", type_str))?,
        };
        if part_type == BPK_TYPE_INVALID {
            return Err(format!("reserved partition type: '{}'", type_str));
        }

        let mut hw_id = 0;
        if fields.len() > 1 {
            if let Ok(id) = maybe_hex::<u32>(fields[0]) {
                hw_id = id;
                fields.remove(0);
            }
        }

        let mut gz = false;
        if fields.len() > 1 && fields[0] == "z" {
            gz = true;
            fields.remove(0);
        }

        // the path may itself contain ':'
        Ok(PartSpec {
            part_type,
            hw_id,
            gz,
            path: PathBuf::from(fields.join(":")),
        })
    }
}

/// Create, inspect and extract BPK firmware packages
#[derive(Parser)]
#[command(version = "0.1.0")]
#[command(name = "mkbpk")]
#[command(about, long_about)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Verbosity level for logging/debugging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a package, or append partitions to an existing one
    Create(FilePartsOptions),
    /// Extract partitions into files
    Extract(FilePartsOptions),
    /// List the partitions of a package
    List(FileOptions),
    /// List supported partition type names
    ListTypes,
    /// Verify a package checksum
    Check(FileOptions),
}

#[derive(Parser)]
struct FileOptions {
    /// Package file to work on.
    #[arg(short, long, value_name = "FILE", required = true)]
    file: PathBuf,
}

#[derive(Parser)]
struct FilePartsOptions {
    /// Package file to work on.
    #[arg(short, long, value_name = "FILE", required = true)]
    file: PathBuf,

    /// Partition to create or extract, as type[:hw_id][:z]:path.
    #[arg(short, long = "part", value_name = "SPEC", required = true)]
    parts: Vec<PartSpec>,
}

/// Macro for printing debug messages depending on the verbosity level.
macro_rules! debug {
    ($cli:expr, $argmsg:literal, $($arg:tt)*) => {
        if $cli.verbose > 0 {
            println!("{}{}", "D : ".bold().bright_black(), format!($argmsg, $($arg)*).bright_black());
        }
    }
}

/// Macro for printing error messages with formatting.
macro_rules! error {
    ($msg:literal, $($arg:tt)*) => {
        println!("{}{}", "E : ".bold().red(), format!($msg, $($arg)*).red());
    };
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Create(options) => create(&cli, options),
        Commands::Extract(options) => extract(&cli, options),
        Commands::List(options) => list(&cli, options),
        Commands::ListTypes => {
            list_types();
            Ok(())
        }
        Commands::Check(options) => check(&cli, options),
    }
}

fn create(cli: &Cli, options: &FilePartsOptions) -> Result<(), Error> {
    let mut pkg = Bpk::open(&options.file, true)?;

    // a failing spec is reported but does not stop the remaining ones
    let mut failed = false;
    for spec in &options.parts {
        debug!(
            cli,
            "Writing partition {} (hw_id: {}) from {}",
            type_name(spec.part_type),
            spec.hw_id,
            spec.path.display()
        );
        let result = if spec.gz {
            zio::write_gz_file(&mut pkg, spec.part_type, spec.hw_id, &spec.path)
        } else {
            pkg.write_file(spec.part_type, spec.hw_id, &spec.path)
        };
        if let Err(err) = result {
            error!(
                "Failed to write partition {}:{}: {}",
                type_name(spec.part_type),
                spec.path.display(),
                err
            );
            failed = true;
        }
    }
    pkg.close()?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn extract(cli: &Cli, options: &FilePartsOptions) -> Result<(), Error> {
    let mut pkg = Bpk::open(&options.file, false)?;

    let mut failed = false;
    for spec in &options.parts {
        if pkg.find(spec.part_type, spec.hw_id).is_err() {
            error!(
                "Failed to find partition {} (hw_id: {})",
                type_name(spec.part_type),
                spec.hw_id
            );
            failed = true;
            continue;
        }
        debug!(
            cli,
            "Extracting partition {} (hw_id: {}) into {}",
            type_name(spec.part_type),
            spec.hw_id,
            spec.path.display()
        );
        let result = if spec.gz {
            zio::read_gz_file(&mut pkg, &spec.path)
        } else {
            pkg.read_to_file(&spec.path)
        };
        if let Err(err) = result {
            error!(
                "Failed to read partition {}:{}: {}",
                type_name(spec.part_type),
                spec.path.display(),
                err
            );
            failed = true;
        }
    }
    pkg.close()?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn list(cli: &Cli, options: &FileOptions) -> Result<(), Error> {
    let mut pkg = Bpk::open(&options.file, false)?;
    debug!(cli, "Listing partitions of {}", options.file.display());

    println!("{}", "Bpk partitions:".bold());
    while let Some(part) = pkg.next() {
        println!(
            "  {} (type: 0x{:08x}, hw_id: {}, size: {}, crc: 0x{:08x})",
            type_name(part.part_type).bold(),
            part.part_type,
            part.hw_id,
            part.size,
            part.crc
        );
    }
    pkg.close()
}

fn list_types() {
    println!("{}", "Supported partition types:".bold());
    for (name, part_type) in TYPE_NAMES {
        println!("  {} (0x{:08x})", name, part_type);
    }
}

fn check(cli: &Cli, options: &FileOptions) -> Result<(), Error> {
    let mut pkg = Bpk::open(&options.file, false)?;
    debug!(cli, "Checking {}", options.file.display());

    let ok = pkg.check_crc()?;
    pkg.close()?;

    if ok {
        println!("{}", "OK".green());
        Ok(())
    } else {
        println!("{}", "KO".red());
        std::process::exit(1);
    }
}
