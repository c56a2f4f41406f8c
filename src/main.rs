//! shadowgen - adapter class generator for shadowed platform APIs
//!
//! # Usage
//!
//! ```bash
//! # Generate adapter classes into a directory
//! shadowgen generate sites.json --out-dir build/adapters
//!
//! # Or pack them into a single bundle, with a custom configuration
//! shadowgen generate sites.json --config shadowgen.toml --bundle build/app.adapters
//!
//! # Inspect a generated class or bundle
//! shadowgen dump build/app.adapters
//!
//! # Show which adapter each call site resolves to
//! shadowgen resolve sites.json --format json
//! ```

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use compiler::adapter::{generate_with_summary, AdapterResolver, DesugarAdapterResolver};
use compiler::classfile::ClassReader;
use compiler::config::ShadowgenConfig;
use compiler::deliver::{self, AdapterBundle};
use compiler::langmodel::InvocationSiteRecord;
use compiler::logging;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "shadowgen")]
#[command(version = "0.1.0")]
#[command(about = "Generate adapter classes bridging mirrored and built-in platform types", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate adapter classes for a call-site record
    #[command(group(ArgGroup::new("output").required(true).args(["out_dir", "bundle"])))]
    Generate {
        /// JSON call-site record
        record: PathBuf,

        /// Configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write one .class file per adapter class under this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Write all adapter classes into a single .adapters bundle
        #[arg(long)]
        bundle: Option<PathBuf>,
    },

    /// Print the contents of a .class file or .adapters bundle
    Dump {
        file: PathBuf,
    },

    /// Print the adapter call each record entry resolves to
    Resolve {
        record: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    match logging::level_for_verbosity(cli.verbose) {
        Some(level) => logging::init_with_level(level),
        None => logging::init_from_env(),
    }

    let result = match cli.command {
        Commands::Generate {
            record,
            config,
            out_dir,
            bundle,
        } => generate(&record, config.as_deref(), out_dir.as_deref(), bundle.as_deref()),
        Commands::Dump { file } => dump(&file),
        Commands::Resolve {
            record,
            config,
            format,
        } => resolve(&record, config.as_deref(), format),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<ShadowgenConfig, String> {
    match path {
        Some(path) => ShadowgenConfig::load(path).map_err(|e| e.to_string()),
        None => Ok(ShadowgenConfig::default()),
    }
}

fn load_record(path: &Path) -> Result<InvocationSiteRecord, String> {
    let record = InvocationSiteRecord::load(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    log::info!("Loaded {} call site(s) from {}", record.len(), path.display());
    Ok(record)
}

fn generate(
    record_path: &Path,
    config: Option<&Path>,
    out_dir: Option<&Path>,
    bundle: Option<&Path>,
) -> Result<(), String> {
    let config = load_config(config)?;
    let record = load_record(record_path)?;
    let resolver = DesugarAdapterResolver::from_config(&config);

    let (artifacts, summary) =
        generate_with_summary(&record, &resolver, &config.class_file_options()).map_err(|e| e.to_string())?;

    if let Some(dir) = out_dir {
        deliver::write_to_dir(&artifacts, dir).map_err(|e| e.to_string())?;
        println!("✓ {} -> {}", summary, dir.display());
    }
    if let Some(path) = bundle {
        deliver::write_bundle(&artifacts, path).map_err(|e| e.to_string())?;
        println!("✓ {} -> {}", summary, path.display());
    }
    Ok(())
}

fn dump(file: &Path) -> Result<(), String> {
    let is_bundle = file.extension().map_or(false, |ext| ext == "adapters");
    if is_bundle {
        let bundle = AdapterBundle::read(file).map_err(|e| e.to_string())?;
        println!("{} ({} class(es))", file.display(), bundle.len());
        for (path, bytes) in bundle.iter() {
            println!();
            println!("== {}", path.display());
            dump_class(bytes)?;
        }
        Ok(())
    } else {
        let bytes = std::fs::read(file).map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
        dump_class(&bytes)
    }
}

fn dump_class(bytes: &[u8]) -> Result<(), String> {
    let class = ClassReader::parse(bytes).map_err(|e| e.to_string())?;
    println!(
        "class {} (version {}.{}, access 0x{:04x})",
        class.name, class.major_version, class.minor_version, class.access
    );
    if let Some(super_name) = &class.super_name {
        println!("  extends {}", super_name);
    }
    for method in &class.methods {
        println!("  method {}{} (access 0x{:04x})", method.name, method.descriptor, method.access);
        if let Some(code) = &method.code {
            println!("    max_stack={} max_locals={}", code.max_stack, code.max_locals);
            for instruction in &code.instructions {
                println!("    {}", instruction);
            }
        }
    }
    Ok(())
}

fn resolve(record_path: &Path, config: Option<&Path>, format: OutputFormat) -> Result<(), String> {
    let config = load_config(config)?;
    let record = load_record(record_path)?;
    let resolver = DesugarAdapterResolver::from_config(&config);

    let mut rows = Vec::with_capacity(record.len());
    for site in &record {
        let adapter = resolver.adapter_site(site).map_err(|e| e.to_string())?;
        rows.push((site, adapter));
    }

    match format {
        OutputFormat::Text => {
            for (site, adapter) in &rows {
                println!("{}", site);
                println!("  -> {}", adapter);
            }
        }
        OutputFormat::Json => {
            let entries: Vec<_> = rows
                .iter()
                .map(|(site, adapter)| {
                    serde_json::json!({
                        "original": site.to_string(),
                        "adapter_owner": adapter.owner().binary_name(),
                        "adapter_name": adapter.name(),
                        "adapter_descriptor": adapter.descriptor().to_string(),
                    })
                })
                .collect();
            let text = serde_json::to_string_pretty(&entries).map_err(|e| e.to_string())?;
            println!("{}", text);
        }
    }
    Ok(())
}
