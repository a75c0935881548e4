//! vold-inventory CLI - inspect the storage volumes of a host or device image.
//!
//! Every command performs one rescan against the configured host and prints
//! the result, as text by default or as JSON with `--json`. Logs go to
//! stderr; set `RUST_LOG=vold_inventory_core=debug` to follow the parser.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use snafu::{ResultExt, Snafu};
use vold_inventory_core::{
    AppIdentity, HostConfig, HostPlatform, Inventory, ListFilter, VolumeRecord, VolumeRegistry,
};

#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("{source}"))]
    Core { source: vold_inventory_core::Error },

    #[snafu(display("failed to encode output: {source}"))]
    Encode { source: serde_json::Error },
}

type Result<T> = std::result::Result<T, CliError>;

/// Storage volume inventory.
#[derive(Parser)]
#[command(name = "vold-inventory")]
#[command(about = "List storage volumes found via the vold mount table", long_about = None)]
struct Cli {
    /// JSON config file describing the host.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory whose etc/ holds the mount tables.
    #[arg(long, global = true)]
    system_root: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List volumes.
    List {
        /// Only secondary volumes whose name contains this text.
        #[arg(long)]
        filter: Option<String>,

        /// Skip volumes that are not currently usable.
        #[arg(long)]
        available: bool,

        /// Leave out the primary external store.
        #[arg(long)]
        no_primary: bool,

        /// Include internal storage.
        #[arg(long)]
        internal: bool,
    },

    /// Show the primary external store.
    Primary,

    /// Show the first secondary volume.
    Secondary,

    /// Show internal storage.
    Internal,

    /// Show per-app directories on every volume.
    Dirs {
        /// App package name; defaults to the configured one.
        #[arg(long)]
        package: Option<String>,

        /// Also resolve the public directory for this media category.
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Serialize)]
struct VolumeDirs<'a> {
    volume: &'a str,
    mount_path: &'a std::path::Path,
    files: PathBuf,
    cache: PathBuf,
    public: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vold_inventory=info,vold_inventory_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = HostConfig::load(cli.config.as_deref()).context(CoreSnafu)?;
    if let Some(root) = cli.system_root {
        config.system_root = root;
    }
    config.validate().context(CoreSnafu)?;
    tracing::debug!("host config: {:?}", config);

    let registry = VolumeRegistry::new(HostPlatform::new(config));
    let inventory = registry.rescan();

    match cli.command {
        Commands::List {
            filter,
            available,
            no_primary,
            internal,
        } => {
            let filter = ListFilter {
                name: filter,
                only_available: available,
                include_primary: !no_primary,
                include_internal: internal,
            };
            print_volumes(&inventory.list(&filter), cli.json)
        }
        Commands::Primary => print_volumes(&[inventory.primary()], cli.json),
        Commands::Internal => print_volumes(&[inventory.internal()], cli.json),
        Commands::Secondary => match inventory.secondary() {
            Some(secondary) => print_volumes(&[secondary], cli.json),
            None if cli.json => print_json(&Option::<&VolumeRecord>::None),
            None => {
                println!("no secondary volume");
                Ok(())
            }
        },
        Commands::Dirs { package, category } => {
            let package =
                package.unwrap_or_else(|| registry.platform().config().package_name.clone());
            let app = AppIdentity::new(package);
            let dirs = resolve_dirs(&registry, &inventory, &app, category.as_deref())?;
            if cli.json {
                return print_json(&dirs);
            }
            for entry in &dirs {
                println!("{} ({})", entry.volume, entry.mount_path.display());
                println!("  files:  {}", entry.files.display());
                println!("  cache:  {}", entry.cache.display());
                if let Some(public) = &entry.public {
                    println!("  public: {}", public.display());
                }
            }
            Ok(())
        }
    }
}

fn resolve_dirs<'a>(
    registry: &VolumeRegistry<HostPlatform>,
    inventory: &'a Inventory,
    app: &AppIdentity,
    category: Option<&str>,
) -> Result<Vec<VolumeDirs<'a>>> {
    let platform = registry.platform();
    inventory
        .list(&ListFilter::all())
        .into_iter()
        .map(|volume| -> Result<VolumeDirs<'a>> {
            Ok(VolumeDirs {
                volume: &volume.display_name,
                mount_path: &volume.mount_path,
                files: volume.files_dir(platform, app, None).context(CoreSnafu)?,
                cache: volume.cache_dir(platform, app).context(CoreSnafu)?,
                public: match category {
                    Some(category) => volume.public_dir(platform, category).context(CoreSnafu)?,
                    None => None,
                },
            })
        })
        .collect()
}

fn print_volumes(volumes: &[&VolumeRecord], json: bool) -> Result<()> {
    if json {
        return print_json(&volumes);
    }
    for volume in volumes {
        println!("{}", volume.summary());
        println!(
            "  path: {}  kind: {:?}  removable: {}  state: {:?}",
            volume.mount_path.display(),
            volume.kind,
            volume.removable,
            volume.state()
        );
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context(EncodeSnafu)?;
    println!("{}", json);
    Ok(())
}
