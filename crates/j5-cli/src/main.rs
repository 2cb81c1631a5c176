//! j5c: compile J5 schema packages to protobuf descriptors.
//!
//! - `build`: convert and link packages, write one `FileDescriptorSet`
//! - `lint`: report conversion errors, link errors and unused imports
//! - `order`: print the dependency-first build order

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use j5_protobuild::{
    DescriptorSetDependencies, DirectorySource, PackageSet, RepoConfig, CONFIG_FILE,
};
use prost::Message;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOG_ENV: &str = "J5_LOG";

#[derive(Parser)]
#[command(name = "j5c")]
#[command(author, version, about = "J5 schema to protobuf descriptor compiler")]
struct Cli {
    /// Repository root containing `j5.yaml`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build packages and write an encoded `FileDescriptorSet`.
    ///
    /// With no packages named, every package in `j5.yaml` is built.
    Build {
        packages: Vec<String>,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
        /// Leave out dependency and builtin files.
        #[arg(long)]
        no_imports: bool,
    },

    /// Lint packages. Exits non-zero when any error is found.
    Lint {
        packages: Vec<String>,
        /// Source lines shown around each diagnostic.
        #[arg(long, default_value_t = 2)]
        context: usize,
    },

    /// Print the order packages would be built in.
    Order { packages: Vec<String> },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workspace = Workspace::open(&cli.root)?;

    match cli.command {
        Commands::Build {
            packages,
            out,
            no_imports,
        } => cmd_build(workspace, packages, &out, no_imports),
        Commands::Lint { packages, context } => cmd_lint(workspace, packages, context),
        Commands::Order { packages } => cmd_order(workspace, packages),
    }
}

// ============================================================================
// Workspace
// ============================================================================

struct Workspace {
    config: RepoConfig,
    set: PackageSet,
}

impl Workspace {
    fn open(root: &Path) -> Result<Self> {
        let config = RepoConfig::load(root)
            .with_context(|| format!("loading {}", root.join(CONFIG_FILE).display()))?;
        debug!(root = %root.display(), packages = config.packages.len(), "loaded config");

        let mut set = PackageSet::new(Box::new(DirectorySource::from_config(root, &config)));
        for dep in &config.dependencies {
            let path = root.join(&dep.descriptor_set);
            let deps = DescriptorSetDependencies::load(&path)?;
            info!(path = %path.display(), files = deps.len(), "loaded descriptor set");
            set = set.with_dependencies(Box::new(deps));
        }
        Ok(Self { config, set })
    }

    /// The named packages, or every configured package when none are named.
    fn targets(&self, packages: Vec<String>) -> Result<Vec<String>> {
        let targets = if packages.is_empty() {
            self.config.package_names()
        } else {
            packages
        };
        if targets.is_empty() {
            return Err(anyhow!("no packages configured in {CONFIG_FILE}"));
        }
        Ok(targets)
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_build(mut ws: Workspace, packages: Vec<String>, out: &Path, no_imports: bool) -> Result<()> {
    let targets = ws.targets(packages)?;
    println!("{} {}", "Building".green().bold(), targets.join(", "));

    let built = ws.set.build_packages(&targets)?;
    for package in &built {
        println!(
            "  {} {} ({} files)",
            "→".yellow(),
            package.name.cyan(),
            package.proto.len()
        );
    }

    let descriptors = if no_imports {
        j5_protobuild::flatten_descriptor_set(&built)
    } else {
        ws.set.descriptor_set_with_imports(&built)
    };
    fs::write(out, descriptors.encode_to_vec())
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "{} {} ({} files)",
        "wrote".green().bold(),
        out.display().to_string().bold(),
        descriptors.file.len()
    );
    Ok(())
}

fn cmd_lint(mut ws: Workspace, packages: Vec<String>, context: usize) -> Result<()> {
    let targets = ws.targets(packages)?;
    let mut errors = 0;
    let mut warnings = 0;

    for name in &targets {
        let report = ws.set.lint_package(name)?;
        errors += report.error_count();
        warnings += report.warning_count();
        if report.is_clean() {
            println!("{} {}", "ok".green().bold(), name);
            continue;
        }
        println!("{} {}", "Linting".yellow().bold(), name);
        println!("{}", report.human_string(context));
    }

    if errors > 0 {
        return Err(anyhow!("lint failed: {errors} errors, {warnings} warnings"));
    }
    if warnings > 0 {
        println!("{} {} warnings", "info:".yellow().bold(), warnings);
    }
    Ok(())
}

fn cmd_order(mut ws: Workspace, packages: Vec<String>) -> Result<()> {
    let targets = ws.targets(packages)?;
    for (i, name) in ws.set.build_order(&targets)?.iter().enumerate() {
        println!("{:>3}. {}", i + 1, name);
    }
    Ok(())
}
