use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use reconcile::ResourceKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spingate")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative Spinnaker resources through Gate", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Client config file (default: ~/.config/spingate/config.toml)
    #[arg(long, global = true, env = "SPINGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Gate endpoint, overrides the config file
    #[arg(long, global = true, env = "GATE_ENDPOINT")]
    pub gate_endpoint: Option<String>,

    /// Task wait budget in seconds, overrides the config file
    #[arg(long, global = true)]
    pub retry_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or update every resource in a manifest
    Apply(ApplyArgs),

    /// Show what apply would do without changing anything
    Plan(PlanArgs),

    /// Delete every resource in a manifest
    Destroy(DestroyArgs),

    /// Print the remote document of one resource
    Get(GetArgs),

    /// Check a manifest locally, without contacting Gate
    Validate(ManifestArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Manifest commands
// ============================================================================

#[derive(Args)]
pub struct ManifestArgs {
    /// Manifest file (.toml or .json)
    pub manifest: PathBuf,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Manifest file (.toml or .json)
    pub manifest: PathBuf,

    /// Number of parallel lookups
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Manifest file (.toml or .json)
    pub manifest: PathBuf,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Number of parallel reconciliations
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Leave resources that already exist untouched
    #[arg(long)]
    pub create_only: bool,

    /// Stop waiting on other resources after the first failure
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Manifest file (.toml or .json)
    pub manifest: PathBuf,

    /// Number of parallel deletions
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// Get
// ============================================================================

#[derive(Args)]
pub struct GetArgs {
    /// Resource kind
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Resource name
    pub name: String,

    /// Owning application (pipelines only)
    #[arg(short, long, required_if_eq("kind", "pipeline"))]
    pub application: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Application,
    Pipeline,
    Project,
    CanaryConfig,
    PipelineTemplate,
}

impl From<KindArg> for ResourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Application => Self::Application,
            KindArg::Pipeline => Self::Pipeline,
            KindArg::Project => Self::Project,
            KindArg::CanaryConfig => Self::CanaryConfig,
            KindArg::PipelineTemplate => Self::PipelineTemplate,
        }
    }
}
