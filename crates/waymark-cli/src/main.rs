mod cmd_evaluate;
mod cmd_history;
mod cmd_init;
mod cmd_prop;
mod cmd_qa;
mod cmd_record;
mod cmd_reset;
mod cmd_validate;
mod config;
mod git;
mod property_store;
mod workspace;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use waymark_store::WaymarkPaths;

#[derive(Parser)]
#[command(
    name = "waymark",
    version,
    about = "Milestone snapshots and power-law QA sampling for documents"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new .waymark/ workspace with a starter milestones.yaml
    Init,
    /// Load and validate .waymark/milestones.yaml
    Validate,
    /// Record a user-interaction event
    Record {
        /// Event name (e.g. open, edit, review)
        event: String,
    },
    /// Evaluate milestones for one document
    Evaluate {
        /// Document path, relative to the workspace root
        document: String,
        /// Refinement score (falls back to the property store)
        #[arg(long)]
        refinement: Option<f64>,
        #[arg(long)]
        health: Option<f64>,
        #[arg(long)]
        stub_count: Option<u32>,
        #[arg(long)]
        usefulness_margin: Option<f64>,
        #[arg(long)]
        potential_energy: Option<f64>,
        /// Document tags (repeatable; falls back to the `tags` property)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Property override for this pass, key=value (repeatable)
        #[arg(long = "prop")]
        props: Vec<String>,
        /// Do not touch git; snapshots are reported but not taken
        #[arg(long)]
        no_git: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the triggered-milestone history
    History {
        /// Filter by document path
        #[arg(long)]
        doc: Option<String>,
        /// Filter by milestone id
        #[arg(long)]
        milestone: Option<String>,
        /// Show only the most recent N entries
        #[arg(long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Document property store
    Prop {
        #[command(subcommand)]
        cmd: cmd_prop::PropCmd,
    },
    /// QA checkpoint snapshots
    Qa {
        #[command(subcommand)]
        cmd: cmd_qa::QaCmd,
    },
    /// Clear evaluator and sampler state (milestone config is kept)
    Reset,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WAYMARK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let repo_root = WaymarkPaths::find_root(&cwd).unwrap_or(cwd);

    match cli.cmd {
        Command::Init => cmd_init::execute(&repo_root),
        Command::Validate => cmd_validate::execute(&repo_root),
        Command::Record { event } => cmd_record::execute(&repo_root, &event),
        Command::Evaluate {
            document,
            refinement,
            health,
            stub_count,
            usefulness_margin,
            potential_energy,
            tags,
            props,
            no_git,
            json,
        } => cmd_evaluate::execute(&cmd_evaluate::EvaluateParams {
            repo_root: &repo_root,
            document: &document,
            refinement,
            health,
            stub_count,
            usefulness_margin,
            potential_energy,
            tags: &tags,
            props: &props,
            no_git,
            json,
        }),
        Command::History {
            doc,
            milestone,
            limit,
            json,
        } => cmd_history::execute(&cmd_history::HistoryParams {
            repo_root: &repo_root,
            doc: doc.as_deref(),
            milestone: milestone.as_deref(),
            limit,
            json,
        }),
        Command::Prop { cmd } => cmd_prop::run(cmd, &repo_root),
        Command::Qa { cmd } => cmd_qa::run(cmd, &repo_root),
        Command::Reset => cmd_reset::execute(&repo_root),
    }
}
