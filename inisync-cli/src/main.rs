use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use inisync::MissingPolicy;
use inisync_cli::{
    Overrides, check::run_check_command, decode::run_decode_command, diff::run_diff_command,
    render::run_render_command, resolve_config, verify::run_verify_command,
};
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ./inisync.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the project and render one global.ini per override layer.
    Render {
        /// Output directory (overrides output.dir)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Local global.ini whose keys are kept (overrides merge.base)
        #[arg(long)]
        base: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Decode a global.ini into a JSON snapshot.
    Decode {
        /// The global.ini to decode
        #[arg(short, long)]
        input: PathBuf,
        /// The JSON snapshot to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List baseline snapshot entries whose text differs from the reference.
    Diff {
        /// Snapshot whose entries are reported
        #[arg(short, long)]
        baseline: PathBuf,
        /// Snapshot compared against
        #[arg(short, long)]
        reference: PathBuf,
        /// Where the difference list is written
        #[arg(short, long)]
        output: PathBuf,
        /// Also report baseline keys absent from the reference
        #[arg(long)]
        report_missing: bool,
    },

    /// Decode a global.ini and diff it against the project's merged content.
    Verify {
        /// The global.ini to verify
        #[arg(short, long)]
        input: PathBuf,
        /// Directory for global.json, final.json and difference.json
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Also report decoded keys absent from the project
        #[arg(long)]
        report_missing: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Check translations for broken markup, line breaks and item numbers.
    Check {
        /// Directory for the reports
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "inisync=debug,inisync_cli=debug"
    } else {
        "inisync=info,inisync_cli=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn missing_policy(report_missing: bool) -> MissingPolicy {
    if report_missing {
        MissingPolicy::Report
    } else {
        MissingPolicy::Ignore
    }
}

async fn run(args: Args) -> Result<()> {
    let config = || resolve_config(args.config.as_deref());

    match args.commands {
        Commands::Render {
            out_dir,
            base,
            overrides,
        } => {
            let config = overrides.apply(config()?)?;
            let out_dir = out_dir.unwrap_or_else(|| config.output.dir.clone());
            let base = base.or_else(|| config.merge.base.clone());
            run_render_command(&config, &out_dir, base.as_deref()).await
        }
        Commands::Decode { input, output } => run_decode_command(&input, &output),
        Commands::Diff {
            baseline,
            reference,
            output,
            report_missing,
        } => run_diff_command(&baseline, &reference, &output, missing_policy(report_missing)),
        Commands::Verify {
            input,
            out_dir,
            report_missing,
            overrides,
        } => {
            let config = overrides.apply(config()?)?;
            let out_dir = out_dir.unwrap_or_else(|| config.output.dir.clone());
            run_verify_command(&config, &input, &out_dir, missing_policy(report_missing)).await
        }
        Commands::Check { out_dir, overrides } => {
            let config = overrides.apply(config()?)?;
            let out_dir = out_dir.unwrap_or_else(|| config.output.dir.clone());
            run_check_command(&config, &out_dir).await
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
