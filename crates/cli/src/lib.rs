use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use router_protocol::{FeedbackOutcome, Urgency};
use std::path::PathBuf;

mod command;

#[derive(Parser)]
#[command(name = "router")]
#[command(about = "Route free-text developer requests to actions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Machine-readable mode for scripts; implies --quiet
    #[arg(long, global = true)]
    json: bool,

    /// Router config (TOML). Falls back to ROUTER_CONFIG, then defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Feedback store file
    #[arg(long, global = true, default_value = ".router/feedback.json")]
    store: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a request and print the decision (or clarification) as JSON
    Route(RouteArgs),

    /// Answer a clarification saved with `route --save-state`
    Resume(ResumeArgs),

    /// Record explicit feedback for a routed decision
    Feedback(FeedbackArgs),

    /// Print the learned weight adjustments
    Weights,

    /// Validate a rule table and list its rules
    Rules(RulesArgs),
}

#[derive(Args)]
struct RouteArgs {
    /// Free-text request
    text: String,

    /// Explicit urgency; wins over phrasing
    #[arg(long, value_parser = parse_urgency)]
    urgency: Option<Urgency>,

    /// Fixed context snapshot (JSON) instead of probing the workspace
    #[arg(long, conflicts_with = "root")]
    context: Option<PathBuf>,

    /// Workspace to probe for git state, diagnostics and file types
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Write the suspended session here when a clarification is needed
    #[arg(long)]
    save_state: Option<PathBuf>,
}

#[derive(Args)]
struct ResumeArgs {
    /// Suspended session written by `route --save-state`
    #[arg(long)]
    state: PathBuf,

    /// Answer to the clarification prompt
    answer: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutcomeArg {
    Accepted,
    Corrected,
    Failed,
}

impl From<OutcomeArg> for FeedbackOutcome {
    fn from(value: OutcomeArg) -> Self {
        match value {
            OutcomeArg::Accepted => FeedbackOutcome::Accepted,
            OutcomeArg::Corrected => FeedbackOutcome::Corrected,
            OutcomeArg::Failed => FeedbackOutcome::Failed,
        }
    }
}

#[derive(Args)]
struct FeedbackArgs {
    /// Decision id (the `session_id` of a routed response)
    #[arg(long)]
    decision: String,

    #[arg(long, value_enum)]
    outcome: OutcomeArg,

    /// The action that should have been chosen
    #[arg(long, required_if_eq("outcome", "corrected"))]
    corrected_action: Option<String>,
}

#[derive(Args)]
struct RulesArgs {
    /// Rule table to validate (default: configured or built-in table)
    #[arg(long)]
    file: Option<PathBuf>,
}

fn parse_urgency(raw: &str) -> std::result::Result<Urgency, String> {
    Urgency::parse(raw).ok_or_else(|| format!("unknown urgency '{raw}' (critical|high|normal|low)"))
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || cli.json {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let env = command::Environment {
        config: cli.config,
        store: cli.store,
    };

    match cli.command {
        Commands::Route(args) => {
            command::route(
                &env,
                command::RouteOptions {
                    text: args.text,
                    urgency: args.urgency,
                    context: args.context,
                    root: args.root,
                    save_state: args.save_state,
                },
            )
            .await?
        }
        Commands::Resume(args) => command::resume(&env, &args.state, &args.answer).await?,
        Commands::Feedback(args) => command::feedback(
            &env,
            args.decision,
            args.outcome.into(),
            args.corrected_action,
        )?,
        Commands::Weights => command::weights(&env)?,
        Commands::Rules(args) => command::rules(&env, args.file.as_deref())?,
    }

    Ok(())
}
