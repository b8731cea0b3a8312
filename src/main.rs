//! # choreboard
//!
//! A terminal chore board for families. Chores ("quests") are either one-off
//! or generated from recurring templates; the assignee starts and submits
//! them, a parent approves or rejects, and approvals pay out points.
//!
//! ## Usage
//!
//! ```bash
//! # A chore every Monday and Wednesday at 18:00, assigned to sam
//! choreboard template add trash "Take out the trash" --repeat weekly --days mon,wed --at 18:00 --assign sam --points 5
//!
//! # Today's board, most urgent first
//! choreboard today
//!
//! # Act on an occurrence that is not persisted yet
//! choreboard start trash@2025-01-08 --as sam
//! choreboard complete 1 --as sam
//! choreboard approve 1 --by alex
//! choreboard points sam
//! ```
//!
//! ## Data Storage
//!
//! Data lives in JSON files in your local data directory
//! (`~/.local/share/choreboard` on Linux). Override it with the
//! `CHOREBOARD_DB` environment variable or `data_dir` in
//! `~/.config/choreboard/config.toml`.
//!
//! Set `RUST_LOG=debug` to see what the engine does.

use std::io;
use std::process::ExitCode;

use choreboard::commands::*;
use choreboard::config::Config;
use choreboard::service::QuestRef;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

#[derive(Parser)]
#[command(name = "choreboard")]
#[command(about = "Family chore board with recurring quests and points", long_about = None)]
struct Cli {
    /// Family whose board to use (defaults to the configured family)
    #[arg(long, global = true)]
    family: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct RuleArgs {
    /// Recurrence (once, daily, weekly, monthly)
    #[arg(short, long, default_value = "once")]
    repeat: String,
    /// Weekdays for weekly quests, e.g. mon,wed
    #[arg(long)]
    days: Option<String>,
    /// First day, YYYY-MM-DD (default today)
    #[arg(long)]
    start: Option<String>,
    /// Last day, YYYY-MM-DD
    #[arg(long)]
    end: Option<String>,
    /// Due time of day, HH:MM
    #[arg(long)]
    at: Option<String>,
}

impl From<RuleArgs> for RuleOptions {
    fn from(a: RuleArgs) -> Self {
        RuleOptions {
            kind: a.repeat,
            days: a.days,
            start: a.start,
            end: a.end,
            at: a.at,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the board for today (or --date), most urgent first
    Today {
        /// Date in YYYY-MM-DD
        #[arg(short, long)]
        date: Option<String>,
    },
    /// List the next dates a template produces a quest
    Upcoming {
        template: String,
        /// First date to consider, YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,
        #[arg(short = 'n', long, default_value_t = 7)]
        limit: usize,
    },
    /// Add a one-off quest
    Add {
        /// Quest title (quoted if it has spaces)
        title: String,
        /// Category
        #[arg(short, long)]
        category: Option<String>,
        /// Points awarded on approval
        #[arg(short, long, default_value_t = 1)]
        points: u32,
        /// Assignee
        #[arg(short, long)]
        assign: Option<String>,
        /// Due as "YYYY-MM-DD HH:MM" or YYYY-MM-DD (end of day)
        #[arg(short, long)]
        due: Option<String>,
    },
    /// Manage recurring templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Start a quest (id or TEMPLATE@YYYY-MM-DD)
    Start {
        quest: QuestRef,
        /// Who is starting it
        #[arg(long = "as")]
        actor: String,
    },
    /// Submit a quest for review (id or TEMPLATE@YYYY-MM-DD)
    Complete {
        quest: QuestRef,
        #[arg(long = "as")]
        actor: String,
    },
    /// Approve a submitted quest and award points
    Approve {
        id: u64,
        #[arg(long = "by")]
        reviewer: String,
        /// Override the quest's point value
        #[arg(short, long)]
        points: Option<u32>,
    },
    /// Reject a submitted quest
    Reject {
        id: u64,
        #[arg(long = "by")]
        reviewer: String,
    },
    /// Show a user's point balance
    Points { user: String },
    /// Reset the database (delete all quests, templates and points)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Add a new template
    Add {
        /// Short unique id, used in TEMPLATE@DATE references
        id: String,
        /// Quest title
        title: String,
        #[command(flatten)]
        rule: RuleArgs,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        points: u32,
        /// Default assignee
        #[arg(short, long)]
        assign: Option<String>,
        /// Creator
        #[arg(long, default_value = "parent")]
        by: String,
    },
    /// Replace a template's recurrence
    Edit {
        id: String,
        #[command(flatten)]
        rule: RuleArgs,
    },
    /// List templates
    List,
    /// Skip a single date
    Exclude { id: String, date: String },
    /// Stop producing new quests (history is kept)
    Retire { id: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let shell_enum = match shell.as_str() {
            "bash" => Shell::Bash,
            "zsh" => Shell::Zsh,
            "fish" => Shell::Fish,
            "powershell" => Shell::PowerShell,
            "elvish" => Shell::Elvish,
            _ => {
                eprintln!("Unsupported shell: {}", shell);
                return ExitCode::FAILURE;
            }
        };
        let mut cmd = Cli::command();
        generate(shell_enum, &mut cmd, "choreboard", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: Config) -> Result<(), CommandError> {
    let family = cli.family.unwrap_or_else(|| config.family.clone());
    let (service, store) = open_service(&config)?;

    match cli.command.unwrap_or(Commands::Today { date: None }) {
        Commands::Today { date } => cmd_today(&service, &family, date),
        Commands::Upcoming { template, from, limit } => cmd_upcoming(&service, &template, from, limit),
        Commands::Add { title, category, points, assign, due } => {
            cmd_add(&service, &family, title, category, points, assign, due, false).map(|_| ())
        }
        Commands::Template { command } => match command {
            TemplateCommands::Add { id, title, rule, category, points, assign, by } => cmd_template_add(
                &service,
                &family,
                NewTemplateArgs {
                    id,
                    title,
                    category,
                    points,
                    created_by: by,
                    assign,
                    rule: rule.into(),
                },
                false,
            ),
            TemplateCommands::Edit { id, rule } => cmd_template_edit(&service, &id, rule.into(), false),
            TemplateCommands::List => cmd_template_list(&service, &family),
            TemplateCommands::Exclude { id, date } => cmd_template_exclude(&service, &id, &date, false),
            TemplateCommands::Retire { id } => cmd_template_retire(&service, &id, false),
        },
        Commands::Start { quest, actor } => cmd_start(&service, &quest, &actor, false),
        Commands::Complete { quest, actor } => cmd_complete(&service, &quest, &actor, false),
        Commands::Approve { id, reviewer, points } => cmd_approve(&service, id, &reviewer, points, false),
        Commands::Reject { id, reviewer } => cmd_reject(&service, id, &reviewer, false),
        Commands::Points { user } => cmd_points(&service, &user),
        Commands::Reset { force } => cmd_reset(&store, force),
        Commands::Completions { .. } => Ok(()),
    }
}
