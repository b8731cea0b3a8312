use std::collections::BTreeSet;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::config::Config;
use crate::error::{QuestError, StoreError};
use crate::ledger::PointsLedger;
use crate::lifecycle::PointsAward;
use crate::models::{Instance, QuestStatus, RecurrenceKind, RecurrenceRule};
use crate::service::{NewQuest, NewTemplate, QuestRef, QuestService};
use crate::storage::{JsonStore, QuestStore};
use crate::urgency::Urgency;

/// Errors reported by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    Input(String),

    #[error(transparent)]
    Quest(#[from] QuestError),
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        CommandError::Quest(e.into())
    }
}

/// Opens the JSON store in the configured data directory and wires the
/// service around it.
pub fn open_service(config: &Config) -> Result<(QuestService, Arc<JsonStore>), CommandError> {
    let store = Arc::new(JsonStore::open(&config.data_dir)?);
    let service = QuestService::new(
        store.clone() as Arc<dyn QuestStore>,
        store.clone() as Arc<dyn PointsLedger>,
        Arc::new(config.clock()),
        config,
    );
    Ok((service, store))
}

fn parse_date(s: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| CommandError::Input(format!("Invalid date '{s}': {e}. Use YYYY-MM-DD.")))
}

fn parse_time(s: &str) -> Result<NaiveTime, CommandError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| CommandError::Input(format!("Invalid time '{s}': {e}. Use HH:MM.")))
}

/// Parses a due instant in family time: `YYYY-MM-DD HH:MM`, or a bare date
/// meaning the end of that day.
fn parse_due(service: &QuestService, s: &str) -> Result<DateTime<Utc>, CommandError> {
    let clock = service.engine().clock();
    match s.split_once(' ') {
        Some((date, time)) => Ok(clock.instant_at(parse_date(date)?, parse_time(time.trim())?)),
        None => Ok(clock.end_of_day(parse_date(s)?)),
    }
}

/// Parses `mon,wed` or `1,3` into weekday indices (Sunday = 0).
pub fn parse_weekdays(s: &str) -> Result<BTreeSet<u8>, CommandError> {
    s.split(',')
        .map(|part| {
            let part = part.trim().to_lowercase();
            let idx = match part.as_str() {
                "sun" | "sunday" => 0,
                "mon" | "monday" => 1,
                "tue" | "tuesday" => 2,
                "wed" | "wednesday" => 3,
                "thu" | "thursday" => 4,
                "fri" | "friday" => 5,
                "sat" | "saturday" => 6,
                other => other
                    .parse::<u8>()
                    .ok()
                    .filter(|d| *d <= 6)
                    .ok_or_else(|| CommandError::Input(format!("Unknown weekday '{other}'.")))?,
            };
            Ok(idx)
        })
        .collect()
}

fn parse_kind(s: &str) -> Result<RecurrenceKind, CommandError> {
    match s.to_lowercase().as_str() {
        "once" | "none" => Ok(RecurrenceKind::None),
        "daily" => Ok(RecurrenceKind::Daily),
        "weekly" => Ok(RecurrenceKind::Weekly),
        "monthly" => Ok(RecurrenceKind::Monthly),
        other => Err(CommandError::Input(format!(
            "Unknown recurrence '{other}'. Supported: once, daily, weekly, monthly."
        ))),
    }
}

/// Recurrence options as typed on the command line.
#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    pub kind: String,
    pub days: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub at: Option<String>,
}

impl RuleOptions {
    /// Builds a rule; the start date defaults to `today`.
    pub fn to_rule(&self, today: NaiveDate) -> Result<RecurrenceRule, CommandError> {
        let start = match &self.start {
            Some(s) => parse_date(s)?,
            None => today,
        };
        let mut rule = match parse_kind(&self.kind)? {
            RecurrenceKind::None => RecurrenceRule::once(start),
            RecurrenceKind::Daily => RecurrenceRule::daily(start),
            RecurrenceKind::Monthly => RecurrenceRule::monthly(start),
            RecurrenceKind::Weekly => {
                let days = self.days.as_deref().ok_or_else(|| {
                    CommandError::Input("Weekly templates need --days, e.g. --days mon,wed.".into())
                })?;
                RecurrenceRule::weekly(start, parse_weekdays(days)?)
            }
        };
        if let Some(end) = &self.end {
            rule = rule.until(parse_date(end)?);
        }
        if let Some(at) = &self.at {
            rule = rule.due_at(parse_time(at)?);
        }
        Ok(rule)
    }
}

fn urgency_color(urgency: Urgency) -> Color {
    match urgency {
        Urgency::Critical => Color::Red,
        Urgency::High => Color::Yellow,
        Urgency::Medium => Color::Cyan,
        Urgency::Low => Color::Green,
    }
}

fn status_color(status: QuestStatus) -> Color {
    match status {
        QuestStatus::Pending => Color::Yellow,
        QuestStatus::InProgress => Color::Cyan,
        QuestStatus::Completed => Color::Magenta,
        QuestStatus::Approved => Color::Green,
        QuestStatus::Rejected => Color::Grey,
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

/// Prints the family's board for a date (default today), most urgent first.
pub fn cmd_today(service: &QuestService, family: &str, date: Option<String>) -> Result<(), CommandError> {
    let date = match date {
        Some(d) => parse_date(&d)?,
        None => service.today(),
    };
    let board = service.board(family, date)?;
    if board.is_empty() {
        println!("Nothing to do on {date}.");
        return Ok(());
    }

    let offset = service.engine().clock().offset();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["Ref", "Quest", "Assignee", "Due", "Urgency", "Status", "Points"]));

    for entry in board {
        let reference = match &entry.instance {
            Instance::Persisted(q) => q.id.to_string(),
            Instance::Virtual(v) => format!("{}@{}", v.template_id, v.occurrence_date),
        };
        let due = entry
            .instance
            .due_at()
            .map(|d| d.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        let status = entry.instance.status();
        table.add_row(vec![
            Cell::new(reference),
            Cell::new(entry.instance.title()),
            Cell::new(entry.instance.assigned_to().unwrap_or("-")),
            Cell::new(due),
            Cell::new(entry.urgency).fg(urgency_color(entry.urgency)),
            Cell::new(status).fg(status_color(status)),
            Cell::new(entry.instance.points()),
        ]);
    }

    println!("{table}");
    Ok(())
}

/// Prints the next occurrence dates of a template.
pub fn cmd_upcoming(service: &QuestService, template_id: &str, from: Option<String>, limit: usize) -> Result<(), CommandError> {
    let from = match from {
        Some(d) => parse_date(&d)?,
        None => service.today(),
    };
    let dates = service.upcoming(template_id, from, limit)?;
    if dates.is_empty() {
        println!("No upcoming occurrences for '{template_id}'.");
        return Ok(());
    }
    for d in dates {
        println!("{}  {}", d, d.format("%A"));
    }
    Ok(())
}

/// Adds a one-off quest. Returns its id.
pub fn cmd_add(
    service: &QuestService,
    family: &str,
    title: String,
    category: Option<String>,
    points: u32,
    assign: Option<String>,
    due: Option<String>,
    silent: bool,
) -> Result<u64, CommandError> {
    let due_at = due.as_deref().map(|d| parse_due(service, d)).transpose()?;
    let quest = service.create_quest(
        family,
        NewQuest {
            title,
            category,
            points,
            assigned_to: assign,
            due_at,
        },
    )?;
    if !silent {
        println!("Quest added (id = {})", quest.id);
    }
    Ok(quest.id)
}

/// Adds a recurring quest template.
pub fn cmd_template_add(
    service: &QuestService,
    family: &str,
    template: NewTemplateArgs,
    silent: bool,
) -> Result<(), CommandError> {
    let rule = template.rule.to_rule(service.today())?;
    let created = service.create_template(
        family,
        NewTemplate {
            id: template.id,
            title: template.title,
            category: template.category,
            points: template.points,
            created_by: template.created_by,
            default_assignee: template.assign,
            rule,
        },
    )?;
    if !silent {
        println!("Template '{}' added ({}).", created.id, created.rule.kind);
    }
    Ok(())
}

/// Everything `template add` accepts.
#[derive(Debug, Clone)]
pub struct NewTemplateArgs {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub points: u32,
    pub created_by: String,
    pub assign: Option<String>,
    pub rule: RuleOptions,
}

/// Replaces the recurrence of an existing template.
pub fn cmd_template_edit(service: &QuestService, template_id: &str, rule: RuleOptions, silent: bool) -> Result<(), CommandError> {
    let rule = rule.to_rule(service.today())?;
    service.update_recurrence(template_id, rule)?;
    if !silent {
        println!("Template '{template_id}' updated.");
    }
    Ok(())
}

/// Lists the family's templates.
pub fn cmd_template_list(service: &QuestService, family: &str) -> Result<(), CommandError> {
    let templates = service.templates(family)?;
    if templates.is_empty() {
        println!("No templates found.");
        return Ok(());
    }
    let today = service.today();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(header(&["Id", "Title", "Repeats", "From", "Until", "Assignee", "Points", "Active"]));
    for t in templates {
        let repeats = match t.rule.kind {
            RecurrenceKind::Weekly => {
                const NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
                let days: Vec<&str> = t.rule.weekdays.iter().map(|d| NAMES[usize::from(*d % 7)]).collect();
                format!("weekly ({})", days.join(","))
            }
            kind => kind.to_string(),
        };
        let active = t.rule.end_date.map_or(true, |end| end >= today);
        table.add_row(vec![
            Cell::new(&t.id),
            Cell::new(&t.title),
            Cell::new(repeats),
            Cell::new(t.rule.start_date),
            Cell::new(t.rule.end_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())),
            Cell::new(t.default_assignee.as_deref().unwrap_or("-")),
            Cell::new(t.points),
            Cell::new(if active { "yes" } else { "retired" }).fg(if active { Color::Green } else { Color::Grey }),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Skips one occurrence of a template.
pub fn cmd_template_exclude(service: &QuestService, template_id: &str, date: &str, silent: bool) -> Result<(), CommandError> {
    let date = parse_date(date)?;
    service.exclude_date(template_id, date)?;
    if !silent {
        println!("Template '{template_id}' will skip {date}.");
    }
    Ok(())
}

/// Retires a template; its past quests are kept.
pub fn cmd_template_retire(service: &QuestService, template_id: &str, silent: bool) -> Result<(), CommandError> {
    let t = service.retire_template(template_id)?;
    if !silent {
        let end = t.rule.end_date.map(|d| d.to_string()).unwrap_or_default();
        println!("Template '{template_id}' retired (last day {end}).");
    }
    Ok(())
}

pub fn cmd_start(service: &QuestService, quest: &QuestRef, actor: &str, silent: bool) -> Result<(), CommandError> {
    let q = service.start(quest, actor)?;
    if !silent {
        println!("Quest {} started by {actor}.", q.id);
    }
    Ok(())
}

pub fn cmd_complete(service: &QuestService, quest: &QuestRef, actor: &str, silent: bool) -> Result<(), CommandError> {
    let q = service.complete(quest, actor)?;
    if !silent {
        println!("Quest {} submitted for review.", q.id);
    }
    Ok(())
}

pub fn cmd_approve(service: &QuestService, id: u64, reviewer: &str, points: Option<u32>, silent: bool) -> Result<(), CommandError> {
    let outcome = service.approve(id, reviewer, points)?;
    if !silent {
        match outcome.paid {
            Some(PointsAward {
                recipient: Some(user),
                points,
            }) => println!("Quest {} approved; {user} earned {points} points.", outcome.instance.id),
            _ => println!("Quest {} approved.", outcome.instance.id),
        }
    }
    Ok(())
}

pub fn cmd_reject(service: &QuestService, id: u64, reviewer: &str, silent: bool) -> Result<(), CommandError> {
    let q = service.reject(id, reviewer)?;
    if !silent {
        println!("Quest {} rejected.", q.id);
    }
    Ok(())
}

/// Prints a user's point balance.
pub fn cmd_points(service: &QuestService, user: &str) -> Result<(), CommandError> {
    println!("{user}: {} points", service.balance(user)?);
    Ok(())
}

/// Deletes all templates, quests and points after confirmation.
pub fn cmd_reset(store: &JsonStore, force: bool) -> Result<(), CommandError> {
    if !force {
        print!("Are you sure you want to delete all quests, templates and points? This cannot be undone. [y/N] ");
        io::stdout()
            .flush()
            .map_err(StoreError::from)?;
        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(StoreError::from)?;
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
    }
    store.reset()?;
    println!("Database reset successfully.");
    Ok(())
}
