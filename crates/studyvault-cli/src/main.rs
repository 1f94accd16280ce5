//! studyvault CLI - spaced repetition and study tracking

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use studyvault_core::models::{
    INTERVAL_SLOTS, NewRepetition, ReminderIntervals, RepetitionItem, RepetitionPatch,
    ScheduleState, UsageRecord,
};
use studyvault_core::{
    Config, Database, LearningGraphStore, PathRebaser, QuestionnaireStore, RepetitionScheduler,
    paths,
};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "studyvault",
    author,
    version,
    about = "Spaced repetition reminders and study tracking",
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage repetition reminders
    Remind {
        #[command(subcommand)]
        command: RemindCommand,
    },

    /// Inspect and maintain file usage statistics
    Usage {
        #[command(subcommand)]
        command: UsageCommand,
    },

    /// Daily reminder notification settings
    Notify {
        #[command(subcommand)]
        command: NotifyCommand,
    },

    /// Daily study questionnaire
    Journal {
        #[command(subcommand)]
        command: JournalCommand,
    },

    /// Learning graph of topics
    Graph {
        #[command(subcommand)]
        command: GraphCommand,
    },

    /// Show database statistics
    Stats,

    /// Delete all user data and restore default settings
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
enum RemindCommand {
    /// Create a reminder
    Add {
        /// Item name
        name: String,

        /// Free-form content
        #[arg(long, default_value = "")]
        content: String,

        /// Interval in days (repeat up to four times)
        #[arg(short, long = "interval")]
        intervals: Vec<i64>,
    },

    /// List all reminders
    List,

    /// List reminders that are due now
    Due,

    /// Show one reminder
    Show {
        /// Reminder ID
        id: String,
    },

    /// Mark a reminder as reviewed
    Done {
        /// Reminder ID
        id: String,
    },

    /// Stop a reminder from showing up as due
    Mute {
        /// Reminder ID
        id: String,
    },

    /// Let a muted reminder show up again
    Unmute {
        /// Reminder ID
        id: String,
    },

    /// Edit a reminder's name, content or intervals
    Edit {
        /// Reminder ID
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        content: Option<String>,

        /// Replace all intervals (repeat up to four times)
        #[arg(short, long = "interval")]
        intervals: Vec<i64>,
    },

    /// Delete a reminder
    Rm {
        /// Reminder ID
        id: String,
    },
}

#[derive(Debug, Subcommand)]
enum UsageCommand {
    /// Record that a file was opened
    Touch {
        /// Workspace root
        base: String,

        /// Path relative to the workspace root
        path: String,
    },

    /// Most recently used files
    Recent {
        /// Workspace root
        base: String,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// Most frequently used files
    Frequent {
        /// Workspace root
        base: String,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// Follow a file that was renamed on disk
    Rename {
        /// Workspace root
        base: String,

        /// Old path relative to the workspace root
        from: String,

        /// New path relative to the workspace root
        to: String,
    },

    /// Follow a folder that was moved on disk
    Move {
        /// Workspace root the folder was in
        base: String,

        /// Old folder path relative to `base`
        from: String,

        /// New folder path relative to the target workspace
        to: String,

        /// Target workspace root, if different
        #[arg(long)]
        to_base: Option<String>,
    },

    /// Forget a deleted file or folder
    Rm {
        /// Workspace root
        base: String,

        /// Path relative to the workspace root
        path: String,

        /// Remove everything below the path
        #[arg(long)]
        folder: bool,
    },
}

#[derive(Debug, Subcommand)]
enum NotifyCommand {
    /// Show notification settings
    Status,

    /// Enable the daily reminder
    Enable,

    /// Disable the daily reminder
    Disable,
}

#[derive(Debug, Subcommand)]
enum JournalCommand {
    /// Answer a question for a day
    Answer {
        question: String,

        answer: String,

        /// Day in YYYY-MM-DD form (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show answers for a day
    Show {
        /// Day in YYYY-MM-DD form (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List days with answers
    Days,
}

#[derive(Debug, Subcommand)]
enum GraphCommand {
    /// Add a topic
    Add { label: String },

    /// Relate two topics
    Link {
        /// Source topic ID
        source: String,

        /// Target topic ID
        target: String,

        #[arg(long, default_value = "related")]
        relation: String,
    },

    /// Remove a topic and its relations
    Rm { id: String },

    /// Show all topics and relations
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)?;

    // Open database
    let db = Database::open(&config.database).await?;

    let result = match cli.command {
        Command::Remind { command } => cmd_remind(&db, command, cli.json).await,
        Command::Usage { command } => cmd_usage(&db, &config, command, cli.json).await,
        Command::Notify { command } => cmd_notify(&db, command).await,
        Command::Journal { command } => cmd_journal(&db, command, cli.json).await,
        Command::Graph { command } => cmd_graph(&db, command, cli.json).await,
        Command::Stats => cmd_stats(&db).await,
        Command::Reset { yes } => cmd_reset(&db, yes).await,
    };

    db.close().await;
    result
}

async fn cmd_remind(db: &Database, command: RemindCommand, json: bool) -> Result<()> {
    let scheduler = RepetitionScheduler::new(db.clone());

    match command {
        RemindCommand::Add {
            name,
            content,
            intervals,
        } => {
            let reminder_intervals = intervals_from(&intervals)?;
            if !reminder_intervals.has_any() {
                anyhow::bail!("At least one positive interval is required");
            }
            let item = scheduler
                .create(NewRepetition {
                    name,
                    content,
                    reminder_intervals,
                })
                .await?;
            print_item(&item, json)?;
        }
        RemindCommand::List => {
            let items = scheduler.list_all().await?;
            print_items(&items, json, "No reminders.")?;
        }
        RemindCommand::Due => {
            let items = scheduler.list_due(Utc::now()).await?;
            print_items(&items, json, "Nothing due.")?;
        }
        RemindCommand::Show { id } => {
            let item = scheduler
                .get_by_id(parse_id(&id)?)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Reminder not found"))?;
            print_item(&item, json)?;
        }
        RemindCommand::Done { id } => {
            let item = scheduler.complete(parse_id(&id)?).await?;
            print_item(&item, json)?;
        }
        RemindCommand::Mute { id } => {
            let item = scheduler.set_muted(parse_id(&id)?, true).await?;
            print_item(&item, json)?;
        }
        RemindCommand::Unmute { id } => {
            let item = scheduler.set_muted(parse_id(&id)?, false).await?;
            print_item(&item, json)?;
        }
        RemindCommand::Edit {
            id,
            name,
            content,
            intervals,
        } => {
            let patch = edit_patch(name, content, &intervals)?;
            let item = scheduler.update(parse_id(&id)?, patch).await?;
            print_item(&item, json)?;
        }
        RemindCommand::Rm { id } => {
            let deleted = scheduler.delete(parse_id(&id)?).await?;
            if deleted == 0 {
                anyhow::bail!("Reminder not found");
            }
            println!("Deleted reminder: {id}");
        }
    }

    Ok(())
}

async fn cmd_usage(
    db: &Database,
    config: &Config,
    command: UsageCommand,
    json: bool,
) -> Result<()> {
    let rebaser = PathRebaser::new(db.clone()).with_debounce(config.usage.debounce());
    let default_limit = config.usage.list_limit;

    match command {
        UsageCommand::Touch { base, path } => {
            let file_name = paths::basename(&path);
            rebaser.try_record_access(&base, &path, &file_name).await?;
        }
        UsageCommand::Recent { base, limit } => {
            let records = rebaser
                .query_recent(&base, limit.unwrap_or(default_limit))
                .await?;
            print_usage(&records, json)?;
        }
        UsageCommand::Frequent { base, limit } => {
            let records = rebaser
                .query_frequent(&base, limit.unwrap_or(default_limit))
                .await?;
            print_usage(&records, json)?;
        }
        UsageCommand::Rename { base, from, to } => {
            let old_absolute = paths::resolve(&base, &from);
            let new_absolute = paths::resolve(&base, &to);
            let changed = rebaser
                .rename_single_file(
                    &old_absolute,
                    &new_absolute,
                    &base,
                    &paths::normalize(&to),
                    &paths::basename(&to),
                )
                .await?;
            println!("Updated {changed} record(s)");
        }
        UsageCommand::Move {
            base,
            from,
            to,
            to_base,
        } => {
            let new_base = to_base.unwrap_or_else(|| base.clone());
            let moved = rebaser.rebase_subtree(&base, &from, &new_base, &to).await?;
            println!("Updated {moved} record(s)");
        }
        UsageCommand::Rm { base, path, folder } => {
            let removed = rebaser.delete_usage(&base, &path, folder).await?;
            println!("Removed {removed} record(s)");
        }
    }

    Ok(())
}

async fn cmd_notify(db: &Database, command: NotifyCommand) -> Result<()> {
    let settings = match command {
        NotifyCommand::Status => db.notification_settings().await?,
        NotifyCommand::Enable => db.set_daily_reminder(true).await?,
        NotifyCommand::Disable => db.set_daily_reminder(false).await?,
    };

    let state = if settings.enable_daily_reminder {
        "enabled"
    } else {
        "disabled"
    };
    println!("Daily reminder: {state} ({})", settings.reminder_time);
    Ok(())
}

async fn cmd_journal(db: &Database, command: JournalCommand, json: bool) -> Result<()> {
    let store = QuestionnaireStore::new(db.clone());
    let today = Local::now().date_naive();

    match command {
        JournalCommand::Answer {
            question,
            answer,
            date,
        } => {
            let entry = store
                .record_answer(date.unwrap_or(today), &question, &answer)
                .await?;
            println!("Saved answer for {}", entry.entry_date);
        }
        JournalCommand::Show { date } => {
            let entries = store.entries_for(date.unwrap_or(today)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No answers.");
            } else {
                for entry in entries {
                    println!("Q: {}", entry.question);
                    println!("A: {}", entry.answer);
                    println!();
                }
            }
        }
        JournalCommand::Days => {
            for day in store.entry_dates().await? {
                println!("{day}");
            }
        }
    }

    Ok(())
}

async fn cmd_graph(db: &Database, command: GraphCommand, json: bool) -> Result<()> {
    let store = LearningGraphStore::new(db.clone());

    match command {
        GraphCommand::Add { label } => {
            let node = store.add_node(&label).await?;
            println!("{} | {}", node.id, node.label);
        }
        GraphCommand::Link {
            source,
            target,
            relation,
        } => {
            store
                .link(parse_id(&source)?, parse_id(&target)?, &relation)
                .await?;
            println!("Linked {source} -[{relation}]-> {target}");
        }
        GraphCommand::Rm { id } => {
            if store.remove_node(parse_id(&id)?).await? == 0 {
                anyhow::bail!("Topic not found");
            }
            println!("Removed topic: {id}");
        }
        GraphCommand::Show => {
            let graph = store.graph().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&graph)?);
                return Ok(());
            }
            for node in &graph.nodes {
                println!("{} | {}", node.id, node.label);
            }
            if !graph.edges.is_empty() {
                println!();
            }
            for edge in &graph.edges {
                println!(
                    "{} -[{}]-> {}",
                    edge.source_id, edge.relation, edge.target_id
                );
            }
        }
    }

    Ok(())
}

async fn cmd_stats(db: &Database) -> Result<()> {
    let stats = db.stats().await?;

    println!("Database Statistics");
    println!("-------------------");
    println!("Tracked files:   {}", stats.file_usage);
    println!("Reminders:       {}", stats.repetitions);
    println!("Journal answers: {}", stats.questionnaire_entries);
    println!("Topics:          {}", stats.learning_nodes);
    println!("Relations:       {}", stats.learning_edges);

    Ok(())
}

async fn cmd_reset(db: &Database, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to delete all data without --yes");
    }
    db.reset_all().await?;
    println!("All data deleted.");
    Ok(())
}

fn parse_id(id: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(id)?)
}

fn intervals_from(days: &[i64]) -> Result<ReminderIntervals> {
    if days.len() > INTERVAL_SLOTS {
        anyhow::bail!("At most {INTERVAL_SLOTS} intervals are supported");
    }
    let mut slots = [None; INTERVAL_SLOTS];
    for (slot, days) in slots.iter_mut().zip(days) {
        *slot = Some(*days);
    }
    Ok(ReminderIntervals::new(slots))
}

fn edit_patch(
    name: Option<String>,
    content: Option<String>,
    intervals: &[i64],
) -> Result<RepetitionPatch> {
    let mut patch = RepetitionPatch {
        name,
        content,
        ..RepetitionPatch::default()
    };
    if !intervals.is_empty() {
        let [first, second, third, fourth] = intervals_from(intervals)?.0;
        patch.reminder_interval_1 = Some(first);
        patch.reminder_interval_2 = Some(second);
        patch.reminder_interval_3 = Some(third);
        patch.reminder_interval_4 = Some(fourth);
    }
    Ok(patch)
}

fn print_item(item: &RepetitionItem, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(item)?);
    } else {
        println!("{}", item_line(item, Utc::now()));
    }
    Ok(())
}

fn print_items(items: &[RepetitionItem], json: bool, empty: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else if items.is_empty() {
        println!("{empty}");
    } else {
        for item in items {
            println!("{}", item_line(item, Utc::now()));
        }
    }
    Ok(())
}

fn item_line(item: &RepetitionItem, now: DateTime<Utc>) -> String {
    let next = match item.state() {
        ScheduleState::Scheduled(index) => item.next_reminder_date.map_or_else(
            || "-".to_string(),
            |date| format!("{} (step {})", date.format("%Y-%m-%d %H:%M"), index + 1),
        ),
        ScheduleState::Exhausted => "done".to_string(),
    };
    let flag = if item.is_muted {
        " [muted]"
    } else if item.is_due(now) {
        " [due]"
    } else {
        ""
    };
    format!("{} | {} | {}{}", item.id, next, item.name, flag)
}

fn print_usage(records: &[UsageRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No tracked files.");
        return Ok(());
    }
    for record in records {
        println!(
            "{:>4} | {} | {}",
            record.access_count,
            record.last_opened_or_edited_at.format("%Y-%m-%d %H:%M"),
            record.relative_path
        );
    }
    Ok(())
}
