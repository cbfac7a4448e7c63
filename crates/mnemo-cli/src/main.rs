//! Mnemo - versioned long-term memory for AI agents
//!
//! The `mnemo` command stores, recalls and maintains agent memories.
//!
//! ## Commands
//!
//! - `add` / `update` / `delete`: Write memories (every write is committed)
//! - `import`: Load memories exported as a JSON array
//! - `recall` / `catchup` / `keystones`: Read memories by relevance, recency or importance
//! - `context`: Pack core and task memories into a token budget
//! - `decision`: Track decisions and reinforce the memories behind good outcomes
//! - `promote`: Copy proven memories into the shared global store
//! - `conflict`: Resolve two contradicting memories
//!
//! With `--robot`, every command prints one JSON object on stdout:
//! `{"status":"ok",...}` or `{"status":"error","message":...}`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use mnemo_core::memory::reflection::extract_facts;
use mnemo_core::pairing::{self, PairingAction};
use mnemo_core::{
    Category, ConflictAction, DecisionRecorder, DecisionRecorderConfig, Memory, MemoryService,
    MnemoConfig, NewMemory, OllamaGenerator, OpenAiEmbedder, PromotionCriteria, RecallOptions,
    Status, SurrealHandle, TaskSpan, UpdateParams, METRICS, VERSION,
};
use mnemo_state::coerce::parse_timestamp;
use serde_json::{json, Value};
use tokio::io::AsyncBufReadExt;
use tokio::sync::Mutex;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mnemo")]
#[command(author = "Mnemo Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Versioned long-term memory for AI agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Machine-readable JSON output on stdout
    #[arg(long, global = true)]
    robot: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a new memory
    Add {
        content: String,

        #[arg(short, long, default_value = "episodic")]
        category: Category,

        #[arg(short, long, default_value_t = 0.5)]
        priority: f64,

        #[arg(long, default_value = "system")]
        owner: String,

        #[arg(long, default_value = "")]
        team: String,

        /// Comma-separated tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(short, long)]
        source: Option<String>,
    },

    /// Change fields of an existing memory
    Update {
        id: String,

        #[arg(long)]
        content: Option<String>,

        #[arg(short, long)]
        category: Option<Category>,

        #[arg(short, long)]
        priority: Option<f64>,

        #[arg(long)]
        owner: Option<String>,

        /// Replace all tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        #[arg(short, long)]
        source: Option<String>,
    },

    /// Recall memories matching a query
    Recall {
        #[arg(default_value = "")]
        query: String,

        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Only memories carrying all of these tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(short, long)]
        category: Option<Category>,

        #[arg(long)]
        owner: Option<String>,

        #[arg(long)]
        team: Option<String>,

        /// Rank by decay score
        #[arg(long)]
        decay: bool,

        /// Rank by embedding similarity
        #[arg(long)]
        semantic: bool,
    },

    /// Newest memories first
    Catchup {
        #[arg(short, long, default_value = "10")]
        limit: usize,

        #[arg(short, long)]
        category: Option<Category>,

        /// Only memories created at or after this time (RFC 3339 or "YYYY-MM-DD HH:MM:SS")
        #[arg(long)]
        since: Option<String>,
    },

    /// Committed versions of a memory
    History { id: String },

    /// Restore a memory to its state at a commit
    Rollback { id: String, commit: String },

    /// Link two memories
    Link {
        from: String,
        to: String,

        #[arg(short, long, default_value = "related")]
        relation: String,
    },

    /// Show one memory and its links
    Show { id: String },

    /// Foundational memories by keystone score
    Keystones {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Store statistics
    Stats,

    /// Pack core and task memories into a token budget
    Context {
        task: Option<String>,

        #[arg(long, default_value = "4000")]
        tokens: usize,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Promote memories to the global store
    Promote {
        /// Memory to promote (omit with --auto)
        id: Option<String>,

        /// Promote every eligible memory
        #[arg(long)]
        auto: bool,

        /// List candidates without promoting
        #[arg(long)]
        dry_run: bool,

        #[arg(long, default_value = "5")]
        min_access: u32,

        #[arg(long, default_value_t = 0.8)]
        min_outcome: f64,
    },

    /// Delete a memory
    Delete { id: String },

    /// List every tag in use
    Tags,

    /// Set the review status of a memory
    Status { id: String, status: Status },

    /// Track decisions and their outcomes
    Decision {
        #[command(subcommand)]
        action: DecisionAction,
    },

    /// Show recent episodic memories with a synthesis prompt
    Reflect {
        #[arg(long, default_value = "24")]
        hours: u32,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Extract facts from a raw log with the local model
    Extract {
        /// Log file to read
        file: PathBuf,

        /// Store each fact as a semantic memory
        #[arg(long)]
        save: bool,
    },

    /// Import memories from a JSON array of exported rows
    Import {
        /// JSON file to read
        file: PathBuf,
    },

    /// Resolve contradicting memories
    Conflict {
        #[command(subcommand)]
        action: ConflictCommand,
    },

    /// Session pairing with local tools
    Pairing {
        #[command(subcommand)]
        action: PairingCommand,
    },

    /// Show the commit log
    Log {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Robot mode commands for agent integration
    Robot {
        #[command(subcommand)]
        action: RobotAction,
    },
}

#[derive(Subcommand)]
enum DecisionAction {
    /// Record a decision and the memories behind it
    Track {
        text: String,

        #[arg(long)]
        task: String,

        /// Comma-separated memory ids
        #[arg(short, long, value_delimiter = ',')]
        memories: Vec<String>,
    },

    /// Record the outcome of a decision (0.0 - 1.0)
    Outcome {
        id: String,
        outcome: f64,

        #[arg(short, long, default_value = "")]
        feedback: String,
    },

    /// List decisions, newest first
    List {
        #[arg(long)]
        task: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConflictCommand {
    /// Resolve a conflict between two memories
    Resolve {
        first: String,
        second: String,

        /// keep1, keep2, merge, noop (or 1-4); prompts when omitted
        #[arg(short, long)]
        action: Option<ConflictAction>,
    },
}

#[derive(Subcommand)]
enum PairingCommand {
    /// Start the pairing listener
    Start {
        #[arg(long, default_value = "default")]
        task: String,

        /// Socket path (defaults to the configured pairing socket)
        #[arg(long, env = "MNEMO_PAIRING_SOCKET")]
        socket: Option<PathBuf>,
    },

    /// Send one report to a running listener
    Report {
        action: String,

        #[arg(long, default_value = "default")]
        task: String,

        #[arg(long, default_value = "cli")]
        source: String,

        #[arg(long, env = "MNEMO_PAIRING_SOCKET")]
        socket: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum RobotAction {
    /// Memory system status
    Status,
}

/// Everything a command needs
struct App {
    handle: Arc<SurrealHandle>,
    service: MemoryService,
    recorder: DecisionRecorder,
    config: MnemoConfig,
    robot: bool,
}

impl App {
    fn new(handle: Arc<SurrealHandle>, config: MnemoConfig, robot: bool) -> Self {
        let mut service = MemoryService::new(handle.clone()).with_author(config.author.clone());
        if config.embeddings_enabled() {
            service = service.with_embedder(Arc::new(OpenAiEmbedder::from_config(&config)));
        }
        let recorder = DecisionRecorder::with_config(
            handle.clone(),
            DecisionRecorderConfig {
                author: config.author.clone(),
                ..DecisionRecorderConfig::default()
            },
        );
        Self {
            handle,
            service,
            recorder,
            config,
            robot,
        }
    }

    /// Print `payload` as a robot object, or run `human` for terminal output.
    fn emit(&self, payload: Value, human: impl FnOnce()) -> Result<()> {
        if self.robot {
            println!("{}", serde_json::to_string(&robot_ok(payload))?);
        } else {
            human();
        }
        Ok(())
    }
}

fn robot_ok(payload: Value) -> Value {
    let mut out = serde_json::Map::new();
    out.insert("status".to_string(), json!("ok"));
    match payload {
        Value::Object(fields) => out.extend(fields),
        Value::Null => {}
        other => {
            out.insert("data".to_string(), other);
        }
    }
    Value::Object(out)
}

fn robot_error(message: &str) -> Value {
    json!({
        "status": "error",
        "message": message,
        "version": VERSION,
    })
}

/// Memory as JSON without its embedding vector.
fn memory_json(memory: &Memory) -> Result<Value> {
    let mut value = serde_json::to_value(memory)?;
    if let Value::Object(fields) = &mut value {
        fields.remove("embedding");
    }
    Ok(value)
}

fn memories_json(memories: &[Memory]) -> Result<Value> {
    Ok(Value::Array(
        memories.iter().map(memory_json).collect::<Result<Vec<_>>>()?,
    ))
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn print_memory(memory: &Memory) {
    println!(
        "[{}] {} ({}, priority {:.2})",
        short_id(&memory.id),
        memory.content,
        memory.category,
        memory.priority
    );
    if !memory.tags.is_empty() {
        println!("    tags: {}", memory.tags.join(", "));
    }
}

fn print_memories(memories: &[Memory], empty: &str) {
    if memories.is_empty() {
        println!("{}", empty);
        return;
    }
    for memory in memories {
        print_memory(memory);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    mnemo_core::init_tracing(cli.json, level);

    let robot = cli.robot;
    let result = run(cli).await;
    METRICS.flush();

    if let Err(err) = result {
        if robot {
            println!("{}", robot_error(&format!("{err:#}")));
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = MnemoConfig::from_env();
    let handle = SurrealHandle::setup_from_env(None)
        .await
        .context("Failed to connect to Mnemo database")?;
    let app = App::new(Arc::new(handle), config, cli.robot);

    match cli.command {
        Commands::Add {
            content,
            category,
            priority,
            owner,
            team,
            tags,
            source,
        } => {
            let mut input = NewMemory::new(content)
                .category(category)
                .priority(priority)
                .owner(owner)
                .team(team)
                .tags(tags);
            input.source = source;
            cmd_add(&app, input).await
        }
        Commands::Update {
            id,
            content,
            category,
            priority,
            owner,
            tags,
            source,
        } => {
            let params = UpdateParams {
                id,
                content,
                owner_id: owner,
                category,
                priority,
                source,
                tags,
            };
            cmd_update(&app, params).await
        }
        Commands::Recall {
            query,
            limit,
            tags,
            category,
            owner,
            team,
            decay,
            semantic,
        } => {
            let options = RecallOptions {
                query,
                limit,
                tags,
                category,
                owner_id: owner,
                team_id: team,
                with_decay: decay,
                semantic,
            };
            cmd_recall(&app, &options).await
        }
        Commands::Catchup {
            limit,
            category,
            since,
        } => cmd_catchup(&app, limit, category, since.as_deref()).await,
        Commands::History { id } => cmd_history(&app, &id).await,
        Commands::Rollback { id, commit } => cmd_rollback(&app, &id, &commit).await,
        Commands::Link { from, to, relation } => cmd_link(&app, &from, &to, &relation).await,
        Commands::Show { id } => cmd_show(&app, &id).await,
        Commands::Keystones { limit } => cmd_keystones(&app, limit).await,
        Commands::Stats => cmd_stats(&app).await,
        Commands::Context {
            task,
            tokens,
            limit,
        } => cmd_context(&app, task.as_deref(), limit, tokens).await,
        Commands::Promote {
            id,
            auto,
            dry_run,
            min_access,
            min_outcome,
        } => {
            let criteria = PromotionCriteria {
                min_access_count: min_access,
                min_outcome,
            };
            cmd_promote(&app, id.as_deref(), auto, dry_run, &criteria).await
        }
        Commands::Delete { id } => cmd_delete(&app, &id).await,
        Commands::Tags => cmd_tags(&app).await,
        Commands::Status { id, status } => cmd_status(&app, &id, status).await,
        Commands::Decision { action } => match action {
            DecisionAction::Track {
                text,
                task,
                memories,
            } => cmd_decision_track(&app, &task, memories, &text).await,
            DecisionAction::Outcome {
                id,
                outcome,
                feedback,
            } => cmd_decision_outcome(&app, &id, outcome, &feedback).await,
            DecisionAction::List { task } => cmd_decision_list(&app, task.as_deref()).await,
        },
        Commands::Reflect { hours, limit } => cmd_reflect(&app, hours, limit).await,
        Commands::Extract { file, save } => cmd_extract(&app, &file, save).await,
        Commands::Import { file } => cmd_import(&app, &file).await,
        Commands::Conflict { action } => match action {
            ConflictCommand::Resolve {
                first,
                second,
                action,
            } => cmd_conflict_resolve(&app, &first, &second, action).await,
        },
        Commands::Pairing { action } => match action {
            PairingCommand::Start { task, socket } => {
                let socket = socket.unwrap_or_else(|| app.config.pairing_socket.clone());
                cmd_pairing_start(&task, &socket).await
            }
            PairingCommand::Report {
                action,
                task,
                source,
                socket,
            } => {
                let socket = socket.unwrap_or_else(|| app.config.pairing_socket.clone());
                cmd_pairing_report(&app, &socket, PairingAction::new(task, action, source)).await
            }
        },
        Commands::Log { limit } => cmd_log(&app, limit).await,
        Commands::Robot { action } => match action {
            RobotAction::Status => cmd_robot_status(&app).await,
        },
    }
}

async fn cmd_add(app: &App, input: NewMemory) -> Result<()> {
    let memory = app.service.add_memory(input).await?;
    info!(memory_id = %memory.id, "memory added");

    app.emit(json!({ "memory": memory_json(&memory)? }), || {
        println!("Added memory {}", memory.id);
        if memory.embedding.is_some() {
            println!("  (with embedding)");
        }
    })
}

async fn cmd_update(app: &App, params: UpdateParams) -> Result<()> {
    let memory = app.service.update_memory(params).await?;
    app.emit(json!({ "memory": memory_json(&memory)? }), || {
        println!("Updated memory {}", memory.id);
    })
}

async fn cmd_recall(app: &App, options: &RecallOptions) -> Result<()> {
    let memories = app.service.recall(options).await?;
    app.emit(
        json!({ "count": memories.len(), "memories": memories_json(&memories)? }),
        || print_memories(&memories, "No memories found."),
    )
}

async fn cmd_catchup(
    app: &App,
    limit: usize,
    category: Option<Category>,
    since: Option<&str>,
) -> Result<()> {
    let since: Option<DateTime<Utc>> = match since {
        Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| anyhow!("invalid --since: {raw}"))?),
        None => None,
    };
    let memories = app.service.catchup(limit, category, since).await?;
    app.emit(
        json!({ "count": memories.len(), "memories": memories_json(&memories)? }),
        || print_memories(&memories, "Nothing new."),
    )
}

async fn cmd_history(app: &App, id: &str) -> Result<()> {
    let versions = app.service.memory_history(id).await?;
    let payload: Vec<Value> = versions
        .iter()
        .map(|v| -> Result<Value> {
            Ok(json!({
                "commit_hash": v.commit_hash,
                "committer": v.committer,
                "commit_date": v.commit_date,
                "memory": memory_json(&v.memory)?,
            }))
        })
        .collect::<Result<_>>()?;

    app.emit(json!({ "history": payload }), || {
        if versions.is_empty() {
            println!("No history for {}", id);
        }
        for v in &versions {
            println!(
                "commit {}  {}  {}",
                short_id(&v.commit_hash),
                v.commit_date.format("%Y-%m-%d %H:%M:%S UTC"),
                v.committer
            );
            println!("    {}", v.memory.content);
        }
    })
}

async fn cmd_rollback(app: &App, id: &str, commit: &str) -> Result<()> {
    let memory = app.service.rollback_memory(id, commit).await?;
    app.emit(json!({ "memory": memory_json(&memory)? }), || {
        println!("Rolled back {} to {}", id, short_id(commit));
    })
}

async fn cmd_link(app: &App, from: &str, to: &str, relation: &str) -> Result<()> {
    app.service.link_memories(from, to, relation).await?;
    app.emit(json!({ "from": from, "to": to, "relation": relation }), || {
        println!("Linked {} -> {} ({})", short_id(from), short_id(to), relation);
    })
}

async fn cmd_show(app: &App, id: &str) -> Result<()> {
    let memory = app
        .service
        .get_memory(id)
        .await?
        .ok_or_else(|| anyhow!("memory not found: {id}"))?;
    let links = app.service.memory_links(id).await?;

    app.emit(
        json!({ "memory": memory_json(&memory)?, "links": links }),
        || {
            println!("ID:       {}", memory.id);
            println!("Content:  {}", memory.content);
            println!("Category: {}", memory.category);
            println!("Priority: {:.2}", memory.priority);
            println!("Status:   {}", memory.status);
            println!("Owner:    {}", memory.owner_id);
            println!("Accessed: {} time(s)", memory.access_count);
            if let Some(source) = &memory.source {
                println!("Source:   {}", source);
            }
            if !memory.tags.is_empty() {
                println!("Tags:     {}", memory.tags.join(", "));
            }
            for link in &links {
                println!("Link:     {} ({})", link.other_end(id), link.relation);
            }
        },
    )
}

async fn cmd_keystones(app: &App, limit: usize) -> Result<()> {
    let memories = app.service.keystones(limit).await?;
    app.emit(json!({ "memories": memories_json(&memories)? }), || {
        print_memories(&memories, "No memories yet.")
    })
}

async fn cmd_stats(app: &App) -> Result<()> {
    let stats = app.service.memory_stats().await?;
    let payload = json!({
        "total_memories": stats.total_memories,
        "distribution": stats.distribution,
        "metrics": {
            "avg_priority": stats.avg_priority,
            "avg_access_count": stats.avg_access_count,
            "avg_decay_score": stats.avg_decay_score,
        },
    });
    app.emit(payload, || {
        println!("Total memories: {}", stats.total_memories);
        for (category, count) in &stats.distribution {
            println!("  {:<10} {}", category, count);
        }
        println!("Average priority:     {:.2}", stats.avg_priority);
        println!("Average access count: {:.2}", stats.avg_access_count);
        println!("Average decay score:  {:.4}", stats.avg_decay_score);
    })
}

async fn cmd_context(app: &App, task: Option<&str>, limit: usize, tokens: usize) -> Result<()> {
    let window = app.service.assemble_context(task, limit, tokens).await?;
    let items: Vec<Value> = window
        .items
        .iter()
        .map(|item| -> Result<Value> {
            Ok(json!({
                "source": item.source,
                "tokens": item.tokens,
                "memory": memory_json(&item.memory)?,
            }))
        })
        .collect::<Result<_>>()?;

    app.emit(
        json!({
            "total_tokens": window.total_tokens,
            "budget": window.budget,
            "items": items,
        }),
        || {
            for item in &window.items {
                println!("- {}", item.memory.content);
            }
            println!();
            println!("{} memories, {}/{} tokens", window.items.len(), window.total_tokens, window.budget);
        },
    )
}

async fn cmd_promote(
    app: &App,
    id: Option<&str>,
    auto: bool,
    dry_run: bool,
    criteria: &PromotionCriteria,
) -> Result<()> {
    let global = SurrealHandle::setup_from_env(Some(&app.config.global_database))
        .await
        .context("Failed to connect to global store")?;

    if auto {
        let report = app.service.auto_promote(&global, criteria, dry_run).await?;
        return app.emit(serde_json::to_value(&report)?, || {
            if report.candidates.is_empty() {
                println!("No promotion candidates.");
            } else if report.dry_run {
                println!("Would promote {} memories:", report.candidates.len());
                for id in &report.candidates {
                    println!("  {}", id);
                }
            } else {
                println!("Promoted {} memories", report.promoted.len());
                for (id, err) in &report.failed {
                    println!("  failed {}: {}", id, err);
                }
            }
        });
    }

    let Some(id) = id else {
        bail!("give a memory id or --auto");
    };
    app.service.promote_memory(id, &global).await?;
    app.emit(json!({ "promoted": id }), || {
        println!("Promoted {} to {}", id, app.config.global_database);
    })
}

async fn cmd_delete(app: &App, id: &str) -> Result<()> {
    app.service.delete_memory(id).await?;
    app.emit(json!({ "deleted": id }), || println!("Deleted {}", id))
}

async fn cmd_tags(app: &App) -> Result<()> {
    let tags = app.service.list_tags().await?;
    app.emit(json!({ "tags": tags }), || {
        for tag in &tags {
            println!("{}", tag);
        }
    })
}

async fn cmd_status(app: &App, id: &str, status: Status) -> Result<()> {
    let memory = app.service.set_status(id, status).await?;
    app.emit(json!({ "memory": memory_json(&memory)? }), || {
        println!("{} is now {}", id, memory.status);
    })
}

async fn cmd_decision_track(
    app: &App,
    task: &str,
    memory_ids: Vec<String>,
    text: &str,
) -> Result<()> {
    let decision = app.recorder.track_decision(task, memory_ids, text).await?;
    app.emit(json!({ "decision": decision }), || {
        println!("Tracked decision {}", decision.id);
    })
}

async fn cmd_decision_outcome(app: &App, id: &str, outcome: f64, feedback: &str) -> Result<()> {
    let report = app.recorder.record_outcome(id, outcome, feedback).await?;
    app.emit(serde_json::to_value(&report)?, || {
        println!("Recorded outcome {:.2} for {}", outcome, id);
        if !report.boosted.is_empty() {
            println!("Reinforced {} memories", report.boosted.len());
        }
        for (memory_id, err) in &report.failed {
            println!("  could not reinforce {}: {}", memory_id, err);
        }
    })
}

async fn cmd_decision_list(app: &App, task: Option<&str>) -> Result<()> {
    let decisions = app.recorder.list_decisions(task).await?;
    app.emit(json!({ "decisions": decisions }), || {
        if decisions.is_empty() {
            println!("No decisions.");
        }
        for d in &decisions {
            println!(
                "[{}] {} (task {}, outcome {:.2})",
                short_id(&d.id),
                d.decision_text,
                d.task_id,
                d.outcome
            );
        }
    })
}

async fn cmd_reflect(app: &App, hours: u32, limit: usize) -> Result<()> {
    let reflection = app.service.reflect(hours, limit).await?;
    app.emit(
        json!({
            "hours": reflection.hours,
            "memories": memories_json(&reflection.memories)?,
            "prompt": reflection.prompt,
        }),
        || {
            if reflection.is_empty() {
                println!("No episodic memories found for reflection.");
                return;
            }
            println!(
                "Reflecting on {} episodic memories from the last {} hour(s)\n",
                reflection.memories.len(),
                hours
            );
            for (i, m) in reflection.memories.iter().enumerate() {
                println!("{}. [{}] {}", i + 1, short_id(&m.id), m.content);
            }
            println!("\n--- Synthesis Prompt ---");
            println!("{}", reflection.prompt);
        },
    )
}

async fn cmd_extract(app: &App, file: &Path, save: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let generator = OllamaGenerator::from_config(&app.config);
    let facts = extract_facts(&generator, &raw).await?;

    let mut saved = Vec::new();
    if save {
        for fact in &facts {
            let memory = app
                .service
                .add_memory(
                    NewMemory::new(fact.clone())
                        .category(Category::Semantic)
                        .priority(0.7)
                        .source(file.display().to_string()),
                )
                .await?;
            saved.push(memory.id);
        }
    }

    app.emit(json!({ "facts": facts, "saved": saved }), || {
        for fact in &facts {
            println!("- {}", fact);
        }
        if save {
            println!("\nSaved {} facts", saved.len());
        }
    })
}

async fn cmd_import(app: &App, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let rows: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of memories", file.display()))?;
    let report = app.service.import_memories(rows).await?;

    app.emit(json!(report), || {
        println!("Imported {} memories", report.imported.len());
        for reason in &report.skipped {
            println!("  skipped {}", reason);
        }
    })
}

async fn cmd_conflict_resolve(
    app: &App,
    first: &str,
    second: &str,
    action: Option<ConflictAction>,
) -> Result<()> {
    let action = match action {
        Some(action) => action,
        None if app.robot => bail!("--action is required in robot mode"),
        None => prompt_conflict_action(app, first, second).await?,
    };

    let resolution = app.service.resolve_conflict(first, second, action).await?;
    app.emit(
        json!({
            "action": resolution.action,
            "kept": resolution.kept.as_ref().map(|m| m.id.clone()),
            "deprecated": resolution.deprecated,
        }),
        || match (&resolution.kept, &resolution.deprecated) {
            (Some(kept), Some(deprecated)) => {
                println!("Kept {}, deprecated {}", kept.id, deprecated)
            }
            _ => println!("No action taken."),
        },
    )
}

async fn prompt_conflict_action(app: &App, first: &str, second: &str) -> Result<ConflictAction> {
    for (label, id) in [("Memory 1", first), ("Memory 2", second)] {
        let memory = app
            .service
            .get_memory(id)
            .await?
            .ok_or_else(|| anyhow!("memory not found: {id}"))?;
        println!("{}:", label);
        println!("  ID: {}", memory.id);
        println!("  Content: {}", memory.content);
        println!("  Category: {}\n", memory.category);
    }
    println!("Resolution options:");
    println!("1. Keep Memory 1 (deprecate Memory 2)");
    println!("2. Keep Memory 2 (deprecate Memory 1)");
    println!("3. Merge into Memory 1");
    println!("4. Keep both (no action)");
    println!("\nSelect option [1-4]: ");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let choice = lines.next_line().await?.unwrap_or_default();
    Ok(choice.parse()?)
}

async fn cmd_pairing_start(task: &str, path: &Path) -> Result<()> {
    let _span = TaskSpan::enter(task);
    let listener = pairing::PairingListener::bind(path)
        .with_context(|| format!("Error starting pairing listener at {}", path.display()))?;

    println!("Pairing listener started at {} (task: {})", path.display(), task);
    println!("Listening for tool reports...");
    listener
        .serve(Arc::new(Mutex::new(tokio::io::stdout())))
        .await?;
    Ok(())
}

async fn cmd_pairing_report(app: &App, socket: &Path, action: PairingAction) -> Result<()> {
    pairing::report(socket, &action).await?;
    app.emit(json!({ "reported": action }), || {})
}

async fn cmd_log(app: &App, limit: usize) -> Result<()> {
    let commits = app.handle.commit_log(limit).await?;
    app.emit(json!({ "commits": commits }), || {
        if commits.is_empty() {
            println!("No commits yet.");
        }
        for commit in &commits {
            println!("commit {}", commit.commit_id);
            println!("Author: {}", commit.author);
            println!(
                "Date:   {}",
                commit.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!();
            println!("    {}", commit.message);
            println!();
        }
    })
}

async fn cmd_robot_status(app: &App) -> Result<()> {
    let count = app.service.memory_count().await?;
    app.emit(
        json!({
            "version": VERSION,
            "database": app.handle.database(),
            "memory_count": count,
            "embeddings": app.service.has_embedder(),
        }),
        || {
            println!("mnemo {}", VERSION);
            println!("database: {}", app.handle.database());
            println!("memories: {}", count);
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn app() -> App {
        let handle = SurrealHandle::setup_db().await.unwrap();
        App::new(Arc::new(handle), MnemoConfig::default(), true)
    }

    #[test]
    fn test_robot_ok_merges_object_fields() {
        let out = robot_ok(json!({ "count": 2 }));
        assert_eq!(out, json!({ "status": "ok", "count": 2 }));
        assert_eq!(robot_ok(Value::Null), json!({ "status": "ok" }));
        assert_eq!(robot_ok(json!([1])), json!({ "status": "ok", "data": [1] }));
    }

    #[test]
    fn test_robot_error_shape() {
        let err = robot_error("boom");
        assert_eq!(err["status"], "error");
        assert_eq!(err["message"], "boom");
    }

    #[test]
    fn test_memory_json_drops_embedding() {
        let memory = Memory::new("m", Category::Core, 0.5).with_embedding(vec![1.0, 2.0]);
        let value = memory_json(&memory).unwrap();
        assert!(value.get("embedding").is_none());
        assert_eq!(value["content"], "m");
    }

    #[test]
    fn test_cli_parses_add_defaults() {
        let cli = Cli::try_parse_from(["mnemo", "add", "remember this", "--tags", "a,b"]).unwrap();
        match cli.command {
            Commands::Add {
                category,
                priority,
                owner,
                tags,
                ..
            } => {
                assert_eq!(category, Category::Episodic);
                assert_eq!(priority, 0.5);
                assert_eq!(owner, "system");
                assert_eq!(tags, vec!["a", "b"]);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_category() {
        assert!(Cli::try_parse_from(["mnemo", "add", "x", "--category", "bogus"]).is_err());
    }

    #[tokio::test]
    async fn test_add_then_decision_flow() {
        let app = app().await;
        cmd_add(&app, NewMemory::new("use tracing everywhere").category(Category::Core))
            .await
            .unwrap();
        let memories = app
            .service
            .recall(&RecallOptions::new("tracing"))
            .await
            .unwrap();
        assert_eq!(memories.len(), 1);

        cmd_decision_track(&app, "task-1", vec![memories[0].id.clone()], "add spans")
            .await
            .unwrap();
        let decisions = app.recorder.list_decisions(Some("task-1")).await.unwrap();
        cmd_decision_outcome(&app, &decisions[0].id, 0.95, "good")
            .await
            .unwrap();

        let boosted = app.service.get_memory(&memories[0].id).await.unwrap().unwrap();
        assert!((boosted.priority - 0.6).abs() < 1e-9);
        assert_eq!(boosted.access_count, 1);

        cmd_log(&app, 10).await.unwrap();
        cmd_stats(&app).await.unwrap();
        cmd_robot_status(&app).await.unwrap();
    }

    #[tokio::test]
    async fn test_conflict_requires_action_in_robot_mode() {
        let app = app().await;
        let err = cmd_conflict_resolve(&app, "a", "b", None).await.unwrap_err();
        assert!(err.to_string().contains("--action"));
    }

    #[tokio::test]
    async fn test_invalid_outcome_is_an_error() {
        let app = app().await;
        assert!(cmd_decision_outcome(&app, "missing", 1.5, "").await.is_err());
    }

    #[tokio::test]
    async fn test_import_reads_exported_array() {
        let app = app().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("export.json");
        std::fs::write(
            &file,
            r#"[
                {"id": "e1", "content": "pin the toolchain", "created_at": "2024-03-01 12:30:00"},
                {"id": "e1", "content": "duplicate"}
            ]"#,
        )
        .unwrap();

        cmd_import(&app, &file).await.unwrap();
        let imported = app.service.get_memory("e1").await.unwrap().unwrap();
        assert_eq!(imported.content, "pin the toolchain");

        std::fs::write(&file, r#"{"id": "not-an-array"}"#).unwrap();
        let err = cmd_import(&app, &file).await.unwrap_err();
        assert!(err.to_string().contains("JSON array"));
    }
}
