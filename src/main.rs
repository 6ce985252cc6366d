use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use std::path::PathBuf;
use todostore::{Config, FileStorage, Filter, Snapshot, TaskStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "Todostore CLI - a single-user task list kept in a local store")]
#[command(version)]
struct Cli {
    /// Directory holding the stored task list (default: from config)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Storage key of the task list (default: from config, "todos")
    #[arg(short, long)]
    key: Option<String>,

    /// Print JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Toggle a task between active and completed
    Toggle { id: String },

    /// Delete a task
    Delete { id: String },

    /// Delete all completed tasks
    ClearCompleted,

    /// Show tasks
    List {
        /// all, active or completed
        #[arg(short, long, default_value = "all", value_parser = parse_filter)]
        filter: Filter,
    },

    /// Show task counts
    Stats,
}

fn parse_filter(s: &str) -> Result<Filter, String> {
    s.parse::<Filter>().map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let store_path = cli.store_path.unwrap_or(config.storage_dir);
    let key = cli.key.unwrap_or(config.key);

    // Held for the whole load-modify-write cycle so concurrent runs cannot drop each other's changes
    let mut storage = FileStorage::open(&store_path)?;
    storage.hold_lock()?;
    let mut store = TaskStore::open_with_key(storage, &key)?;

    let json = cli.json;
    if !matches!(cli.command, Commands::Stats) {
        store.subscribe(move |snapshot| render(snapshot, json));
    }

    match cli.command {
        Commands::Add { text } => {
            let text = text.join(" ");
            match store.add(&text) {
                Some(task) if !json => println!("{} {}", "Added".green(), task.id.dimmed()),
                Some(_) => {}
                None => eprintln!("{}", "Nothing to add: task text is empty".yellow()),
            }
        }
        Commands::Toggle { id } => {
            if !store.toggle(&id) {
                eprintln!("{} {}", "No task with id".yellow(), id);
            }
        }
        Commands::Delete { id } => {
            if !store.delete(&id) {
                eprintln!("{} {}", "No task with id".yellow(), id);
            }
        }
        Commands::ClearCompleted => {
            let removed = store.clear_completed();
            if !json {
                println!("Cleared {} completed task(s)", removed);
            }
        }
        Commands::List { filter } => {
            store.set_filter(filter);
        }
        Commands::Stats => {
            let stats = store.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "Total: {}  Remaining: {}  Completed: {}",
                    stats.total.to_string().bold(),
                    stats.active.to_string().bold(),
                    stats.completed.to_string().bold()
                );
            }
        }
    }

    Ok(())
}

fn render(snapshot: &Snapshot<'_>, json: bool) {
    if json {
        match serde_json::to_string_pretty(snapshot) {
            Ok(out) => println!("{}", out),
            Err(e) => eprintln!("Error: {:#}", e),
        }
        return;
    }

    let (title, empty) = match snapshot.filter {
        Filter::All => ("All tasks", "No tasks"),
        Filter::Active => ("Active tasks", "No active tasks"),
        Filter::Completed => ("Completed tasks", "No completed tasks"),
    };

    println!("{}", title.bold());
    if snapshot.visible.is_empty() {
        println!("  {}", empty.dimmed());
    }
    for task in &snapshot.visible {
        if task.completed {
            println!("  [x] {}  {}", task.text.strikethrough().dimmed(), task.id.dimmed());
        } else {
            println!("  [ ] {}  {}", task.text, task.id.dimmed());
        }
    }

    let stats = snapshot.stats;
    println!(
        "Total: {}  Remaining: {}  Completed: {}",
        stats.total, stats.active, stats.completed
    );
    if stats.has_completed() {
        println!("{}", "Run `todostore clear-completed` to remove completed tasks".dimmed());
    }
}
