//! taggable-admin: Command-line tool for inspecting and maintaining tags.
//!
//! Reads `DATABASE_URL` and the `TAGGABLE_*` settings from the environment
//! (a `.env` file is honored).

use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taggable_db::{
    Database, PoolConfig, Tag, TagName, TagRepository, TaggableRepository, TaggingConfig,
    TypeRegistry,
};

#[derive(Parser)]
#[command(name = "taggable-admin")]
#[command(author, version, about = "Tag administration for taggable")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every tag with its usage count
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a tag and the entities carrying it
    Show {
        /// Tag name (any casing) or numeric id
        tag: String,
    },

    /// Delete a tag and all of its associations
    Delete {
        /// Tag name (any casing) or numeric id
        tag: String,

        /// Skip the usage check and delete even if the tag is in use
        #[arg(long)]
        force: bool,
    },

    /// Print the normalized key for a name without touching the database
    Normalize {
        /// Raw tag name
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// LOG_FORMAT selects "json" or "text" (default); RUST_LOG filters.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taggable_db=info".into());
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = TaggingConfig::from_env().context("invalid tagging configuration")?;

    match cli.command {
        Commands::Normalize { name } => {
            let tag = TagName::new(&name, &config)?;
            println!("{}", tag.normalized());
        }
        Commands::List { json } => {
            let db = connect(cli.database_url, config).await?;
            cmd_list(&db, json).await?;
        }
        Commands::Show { tag } => {
            let db = connect(cli.database_url, config).await?;
            cmd_show(&db, &tag).await?;
        }
        Commands::Delete { tag, force } => {
            let db = connect(cli.database_url, config).await?;
            cmd_delete(&db, &tag, force).await?;
        }
    }

    Ok(())
}

/// The admin tool never writes associations, so it runs with an empty registry.
async fn connect(database_url: Option<String>, config: TaggingConfig) -> anyhow::Result<Database> {
    let database_url =
        database_url.context("DATABASE_URL is not set (pass --database-url or export it)")?;
    let pool_config = PoolConfig::from_env()?;
    let db = Database::connect_with_config(&database_url, pool_config, config, TypeRegistry::new())
        .await
        .context("failed to connect to database")?;
    Ok(db)
}

async fn cmd_list(db: &Database, json: bool) -> anyhow::Result<()> {
    let tags = db.tags.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }

    if tags.is_empty() {
        println!("No tags");
        return Ok(());
    }

    println!("{:>8}  {:>6}  {:<32}  NORMALIZED", "ID", "USES", "NAME");
    for usage in &tags {
        println!(
            "{:>8}  {:>6}  {:<32}  {}",
            usage.tag.id, usage.usage_count, usage.tag.name, usage.tag.normalized
        );
    }
    Ok(())
}

async fn cmd_show(db: &Database, needle: &str) -> anyhow::Result<()> {
    let tag = resolve_tag(db, needle).await?;
    let taggables = db.taggables.taggables_for_tag(tag.id).await?;

    println!("Tag:        {}", tag.name);
    println!("Id:         {}", tag.id);
    println!("Normalized: {}", tag.normalized);
    println!("Created:    {}", tag.created_at.to_rfc3339());
    println!("Used by:    {}", taggables.len());
    for target in &taggables {
        println!("  {}", target);
    }
    Ok(())
}

async fn cmd_delete(db: &Database, needle: &str, force: bool) -> anyhow::Result<()> {
    let tag = resolve_tag(db, needle).await?;
    let taggables = db.taggables.taggables_for_tag(tag.id).await?;

    if !taggables.is_empty() && !force {
        bail!(
            "tag '{}' is attached to {} entities; rerun with --force to delete it anyway",
            tag.name,
            taggables.len()
        );
    }

    db.tags.delete(tag.id).await?;
    println!(
        "Deleted tag '{}' ({} associations removed)",
        tag.name,
        taggables.len()
    );
    Ok(())
}

/// Numeric input is tried as an id first, then as a name.
async fn resolve_tag(db: &Database, needle: &str) -> anyhow::Result<Tag> {
    if let Ok(id) = needle.parse::<i64>() {
        if let Some(tag) = db.tags.get(id).await? {
            return Ok(tag);
        }
    }

    db.tags
        .find_by_normalized_name(needle)
        .await?
        .with_context(|| format!("no tag matches '{}'", needle))
}
