use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use recipe_sync::catalog::RecipeTypeCatalog;
use recipe_sync::config::{self, Config};
use recipe_sync::db;
use recipe_sync::model::{PersistedRecipe, RecipeRecord};
use recipe_sync::spoonacular::SpoonacularClient;
use recipe_sync::sync::RecipeSynchronizer;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fill an empty store from the recipe API, then list a category
    Fetch {
        #[arg(long)]
        category: String,
        /// Number of recipes to request (defaults to spoonacular.default_limit)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// List stored recipes, optionally restricted to one category
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Print the recipe type catalog
    Types,
    /// Autocomplete recipe titles through the recipe API
    Search { query: String },
    /// Store a recipe read from a JSON file, with image bytes from a file
    Add {
        #[arg(long)]
        from: PathBuf,
        #[arg(long)]
        image: PathBuf,
    },
    /// Replace the content of the recipe titled `title`
    Edit {
        #[arg(long)]
        title: String,
        #[arg(long)]
        from: PathBuf,
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let catalog = RecipeTypeCatalog::global(cfg.app.catalog_path.as_deref().map(Path::new));

    if let Command::Types = args.command {
        for (idx, t) in catalog.types().iter().enumerate() {
            println!("{:>2}  {}", idx, t.title);
        }
        return Ok(());
    }

    let client = SpoonacularClient::from_config(&cfg)?;
    if let Command::Search { query } = &args.command {
        for hit in client.autocomplete(query).await? {
            println!("{:>8}  {}", hit.id, hit.title);
        }
        return Ok(());
    }

    let synchronizer = open_synchronizer(&cfg, client).await?;

    match args.command {
        Command::Fetch { category, limit } => {
            let limit = limit.unwrap_or(cfg.spoonacular.default_limit);
            let index = catalog.index_of(&category);
            if index == catalog.len() {
                warn!(%category, "category is not in the recipe type catalog");
            }
            // The full-store publish from the fetch goes to the log only.
            let quiet = synchronizer.subscribe(|recipes| info!(count = recipes.len(), "store refreshed"));
            if let Err(err) = synchronizer.fetch_by_category(&category, limit).await {
                warn!(%err, "showing stored recipes only");
            }
            synchronizer.unsubscribe(&quiet);
            synchronizer.filter_query(&category).await;
            // Fires immediately with the filtered list.
            synchronizer.subscribe(print_recipes);
        }
        Command::List { category } => {
            match category {
                Some(category) => synchronizer.filter_query(&category).await,
                None => {
                    synchronizer.reload().await;
                    synchronizer.publish(synchronizer.results());
                }
            }
            synchronizer.subscribe(print_recipes);
        }
        Command::Add { from, image } => {
            let record = read_record(&from)?;
            let bytes = std::fs::read(&image)
                .with_context(|| format!("failed to read image: {}", image.display()))?;
            if !synchronizer.save_new(Some(&record), bytes).await {
                return Err(anyhow!("failed to save recipe"));
            }
            info!("recipe saved");
        }
        Command::Edit { title, from, image } => {
            let record = read_record(&from)?;
            let bytes = match image {
                Some(path) => Some(
                    std::fs::read(&path)
                        .with_context(|| format!("failed to read image: {}", path.display()))?,
                ),
                None => None,
            };
            synchronizer.reload().await;
            let existing = synchronizer
                .results()
                .into_iter()
                .find(|r| r.title == title)
                .ok_or_else(|| anyhow!("no recipe titled {:?}", title))?;
            if !synchronizer.replace_content(&existing, &record, bytes).await {
                return Err(anyhow!("failed to update recipe {:?}", title));
            }
            info!(%title, "recipe updated");
        }
        Command::Types | Command::Search { .. } => {}
    }

    Ok(())
}

async fn open_synchronizer(cfg: &Config, client: SpoonacularClient) -> Result<RecipeSynchronizer> {
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;
    Ok(RecipeSynchronizer::new(pool, Box::new(client)))
}

fn read_record(path: &Path) -> Result<RecipeRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read recipe file: {}", path.display()))?;
    serde_json::from_str(&content).context("invalid recipe JSON")
}

#[allow(clippy::ptr_arg)]
fn print_recipes(recipes: &Vec<PersistedRecipe>) {
    for r in recipes {
        println!("{}  [{}]  {} min", r.title, r.category, r.time_minutes);
        for i in &r.ingredients {
            println!("    - {}", i.description);
        }
        for i in &r.instructions {
            println!("    {}. {}", i.step, i.description);
        }
    }
}
