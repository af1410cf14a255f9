use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use discovery_core::config::Config;
use discovery_core::types::{
    Difficulty, EntitySet, EntityType, ItemKey, ResultItem, SortMode, TimeRange,
};
use discovery_engine::{DiscoveryEngine, ViewModel, WatchStore};
use discovery_fetch::MemoryCatalog;

const USAGE: &str = "Usage: discovery-search <query> [--catalog DIR] \
[--type recipe|community|user]... [--tag TAG]... [--difficulty easy|medium|hard] \
[--time under15|under30|under60|over60] [--sort relevance|newest|popular] \
[--more N] [--like RECIPE_ID]";

#[derive(Debug, Default)]
struct Args {
    query: String,
    catalog: Option<PathBuf>,
    types: Vec<EntityType>,
    tags: Vec<String>,
    difficulty: Option<Difficulty>,
    time_range: Option<TimeRange>,
    sort: Option<SortMode>,
    more: usize,
    like: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut parsed = Args::default();
    let mut words = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{flag} requires a value\n{USAGE}"))
        };
        match flag {
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            "--catalog" => parsed.catalog = Some(PathBuf::from(value()?)),
            "--type" => parsed.types.push(value()?.parse()?),
            "--tag" => parsed.tags.push(value()?),
            "--difficulty" => parsed.difficulty = Some(value()?.parse()?),
            "--time" => parsed.time_range = Some(value()?.parse()?),
            "--sort" => parsed.sort = Some(value()?.parse()?),
            "--more" => {
                parsed.more =
                    value()?.parse().map_err(|_| anyhow::anyhow!("--more requires a number"))?
            }
            "--like" => parsed.like = Some(value()?),
            other if other.starts_with("--") => anyhow::bail!("unknown option {other}\n{USAGE}"),
            word => {
                words.push(word.to_string());
                i += 1;
                continue;
            }
        }
        i += 2;
    }
    parsed.query = words.join(" ");
    let no_facets =
        parsed.tags.is_empty() && parsed.difficulty.is_none() && parsed.time_range.is_none();
    if parsed.query.trim().is_empty() && no_facets {
        anyhow::bail!("nothing to search for\n{USAGE}");
    }
    Ok(parsed)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_catalog(dir: &Path) -> anyhow::Result<MemoryCatalog> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let catalog = MemoryCatalog::load_dir_with(dir, |done, total, path| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        pb.set_message(name.unwrap_or_default());
    })?;
    pb.finish_and_clear();
    Ok(catalog)
}

fn marker(on: bool, label: &str) -> &str {
    if on { label } else { "" }
}

fn counter_line(item: &ResultItem) -> String {
    let counters = &item.counters;
    let viewer = &item.viewer;
    match item.entity_type {
        EntityType::Recipe => format!(
            "♥ {}{}  💬 {}",
            counters.likes,
            marker(viewer.liked, " (liked)"),
            counters.comments
        ),
        EntityType::Community => {
            format!("👥 {} members{}", counters.members, marker(viewer.following, " (joined)"))
        }
        EntityType::User => format!(
            "👤 {} followers{}",
            counters.followers,
            marker(viewer.following, " (following)")
        ),
    }
}

fn print_view(view: &ViewModel) {
    println!("\n🔍 {} results{}", view.items.len(), marker(view.has_more, " (more available)"));
    for (i, item) in view.items.iter().enumerate() {
        println!(
            "\n  {}. [{}] {}  id={}  {}",
            i + 1,
            item.entity_type,
            item.title,
            item.id,
            counter_line(item)
        );
        if !item.summary.is_empty() {
            println!("     📝 {}", item.summary);
        }
        if !item.tags.is_empty() {
            println!("     🏷  {}", item.tags.join(", "));
        }
    }
    for (entity_type, error) in &view.errors_by_entity_type {
        println!("\n⚠️  {entity_type}: {error}");
    }
    for (key, error) in &view.item_errors {
        println!("⚠️  {key}: {error}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let args = parse_args()?;
    let engine_config = config.engine()?;
    let catalog_dir = match args.catalog.clone() {
        Some(dir) => dir,
        None => config.catalog_dir()?.unwrap_or_else(|| PathBuf::from("test_data/catalog")),
    };

    println!("🔍 discovery-search\n==================");
    println!("Query: {}", args.query);
    println!("Catalog: {}", catalog_dir.display());
    let catalog = Arc::new(load_catalog(&catalog_dir)?);

    let store = Arc::new(WatchStore::new());
    let engine =
        DiscoveryEngine::new(catalog.clone(), catalog.clone(), store.clone(), &engine_config);
    if let Some(types) = EntitySet::new(args.types.iter().copied()) {
        engine.set_entity_types(types);
    }
    for tag in &args.tags {
        engine.toggle_tag(tag);
    }
    engine.set_difficulty(args.difficulty);
    engine.set_time_range(args.time_range);
    if let Some(sort) = args.sort {
        engine.set_sort_mode(sort);
    }
    engine.set_query(&args.query);
    engine.submit();
    engine.settled().await;

    for page in 0..args.more {
        let issued = engine.load_more();
        if issued == 0 {
            info!(page, "nothing more to load");
            break;
        }
        engine.settled().await;
    }

    if let Some(id) = &args.like {
        let key = ItemKey::new(EntityType::Recipe, id.as_str());
        match engine.like(&key) {
            Ok(delta) => {
                engine.settled().await;
                println!("\n♥ liked {} ({})", key, delta.id);
            }
            Err(e) => println!("\n⚠️  could not like {}: {}", key, e),
        }
    }

    print_view(&store.latest());
    Ok(())
}
