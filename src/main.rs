use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use meal_planner::db::RecipeRow;
use meal_planner::http::HttpClient;
use meal_planner::nutrition::{significant_nutrients, CachedLookup, UsdaClient};
use meal_planner::parser::RecipeCard;
use meal_planner::places::{Location, PlacesClient, DEFAULT_RADIUS_M};
use meal_planner::query;
use meal_planner::source::RecipeSite;
use meal_planner::{ingest, IngestStatus, Settings, Store};

#[derive(Parser)]
#[command(name = "meal_planner", about = "Recipe scraper + nutrition lookup + meal planning")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the recipe site and list results
    Search { query: String },
    /// Search, then save picked results with nutrition data
    Save {
        query: String,
        /// 1-based result numbers, comma-separated (e.g. "1,3")
        #[arg(short, long, value_delimiter = ',', conflicts_with = "all")]
        pick: Vec<usize>,
        /// Save every result
        #[arg(short, long)]
        all: bool,
    },
    /// Save one recipe by link
    Add {
        link: String,
        #[arg(short, long)]
        title: String,
    },
    /// List stored recipes
    List,
    /// Stored recipes at or under a calorie limit
    Calories {
        #[arg(default_value = "500")]
        max: i64,
    },
    /// Rank stored recipes by desired ingredients (comma-separated)
    Match { ingredients: String },
    /// Show stored nutrition data for a recipe's ingredients
    Nutrition { recipe_id: i64 },
    /// Delete a stored recipe and its ingredients
    Delete { recipe_id: i64 },
    /// Restaurants near you
    Restaurants {
        /// Search radius in meters
        #[arg(short, long, default_value_t = DEFAULT_RADIUS_M)]
        radius: u32,
        /// Skip geolocation and search around these coordinates
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
    },
    /// Show database statistics
    Stats,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load settings")?;

    let result = run(cli.command, &settings);

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn run(command: Commands, settings: &Settings) -> Result<()> {
    match command {
        Commands::Search { query } => {
            let site = RecipeSite::new(http_client(settings)?);
            let cards = site.search(&query)?;
            if cards.is_empty() {
                println!("No recipes found for '{}'. Try another search term.", query);
                return Ok(());
            }
            for (i, c) in cards.iter().enumerate() {
                println!("{:>3}. {}\n     {}", i + 1, c.title, c.link);
            }
            Ok(())
        }
        Commands::Save { query, pick, all } => {
            let client = http_client(settings)?;
            let site = RecipeSite::new(client.clone());
            let cards = site.search(&query)?;
            if cards.is_empty() {
                println!("No recipes found for '{}'. Try another search term.", query);
                return Ok(());
            }
            let chosen = select_cards(&cards, &pick, all)?;
            let store = open_store(settings)?;
            let mut nutrition = CachedLookup::new(UsdaClient::new(client, usda_key(settings)?));

            let pb = ProgressBar::new(chosen.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            let mut created = 0usize;
            let mut existing = 0usize;
            let mut failed = 0usize;
            for card in chosen {
                pb.set_message(truncate(&card.title, 32));
                match ingest(&store, &site, &mut nutrition, card) {
                    Ok(IngestStatus::Created { recipe_id }) => {
                        created += 1;
                        pb.println(format!("Stored #{}: {}", recipe_id, card.title));
                    }
                    Ok(IngestStatus::AlreadyStored { .. }) => {
                        existing += 1;
                        pb.println(format!("Already stored previously: {}", card.title));
                    }
                    Err(e) => {
                        failed += 1;
                        pb.println(format!("Failed: {} ({})", card.title, e));
                    }
                }
                pb.inc(1);
            }
            pb.finish_and_clear();
            println!(
                "Done: {} stored, {} already stored, {} failed.",
                created, existing, failed
            );
            Ok(())
        }
        Commands::Add { link, title } => {
            let client = http_client(settings)?;
            let store = open_store(settings)?;
            let site = RecipeSite::new(client.clone());
            let mut nutrition = UsdaClient::new(client, usda_key(settings)?);
            let card = RecipeCard { title, link };
            match ingest(&store, &site, &mut nutrition, &card)? {
                IngestStatus::Created { recipe_id } => {
                    println!("Stored recipe #{}: {}", recipe_id, card.title)
                }
                IngestStatus::AlreadyStored { .. } => println!("Recipe already stored previously!"),
            }
            Ok(())
        }
        Commands::List => {
            let store = open_store(settings)?;
            let rows = query::list_all(&store)?;
            if rows.is_empty() {
                println!("No recipes stored yet!");
                return Ok(());
            }
            print_recipes(&rows);
            Ok(())
        }
        Commands::Calories { max } => {
            let store = open_store(settings)?;
            let rows = query::filter_by_max_calorie(&store, max)?;
            if rows.is_empty() {
                println!("No recipes found under {} calories.", max);
                return Ok(());
            }
            print_recipes(&rows);
            Ok(())
        }
        Commands::Match { ingredients } => {
            let store = open_store(settings)?;
            let terms = query::parse_terms(&ingredients);
            let ranked = query::rank_by_ingredients(&store, &terms)?;
            if ranked.is_empty() {
                println!("No recipes found matching the desired ingredients.");
                return Ok(());
            }
            println!(
                "{:>4} | {:<36} | {:>5} | {:>7} | {}",
                "ID", "Title", "Match", "Calorie", "Matched"
            );
            println!("{}", "-".repeat(80));
            for m in &ranked {
                println!(
                    "{:>4} | {:<36} | {:>4.0}% | {:>7} | {}",
                    m.recipe.recipe_id,
                    truncate(&m.recipe.title, 36),
                    m.match_rate * 100.0,
                    calorie_text(m.recipe.calorie),
                    m.matched_terms.join(", ")
                );
            }
            Ok(())
        }
        Commands::Nutrition { recipe_id } => {
            let store = open_store(settings)?;
            let Some(recipe) = store.recipe(recipe_id)? else {
                bail!("No recipe with id {}", recipe_id);
            };
            println!("{} ({})\n", recipe.title, recipe.link);
            let ingredients = store.ingredients_for(recipe_id)?;
            if ingredients.is_empty() {
                println!("No ingredients found for this recipe.");
                return Ok(());
            }
            for ing in &ingredients {
                println!("Ingredient: {}", ing.ingredient);
                match &ing.nutrition.food {
                    None => println!("  No nutrition data available."),
                    Some(food) => {
                        let significant = significant_nutrients(food);
                        if significant.is_empty() {
                            println!("  No significant nutrients found.");
                        }
                        for n in significant {
                            println!("  {}: {} {}", n.name, n.value, n.unit);
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Delete { recipe_id } => {
            let store = open_store(settings)?;
            if query::delete(&store, recipe_id)? {
                println!("Recipe deleted");
            } else {
                println!("No recipe with id {} (nothing to delete)", recipe_id);
            }
            Ok(())
        }
        Commands::Restaurants { radius, lat, lng } => {
            let Some(key) = settings.google_api_key.clone() else {
                bail!("Google API key missing: set MEALPLAN_GOOGLE_API_KEY or GOOGLE_API_KEY");
            };
            let places = PlacesClient::new(http_client(settings)?, key);
            let here = match (lat, lng) {
                (Some(lat), Some(lng)) => Location { lat, lng },
                _ => places.current_location()?,
            };
            let found = places.nearby_restaurants(here, radius)?;
            if found.is_empty() {
                println!("No restaurants found within {} m.", radius);
                return Ok(());
            }
            for r in &found {
                let rating = r
                    .rating
                    .map(|x| format!("{:.1} ({})", x, r.ratings_total.unwrap_or(0)))
                    .unwrap_or_else(|| "-".into());
                let open = match r.open_now {
                    Some(true) => "open",
                    Some(false) => "closed",
                    None => "",
                };
                println!(
                    "{:<32} | {:<10} | {:<6} | {}",
                    truncate(&r.name, 32),
                    rating,
                    open,
                    r.vicinity.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        Commands::Stats => {
            let store = open_store(settings)?;
            let s = store.stats()?;
            println!("Database:          {}", settings.db_path.display());
            println!("Recipes:           {}", s.recipes);
            println!("  with calories:   {}", s.with_calorie);
            println!("Ingredients:       {}", s.ingredients);
            println!("  without data:    {}", s.without_nutrition);
            Ok(())
        }
    }
}

fn http_client(settings: &Settings) -> Result<HttpClient> {
    HttpClient::new(&settings.user_agent, settings.http_timeout())
        .context("Failed to build HTTP client")
}

fn open_store(settings: &Settings) -> Result<Store> {
    Store::open(&settings.db_path)
        .with_context(|| format!("Failed to open {}", settings.db_path.display()))
}

fn usda_key(settings: &Settings) -> Result<String> {
    match &settings.usda_api_key {
        Some(k) => Ok(k.clone()),
        None => bail!("USDA API key missing: set MEALPLAN_USDA_API_KEY or USDA_API_KEY"),
    }
}

fn select_cards<'a>(cards: &'a [RecipeCard], pick: &[usize], all: bool) -> Result<Vec<&'a RecipeCard>> {
    if all {
        return Ok(cards.iter().collect());
    }
    if pick.is_empty() {
        bail!("Choose results with --pick 1,2,... or --all (run 'search' to see numbers)");
    }
    pick.iter()
        .map(|&n| {
            n.checked_sub(1)
                .and_then(|i| cards.get(i))
                .with_context(|| format!("No result #{} ({} results)", n, cards.len()))
        })
        .collect()
}

fn print_recipes(rows: &[RecipeRow]) {
    println!("{:>4} | {:<40} | {:>7} | {}", "ID", "Title", "Calorie", "Link");
    println!("{}", "-".repeat(100));
    for r in rows {
        println!(
            "{:>4} | {:<40} | {:>7} | {}",
            r.recipe_id,
            truncate(&r.title, 40),
            calorie_text(r.calorie),
            r.link
        );
    }
    println!("\n{} recipes", rows.len());
}

fn calorie_text(calorie: Option<i64>) -> String {
    calorie.map(|c| c.to_string()).unwrap_or_else(|| "-".into())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
