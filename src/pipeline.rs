use chrono::Utc;
use tracing::{info, warn};

use crate::db::{InsertOutcome, NewRecipe, Store};
use crate::error::IngestError;
use crate::http::Fetcher;
use crate::nutrition::{NutritionData, NutritionLookup};
use crate::parser::RecipeCard;
use crate::source::RecipeSite;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Created { recipe_id: i64 },
    AlreadyStored { recipe_id: Option<i64> },
}

/// Ingest one recipe: extract, look up every ingredient, store all rows at once.
///
/// A link already in the store short-circuits before any network call. A
/// detail-page failure aborts this recipe with nothing stored. A failed
/// nutrition lookup degrades to the "no data" marker for that ingredient.
pub fn ingest<F, L>(
    store: &Store,
    site: &RecipeSite<F>,
    nutrition: &mut L,
    card: &RecipeCard,
) -> Result<IngestStatus, IngestError>
where
    F: Fetcher,
    L: NutritionLookup + ?Sized,
{
    if let Some(existing) = store.recipe_by_link(&card.link)? {
        info!(link = %card.link, recipe_id = existing.recipe_id, "Recipe already stored");
        return Ok(IngestStatus::AlreadyStored {
            recipe_id: Some(existing.recipe_id),
        });
    }

    let scraped = site.fetch_recipe(card)?;

    let ingredients = scraped
        .ingredients
        .into_iter()
        .map(|name| {
            let data = match nutrition.lookup(&name) {
                Ok(data) => data,
                Err(e) => {
                    warn!(ingredient = %name, error = %e, "Nutrition lookup failed, storing no data");
                    NutritionData::none()
                }
            };
            (name, data)
        })
        .collect();

    let new = NewRecipe {
        title: scraped.title,
        link: scraped.link,
        calorie: scraped.calorie,
        saved_at: Utc::now().to_rfc3339(),
        ingredients,
    };

    match store.insert_recipe(&new)? {
        InsertOutcome::Inserted(recipe_id) => {
            info!(
                link = %new.link,
                recipe_id,
                ingredients = new.ingredients.len(),
                "Stored recipe"
            );
            Ok(IngestStatus::Created { recipe_id })
        }
        // lost a race with another writer on the same link
        InsertOutcome::DuplicateLink => {
            let existing = store.recipe_by_link(&new.link)?;
            Ok(IngestStatus::AlreadyStored {
                recipe_id: existing.map(|r| r.recipe_id),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::http::testing::StubFetcher;
    use crate::nutrition::{CachedLookup, UsdaClient, USDA_SEARCH_URL};

    const PANCAKES: &str = "https://www.allrecipes.com/recipe/21014/good-old-fashioned-pancakes/";
    const CUSTARD: &str = "https://www.allrecipes.com/recipe/1/simple-custard/";

    fn card(link: &str) -> RecipeCard {
        RecipeCard {
            title: "Test Recipe".into(),
            link: link.into(),
        }
    }

    fn usda_json() -> String {
        std::fs::read_to_string("tests/fixtures/usda_egg.json").unwrap()
    }

    #[test]
    fn ingest_creates_recipe_and_ingredients() {
        let pages = StubFetcher::new().fixture(PANCAKES, "recipe_pancakes.html");
        let api = StubFetcher::new().route(USDA_SEARCH_URL, usda_json());
        let store = Store::open_in_memory().unwrap();
        let site = RecipeSite::new(&pages);
        let mut usda = UsdaClient::new(&api, "KEY");

        let status = ingest(&store, &site, &mut usda, &card(PANCAKES)).unwrap();
        let IngestStatus::Created { recipe_id } = status else {
            panic!("expected Created, got {:?}", status);
        };

        let row = store.recipe(recipe_id).unwrap().unwrap();
        assert_eq!(row.title, "Test Recipe");
        assert_eq!(row.calorie, Some(158));
        let ingredients = store.ingredients_for(recipe_id).unwrap();
        assert_eq!(ingredients.len(), 7);
        assert_eq!(ingredients[0].ingredient, "all-purpose flour");
        assert!(ingredients.iter().all(|i| i.nutrition.food.is_some()));
        assert_eq!(api.call_count(), 7);
    }

    #[test]
    fn second_ingest_is_already_stored() {
        let pages = StubFetcher::new().fixture(PANCAKES, "recipe_pancakes.html");
        let api = StubFetcher::new().route(USDA_SEARCH_URL, usda_json());
        let store = Store::open_in_memory().unwrap();
        let site = RecipeSite::new(&pages);
        let mut usda = UsdaClient::new(&api, "KEY");

        let first = ingest(&store, &site, &mut usda, &card(PANCAKES)).unwrap();
        let second = ingest(&store, &site, &mut usda, &card(PANCAKES)).unwrap();

        let IngestStatus::Created { recipe_id } = first else {
            panic!("expected Created");
        };
        assert_eq!(
            second,
            IngestStatus::AlreadyStored {
                recipe_id: Some(recipe_id)
            }
        );
        // no re-fetch, no re-lookup
        assert_eq!(pages.call_count(), 1);
        assert_eq!(api.call_count(), 7);
        let stats = store.stats().unwrap();
        assert_eq!(stats.recipes, 1);
        assert_eq!(stats.ingredients, 7);
    }

    #[test]
    fn detail_404_stores_nothing() {
        let pages = StubFetcher::new().status(PANCAKES, 404);
        let api = StubFetcher::new().route(USDA_SEARCH_URL, usda_json());
        let store = Store::open_in_memory().unwrap();
        let mut usda = UsdaClient::new(&api, "KEY");

        let err = ingest(&store, &RecipeSite::new(&pages), &mut usda, &card(PANCAKES)).unwrap_err();
        assert!(matches!(err, IngestError::Fetch(FetchError::NotFound { .. })));
        assert_eq!(store.stats().unwrap().recipes, 0);
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn failed_lookup_degrades_to_no_data() {
        let pages = StubFetcher::new().fixture(CUSTARD, "recipe_no_calories.html");
        let api = StubFetcher::new()
            .route(
                &format!("{}?query=egg&api_key=KEY&pageSize=1", USDA_SEARCH_URL),
                usda_json(),
            )
            .status(USDA_SEARCH_URL, 503);
        let store = Store::open_in_memory().unwrap();
        let mut usda = UsdaClient::new(&api, "KEY");

        let status = ingest(&store, &RecipeSite::new(&pages), &mut usda, &card(CUSTARD)).unwrap();
        let IngestStatus::Created { recipe_id } = status else {
            panic!("expected Created");
        };
        let rows = store.ingredients_for(recipe_id).unwrap();
        let found: Vec<(&str, bool)> = rows
            .iter()
            .map(|r| (r.ingredient.as_str(), r.nutrition.food.is_some()))
            .collect();
        assert_eq!(found, vec![("egg", true), ("egg yolk", false), ("flour", false)]);
        assert_eq!(store.recipe(recipe_id).unwrap().unwrap().calorie, None);
    }

    #[test]
    fn cached_lookup_shares_across_recipes() {
        let pages = StubFetcher::new()
            .fixture(PANCAKES, "recipe_pancakes.html")
            .fixture(CUSTARD, "recipe_no_calories.html");
        let api = StubFetcher::new().route(USDA_SEARCH_URL, usda_json());
        let store = Store::open_in_memory().unwrap();
        let site = RecipeSite::new(&pages);
        let mut usda = CachedLookup::new(UsdaClient::new(&api, "KEY"));

        ingest(&store, &site, &mut usda, &card(PANCAKES)).unwrap();
        ingest(&store, &site, &mut usda, &card(CUSTARD)).unwrap();
        // custard's "egg" is served from the cache
        assert_eq!(api.call_count(), 9);
        assert_eq!(store.stats().unwrap().ingredients, 10);
    }
}
