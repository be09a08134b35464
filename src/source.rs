use tracing::info;

use crate::error::FetchError;
use crate::http::Fetcher;
use crate::parser::cards::parse_cards;
use crate::parser::detail::parse_detail;
use crate::parser::{RecipeCard, ScrapedRecipe};

pub const SEARCH_URL: &str = "https://www.allrecipes.com/search";

/// The public recipe site: search listings and recipe detail pages.
pub struct RecipeSite<F> {
    fetcher: F,
}

impl<F: Fetcher> RecipeSite<F> {
    pub fn new(fetcher: F) -> Self {
        RecipeSite { fetcher }
    }

    /// Cards for a free-text query, in page order. No matches is an empty list.
    pub fn search(&self, query: &str) -> Result<Vec<RecipeCard>, FetchError> {
        let html = self.fetcher.get(SEARCH_URL, &[("q", query)])?;
        let cards = parse_cards(&html);
        info!(query, found = cards.len(), "Searched recipes");
        Ok(cards)
    }

    /// Fetch the card's detail page and extract ingredients + calories.
    pub fn fetch_recipe(&self, card: &RecipeCard) -> Result<ScrapedRecipe, FetchError> {
        let html = self.fetcher.get(&card.link, &[])?;
        let recipe = parse_detail(card, &html);
        info!(
            link = %card.link,
            ingredients = recipe.ingredients.len(),
            calorie = ?recipe.calorie,
            "Extracted recipe"
        );
        Ok(recipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::StubFetcher;

    const PANCAKES: &str = "https://www.allrecipes.com/recipe/21014/good-old-fashioned-pancakes/";

    #[test]
    fn search_sends_query() {
        let stub = StubFetcher::new().fixture(&format!("{}?q=pancakes", SEARCH_URL), "search.html");
        let site = RecipeSite::new(&stub);
        let cards = site.search("pancakes").unwrap();
        assert_eq!(cards.len(), 3);
        assert_eq!(stub.calls.borrow()[0], format!("{}?q=pancakes", SEARCH_URL));
    }

    #[test]
    fn search_without_cards_is_empty_not_error() {
        let stub = StubFetcher::new().fixture(SEARCH_URL, "search_empty.html");
        let cards = RecipeSite::new(&stub).search("zzzz").unwrap();
        assert!(cards.is_empty());
    }

    #[test]
    fn search_404_is_not_found() {
        let stub = StubFetcher::new().status(SEARCH_URL, 404);
        let err = RecipeSite::new(&stub).search("x").unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[test]
    fn search_503_is_unavailable() {
        let stub = StubFetcher::new().status(SEARCH_URL, 503);
        let err = RecipeSite::new(&stub).search("x").unwrap_err();
        assert!(matches!(err, FetchError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn detail_failure_propagates() {
        let stub = StubFetcher::new().status(PANCAKES, 500);
        let card = RecipeCard {
            title: "Fluffy Pancakes".into(),
            link: PANCAKES.into(),
        };
        let err = RecipeSite::new(&stub).fetch_recipe(&card).unwrap_err();
        assert!(matches!(err, FetchError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn detail_fetches_card_link() {
        let stub = StubFetcher::new().fixture(PANCAKES, "recipe_pancakes.html");
        let card = RecipeCard {
            title: "Fluffy Pancakes".into(),
            link: PANCAKES.into(),
        };
        let recipe = RecipeSite::new(&stub).fetch_recipe(&card).unwrap();
        assert_eq!(recipe.link, PANCAKES);
        assert_eq!(recipe.ingredients.len(), 7);
        assert_eq!(recipe.calorie, Some(158));
    }
}
