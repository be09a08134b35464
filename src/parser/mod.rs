pub mod cards;
pub mod detail;

use scraper::ElementRef;

/// One search-result card: what the user picks from before saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeCard {
    pub title: String,
    pub link: String,
}

/// A card augmented with what its detail page yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedRecipe {
    pub title: String,
    pub link: String,
    pub calorie: Option<i64>,
    pub ingredients: Vec<String>,
}

/// Text content of an element with only the ends trimmed.
fn raw_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Whitespace-collapsed text content of an element.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
