use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{element_text, raw_text, RecipeCard, ScrapedRecipe};

static INGREDIENT_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li.mm-recipes-structured-ingredients__list-item").unwrap()
});
static NAME_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span[data-ingredient-name]").unwrap());
static CALORIE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("td.mm-recipes-nutrition-facts-summary__table-cell.text-body-100-prominent")
        .unwrap()
});
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").unwrap());

/// Extract ingredient names and the calorie cell from a recipe page.
pub fn parse_detail(card: &RecipeCard, html: &str) -> ScrapedRecipe {
    let doc = Html::parse_document(html);

    // names are stored as scraped; quantity/unit spans are ignored
    let ingredients = doc
        .select(&INGREDIENT_SEL)
        .filter_map(|li| li.select(&NAME_SEL).next().map(raw_text))
        .filter(|name| !name.is_empty())
        .collect();

    let calorie = doc
        .select(&CALORIE_SEL)
        .next()
        .and_then(|cell| parse_calorie(&element_text(cell)));

    ScrapedRecipe {
        title: card.title.clone(),
        link: card.link.clone(),
        calorie,
        ingredients,
    }
}

/// First run of digits, thousands separators allowed. `None` when there are no digits.
pub fn parse_calorie(text: &str) -> Option<i64> {
    let m = NUMBER_RE.find(text)?;
    m.as_str().replace(',', "").parse().ok()
}
