use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::{element_text, RecipeCard};

static CARD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.comp.mntl-card-list-card--extendable").unwrap());
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".card__title-text").unwrap());

/// Parse a search-results page into cards, in document order.
///
/// Cards without a title element or an href are skipped; a page with no
/// matching cards yields an empty list.
pub fn parse_cards(html: &str) -> Vec<RecipeCard> {
    let doc = Html::parse_document(html);
    doc.select(&CARD_SEL)
        .filter_map(|card| {
            let title = card.select(&TITLE_SEL).next().map(element_text)?;
            let link = card.value().attr("href")?.trim();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some(RecipeCard {
                title,
                link: link.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    #[test]
    fn search_page_cards_in_order() {
        let cards = parse_cards(&fixture("search.html"));
        let titles: Vec<&str> = cards.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Fluffy Pancakes", "Vegetarian Chili", "Fluffy Pancakes"]
        );
        assert_eq!(
            cards[0].link,
            "https://www.allrecipes.com/recipe/21014/good-old-fashioned-pancakes/"
        );
        // duplicates survive until storage
        assert_eq!(cards[0], cards[2]);
    }

    #[test]
    fn card_without_title_skipped() {
        let cards = parse_cards(&fixture("search.html"));
        assert!(cards.iter().all(|c| !c.link.contains("no-title")));
    }

    #[test]
    fn non_card_anchors_ignored() {
        let cards = parse_cards(&fixture("search.html"));
        assert!(cards.iter().all(|c| !c.link.contains("/gallery/")));
    }

    #[test]
    fn empty_page() {
        assert!(parse_cards(&fixture("search_empty.html")).is_empty());
        assert!(parse_cards("").is_empty());
    }
}
