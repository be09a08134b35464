use std::collections::{BTreeMap, HashSet};

use crate::db::{RecipeRow, Result, Store};

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeMatch {
    pub recipe: RecipeRow,
    /// Desired terms found in this recipe's ingredient names.
    pub matched_terms: Vec<String>,
    pub match_rate: f64,
}

/// Split a comma-separated ingredient box into trimmed, non-empty terms.
pub fn parse_terms(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn list_all(store: &Store) -> Result<Vec<RecipeRow>> {
    store.all_recipes()
}

/// Recipes with known calories `<= limit`, ascending. Unknown calories never qualify.
pub fn filter_by_max_calorie(store: &Store, limit: i64) -> Result<Vec<RecipeRow>> {
    store.recipes_up_to_calories(limit)
}

pub fn delete(store: &Store, recipe_id: i64) -> Result<bool> {
    store.delete_recipe(recipe_id)
}

/// Rank stored recipes against desired ingredient terms.
///
/// A term matches an ingredient when it is a case-insensitive substring of the
/// name. `match_rate` is the number of distinct terms matched divided by the
/// number of terms, so it stays within `[0, 1]` even when several ingredients
/// hit the same term. Highest rate first, ties by `recipe_id`.
pub fn rank_by_ingredients(store: &Store, desired: &[String]) -> Result<Vec<RecipeMatch>> {
    let terms: Vec<String> = dedup_terms(desired);
    if terms.is_empty() {
        return Ok(Vec::new());
    }
    let lowered: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();

    let mut hits: BTreeMap<i64, HashSet<usize>> = BTreeMap::new();
    for (recipe_id, ingredient) in store.ingredients_matching(&terms)? {
        let name = ingredient.to_lowercase();
        for (i, term) in lowered.iter().enumerate() {
            if name.contains(term.as_str()) {
                hits.entry(recipe_id).or_default().insert(i);
            }
        }
    }

    let ids: Vec<i64> = hits.keys().copied().collect();
    let mut results: Vec<RecipeMatch> = store
        .recipes_by_ids(&ids)?
        .into_iter()
        .filter_map(|recipe| {
            let matched = hits.get(&recipe.recipe_id)?;
            let mut idx: Vec<usize> = matched.iter().copied().collect();
            idx.sort_unstable();
            Some(RecipeMatch {
                match_rate: matched.len() as f64 / terms.len() as f64,
                matched_terms: idx.into_iter().map(|i| terms[i].clone()).collect(),
                recipe,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.match_rate
            .total_cmp(&a.match_rate)
            .then(a.recipe.recipe_id.cmp(&b.recipe.recipe_id))
    });
    Ok(results)
}

/// Trim, drop empties, and drop case-insensitive repeats (first spelling wins).
fn dedup_terms(desired: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    desired
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}
