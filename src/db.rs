use std::path::Path;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::error::StoreError;
use crate::nutrition::NutritionData;

pub type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS recipes (
        recipe_id  INTEGER PRIMARY KEY AUTOINCREMENT,
        title      TEXT NOT NULL,
        link       TEXT NOT NULL UNIQUE,
        calorie    INTEGER,
        saved_at   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_recipes_calorie ON recipes(calorie);

    CREATE TABLE IF NOT EXISTS ingredients (
        ingredient_id  INTEGER PRIMARY KEY AUTOINCREMENT,
        recipe_id      INTEGER NOT NULL REFERENCES recipes(recipe_id) ON DELETE CASCADE,
        position       INTEGER NOT NULL,
        ingredient     TEXT NOT NULL,
        nutrition_data TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_ingredients_recipe ON ingredients(recipe_id);
";

/// Handle on the recipe database. Every write runs in its own transaction,
/// rolled back on drop unless committed.
pub struct Store {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRow {
    pub recipe_id: i64,
    pub title: String,
    pub link: String,
    pub calorie: Option<i64>,
    pub saved_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientRow {
    pub ingredient_id: i64,
    pub recipe_id: i64,
    pub position: i64,
    pub ingredient: String,
    pub nutrition: NutritionData,
}

pub struct NewRecipe {
    pub title: String,
    pub link: String,
    pub calorie: Option<i64>,
    pub saved_at: String,
    pub ingredients: Vec<(String, NutritionData)>,
}

pub enum InsertOutcome {
    Inserted(i64),
    DuplicateLink,
}

pub struct Stats {
    pub recipes: usize,
    pub ingredients: usize,
    pub with_calorie: usize,
    pub without_nutrition: usize,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    pub fn recipe_by_link(&self, link: &str) -> Result<Option<RecipeRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT recipe_id, title, link, calorie, saved_at FROM recipes WHERE link = ?1",
                params![link],
                recipe_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn recipe(&self, recipe_id: i64) -> Result<Option<RecipeRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT recipe_id, title, link, calorie, saved_at FROM recipes WHERE recipe_id = ?1",
                params![recipe_id],
                recipe_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert a recipe and all its ingredients as one unit.
    pub fn insert_recipe(&self, recipe: &NewRecipe) -> Result<InsertOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO recipes (title, link, calorie, saved_at) VALUES (?1, ?2, ?3, ?4)",
            params![recipe.title, recipe.link, recipe.calorie, recipe.saved_at],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Ok(InsertOutcome::DuplicateLink);
            }
            Err(e) => return Err(e.into()),
        }
        let recipe_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ingredients (recipe_id, position, ingredient, nutrition_data)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, (name, nutrition)) in recipe.ingredients.iter().enumerate() {
                let blob = nutrition.to_blob().map_err(|source| StoreError::Blob {
                    what: format!("ingredient '{}'", name),
                    source,
                })?;
                stmt.execute(params![recipe_id, position as i64, name, blob])?;
            }
        }
        tx.commit()?;
        Ok(InsertOutcome::Inserted(recipe_id))
    }

    pub fn all_recipes(&self) -> Result<Vec<RecipeRow>> {
        self.query_recipes(
            "SELECT recipe_id, title, link, calorie, saved_at FROM recipes ORDER BY recipe_id",
            &[],
        )
    }

    /// Recipes with a known calorie count `<= limit`, lowest first.
    pub fn recipes_up_to_calories(&self, limit: i64) -> Result<Vec<RecipeRow>> {
        self.query_recipes(
            "SELECT recipe_id, title, link, calorie, saved_at FROM recipes
             WHERE calorie IS NOT NULL AND calorie <= ?1
             ORDER BY calorie, recipe_id",
            params![limit],
        )
    }

    pub fn recipes_by_ids(&self, ids: &[i64]) -> Result<Vec<RecipeRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT recipe_id, title, link, calorie, saved_at FROM recipes
             WHERE recipe_id IN ({}) ORDER BY recipe_id",
            placeholders.join(", ")
        );
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        self.query_recipes(&sql, &params)
    }

    fn query_recipes(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<RecipeRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, recipe_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `(recipe_id, ingredient)` pairs whose name may contain a term, like `LIKE '%term%'`.
    ///
    /// SQLite folds case for ASCII only, so a non-ASCII term disables the
    /// prefilter and every row is returned for the caller to match.
    pub fn ingredients_matching(&self, terms: &[String]) -> Result<Vec<(i64, String)>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let prefilter = terms.iter().all(|t| t.is_ascii());
        let condition = if prefilter {
            (1..=terms.len())
                .map(|i| format!("ingredient LIKE ?{} ESCAPE '\\'", i))
                .collect::<Vec<_>>()
                .join(" OR ")
        } else {
            "1".to_string()
        };
        let sql = format!(
            "SELECT recipe_id, ingredient FROM ingredients WHERE {} ORDER BY recipe_id, position",
            condition
        );
        let patterns: Vec<String> = if prefilter {
            terms
                .iter()
                .map(|t| format!("%{}%", escape_like(t)))
                .collect()
        } else {
            Vec::new()
        };
        let params: Vec<&dyn rusqlite::ToSql> =
            patterns.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn ingredients_for(&self, recipe_id: i64) -> Result<Vec<IngredientRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT ingredient_id, recipe_id, position, ingredient, nutrition_data
             FROM ingredients WHERE recipe_id = ?1 ORDER BY position",
        )?;
        let raw = stmt
            .query_map(params![recipe_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(ingredient_id, recipe_id, position, ingredient, blob)| -> Result<IngredientRow> {
                let nutrition = NutritionData::from_blob(&blob)
                    .map_err(|source| StoreError::Blob {
                        what: format!("ingredient {}", ingredient_id),
                        source,
                    })?;
                Ok(IngredientRow {
                    ingredient_id,
                    recipe_id,
                    position,
                    ingredient,
                    nutrition,
                })
            })
            .collect()
    }

    /// Delete a recipe and, by cascade, its ingredients. Returns whether a row existed.
    pub fn delete_recipe(&self, recipe_id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let n = tx.execute("DELETE FROM recipes WHERE recipe_id = ?1", params![recipe_id])?;
        tx.commit()?;
        Ok(n > 0)
    }

    pub fn stats(&self) -> Result<Stats> {
        let count = |sql: &str| -> Result<usize> {
            Ok(self.conn.query_row(sql, [], |r| r.get(0))?)
        };
        Ok(Stats {
            recipes: count("SELECT COUNT(*) FROM recipes")?,
            ingredients: count("SELECT COUNT(*) FROM ingredients")?,
            with_calorie: count("SELECT COUNT(*) FROM recipes WHERE calorie IS NOT NULL")?,
            without_nutrition: count(
                "SELECT COUNT(*) FROM ingredients WHERE json_extract(nutrition_data, '$.food') IS NULL",
            )?,
        })
    }
}

fn recipe_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecipeRow> {
    Ok(RecipeRow {
        recipe_id: row.get(0)?,
        title: row.get(1)?,
        link: row.get(2)?,
        calorie: row.get(3)?,
        saved_at: row.get(4)?,
    })
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
