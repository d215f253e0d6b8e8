use super::model::{NewRecipe, RecipeUpdate};
use crate::model::{Ingredient, Instruction, PersistedRecipe};
use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Transaction};
use sqlx::{Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // sqlx only creates missing files when asked to.
    let mut rebuilt = format!("sqlite://{}", expanded_path);
    match query_part {
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn count_recipes(pool: &Pool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Insert a recipe and its children atomically. Returns the new row id.
#[instrument(skip_all, fields(title = %recipe.title))]
pub async fn insert_recipe(pool: &Pool, recipe: &NewRecipe) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let id: i64 = sqlx::query(
        "INSERT INTO recipes (title, category, time_minutes, image_data, image_url, source_url, servings, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&recipe.title)
    .bind(&recipe.category)
    .bind(recipe.time_minutes)
    .bind(recipe.image_data.as_deref())
    .bind(recipe.image_url.as_deref())
    .bind(recipe.source_url.as_deref())
    .bind(recipe.servings)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?
    .get("id");

    insert_children_tx(&mut tx, id, &recipe.ingredients, &recipe.instructions).await?;
    tx.commit().await?;
    Ok(id)
}

async fn insert_children_tx(
    tx: &mut Transaction<'_, Sqlite>,
    recipe_id: i64,
    ingredients: &[String],
    instructions: &[String],
) -> Result<()> {
    for (position, text) in ingredients.iter().enumerate() {
        sqlx::query("INSERT INTO ingredients (recipe_id, position, description) VALUES (?, ?, ?)")
            .bind(recipe_id)
            .bind(position as i64)
            .bind(text)
            .execute(&mut **tx)
            .await?;
    }
    for (idx, text) in instructions.iter().enumerate() {
        sqlx::query("INSERT INTO instructions (recipe_id, step, description) VALUES (?, ?, ?)")
            .bind(recipe_id)
            .bind(idx as i64 + 1)
            .bind(text)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn delete_children_tx(tx: &mut Transaction<'_, Sqlite>, recipe_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM ingredients WHERE recipe_id = ?")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM instructions WHERE recipe_id = ?")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn recipe_from_row(row: &SqliteRow) -> Result<PersistedRecipe, sqlx::Error> {
    Ok(PersistedRecipe {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        time_minutes: row.try_get("time_minutes")?,
        image_data: row.try_get("image_data")?,
        image_url: row.try_get("image_url")?,
        source_url: row.try_get("source_url")?,
        servings: row.try_get("servings")?,
        ingredients: Vec::new(),
        instructions: Vec::new(),
        created_at: row.try_get("created_at")?,
    })
}

/// Every recipe in insertion order, ingredients by position and
/// instructions by step.
#[instrument(skip_all)]
pub async fn fetch_all_recipes(pool: &Pool) -> Result<Vec<PersistedRecipe>> {
    let rows = sqlx::query(
        "SELECT id, title, category, time_minutes, image_data, image_url, source_url, servings, created_at FROM recipes ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    let mut recipes = rows
        .iter()
        .map(recipe_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let index: HashMap<i64, usize> = recipes
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id, i))
        .collect();

    let ingredients: Vec<(i64, String)> = sqlx::query_as(
        "SELECT recipe_id, description FROM ingredients ORDER BY recipe_id, position, id",
    )
    .fetch_all(pool)
    .await?;
    for (recipe_id, description) in ingredients {
        if let Some(&i) = index.get(&recipe_id) {
            recipes[i].ingredients.push(Ingredient { description });
        }
    }

    let instructions: Vec<(i64, i64, String)> = sqlx::query_as(
        "SELECT recipe_id, step, description FROM instructions ORDER BY recipe_id, step, id",
    )
    .fetch_all(pool)
    .await?;
    for (recipe_id, step, description) in instructions {
        if let Some(&i) = index.get(&recipe_id) {
            recipes[i].instructions.push(Instruction { step, description });
        }
    }

    Ok(recipes)
}

/// Row ids of recipes titled exactly `title`, oldest first.
#[instrument(skip_all)]
pub async fn find_recipe_ids_by_title(pool: &Pool, title: &str) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM recipes WHERE title = ? ORDER BY id")
        .bind(title)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Drop every child of `recipe_id`, overwrite its fields and recreate the
/// children from `update`, all in one transaction.
#[instrument(skip_all, fields(recipe_id = recipe_id))]
pub async fn replace_recipe_content(pool: &Pool, recipe_id: i64, update: &RecipeUpdate) -> Result<()> {
    let mut tx = pool.begin().await?;
    delete_children_tx(&mut tx, recipe_id).await?;

    sqlx::query("UPDATE recipes SET title = ?, time_minutes = ?, category = ?, image_data = COALESCE(?, image_data) WHERE id = ?")
        .bind(&update.title)
        .bind(update.time_minutes)
        .bind(&update.category)
        .bind(update.image_data.as_deref())
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;

    insert_children_tx(&mut tx, recipe_id, &update.ingredients, &update.instructions).await?;
    tx.commit().await?;
    Ok(())
}

/// Delete a recipe and all of its children. Returns false if it did not exist.
#[instrument(skip_all, fields(recipe_id = recipe_id))]
pub async fn delete_recipe(pool: &Pool, recipe_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;
    delete_children_tx(&mut tx, recipe_id).await?;
    let res = sqlx::query("DELETE FROM recipes WHERE id = ?")
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(res.rows_affected() > 0)
}
