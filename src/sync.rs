//! Recipe synchronizer: remote fetch, local ingest and edit, and result
//! publishing.
//!
//! All store access goes through the injected pool and runs on the caller's
//! task. Nothing here deduplicates in-flight work: two overlapping
//! [`RecipeSynchronizer::fetch_by_category`] calls against an empty store will
//! both hit the remote source.

use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::catalog::capitalize_words;
use crate::db::{self, NewRecipe, Pool, RecipeUpdate};
use crate::model::{PersistedRecipe, RecipeRecord};
use crate::observer::{Latest, Subscription};
use crate::spoonacular::{ApiError, RecipeSource};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote fetch failed: {0}")]
    Remote(#[from] ApiError),
}

pub struct RecipeSynchronizer {
    pool: Pool,
    source: Box<dyn RecipeSource>,
    snapshot: RwLock<Vec<PersistedRecipe>>,
    results: Latest<Vec<PersistedRecipe>>,
}

impl RecipeSynchronizer {
    pub fn new(pool: Pool, source: Box<dyn RecipeSource>) -> Self {
        Self {
            pool,
            source,
            snapshot: RwLock::new(Vec::new()),
            results: Latest::new(),
        }
    }

    /// Last store query, as refreshed by [`reload`](Self::reload).
    pub fn results(&self) -> Vec<PersistedRecipe> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Populate an empty store from the remote source, then publish the whole
    /// store. The publish happens even when the remote call fails; the error
    /// is returned afterwards.
    #[instrument(skip_all, fields(category = %category, limit = limit))]
    pub async fn fetch_by_category(&self, category: &str, limit: u32) -> Result<(), SyncError> {
        let mut outcome = Ok(());
        match db::count_recipes(&self.pool).await {
            Ok(0) => match self.source.fetch_recipes(limit, Some(category)).await {
                Ok(records) => {
                    info!(count = records.len(), "fetched remote recipes");
                    for record in &records {
                        self.ingest(Some(record)).await;
                    }
                }
                Err(err) => {
                    warn!(?err, "remote recipe fetch failed");
                    outcome = Err(SyncError::Remote(err));
                }
            },
            Ok(count) => debug!(count, "store not empty; skipping remote fetch"),
            Err(err) => warn!(?err, "cannot count stored recipes; skipping remote fetch"),
        }

        self.reload().await;
        self.publish(self.results());
        outcome
    }

    /// Map a remote record into the store. Tags are joined with `", "`,
    /// steps of every instruction group are flattened and numbered from 1.
    /// Returns false for a missing record or a failed write.
    #[instrument(skip_all)]
    pub async fn ingest(&self, record: Option<&RecipeRecord>) -> bool {
        let Some(record) = record else {
            return false;
        };
        let recipe = NewRecipe {
            title: record.title.clone().unwrap_or_default(),
            category: record.joined_category(),
            time_minutes: record.ready_in_minutes.unwrap_or(0),
            image_data: None,
            image_url: record.image.clone(),
            source_url: record.source_url.clone(),
            servings: record.servings,
            ingredients: record.ingredient_texts(),
            instructions: record.instruction_steps(),
        };
        let written = match db::insert_recipe(&self.pool, &recipe).await {
            Ok(id) => {
                debug!(id, title = %recipe.title, "ingested recipe");
                true
            }
            Err(err) => {
                warn!(?err, title = %recipe.title, "failed to ingest recipe");
                false
            }
        };
        self.reload().await;
        written
    }

    /// Store a manually entered recipe with its image bytes. Each instruction
    /// group becomes one numbered instruction.
    #[instrument(skip_all)]
    pub async fn save_new(&self, record: Option<&RecipeRecord>, image_data: Vec<u8>) -> bool {
        let Some(record) = record else {
            return false;
        };
        let recipe = NewRecipe {
            title: record.title.clone().unwrap_or_default(),
            category: record.joined_category(),
            time_minutes: record.ready_in_minutes.unwrap_or(0),
            image_data: Some(image_data),
            image_url: None,
            source_url: record.source_url.clone(),
            servings: record.servings,
            ingredients: record.ingredient_texts(),
            instructions: record.instruction_paragraphs(),
        };
        match db::insert_recipe(&self.pool, &recipe).await {
            Ok(id) => {
                info!(id, title = %recipe.title, "saved new recipe");
                true
            }
            Err(err) => {
                warn!(?err, title = %recipe.title, "failed to save recipe");
                false
            }
        }
    }

    /// Overwrite the recipe titled `recipe.title` with `updated`. Every
    /// existing ingredient and instruction is dropped and rebuilt; the
    /// category keeps only the first tag. When several recipes share the
    /// title, the oldest one is edited.
    #[instrument(skip_all, fields(title = %recipe.title))]
    pub async fn replace_content(
        &self,
        recipe: &PersistedRecipe,
        updated: &RecipeRecord,
        image_data: Option<Vec<u8>>,
    ) -> bool {
        let ids = match db::find_recipe_ids_by_title(&self.pool, &recipe.title).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(?err, "failed to look up recipe");
                return false;
            }
        };
        let Some(&id) = ids.first() else {
            warn!("no recipe with this title");
            return false;
        };
        if ids.len() > 1 {
            warn!(matches = ids.len(), id, "duplicate titles; editing the first");
        }

        let update = RecipeUpdate {
            title: updated.title.clone().unwrap_or_default(),
            category: updated.first_category(),
            time_minutes: updated.ready_in_minutes.unwrap_or(0),
            image_data,
            ingredients: updated.ingredient_texts(),
            instructions: updated.instruction_paragraphs(),
        };
        match db::replace_recipe_content(&self.pool, id, &update).await {
            Ok(()) => {
                info!(id, "replaced recipe content");
                true
            }
            Err(err) => {
                warn!(?err, id, "failed to replace recipe content");
                false
            }
        }
    }

    /// Reload the store and publish the recipes in `category`, compared
    /// after title-casing both sides.
    #[instrument(skip_all, fields(category = %category))]
    pub async fn filter_query(&self, category: &str) {
        let all = match db::fetch_all_recipes(&self.pool).await {
            Ok(all) => all,
            Err(err) => {
                warn!(?err, "couldn't fetch recipes");
                return;
            }
        };
        let wanted = capitalize_words(category);
        let filtered: Vec<PersistedRecipe> = all
            .iter()
            .filter(|r| capitalize_words(&r.category) == wanted)
            .cloned()
            .collect();
        self.replace_snapshot(all);
        self.publish(filtered);
    }

    /// Re-query the whole store into the snapshot. Failures keep the old one.
    pub async fn reload(&self) {
        match db::fetch_all_recipes(&self.pool).await {
            Ok(all) => self.replace_snapshot(all),
            Err(err) => warn!(?err, "couldn't fetch recipes"),
        }
    }

    fn replace_snapshot(&self, all: Vec<PersistedRecipe>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = all;
    }

    pub fn publish(&self, results: Vec<PersistedRecipe>) {
        self.results.publish(results);
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Vec<PersistedRecipe>) + Send + Sync + 'static,
    {
        self.results.subscribe(callback)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.results.unsubscribe(subscription)
    }

    /// Last published value, if any.
    pub fn published(&self) -> Option<Vec<PersistedRecipe>> {
        self.results.value()
    }
}
