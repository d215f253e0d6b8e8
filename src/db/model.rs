//! Write payloads used by repositories.
//!
//! Mapping from remote records happens in the synchronizer; these structs only
//! carry what ends up in the tables.

/// A recipe row plus its children, inserted in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRecipe {
    pub title: String,
    pub category: String,
    pub time_minutes: i64,
    pub image_data: Option<Vec<u8>>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub servings: Option<i64>,
    /// Stored in order; position is the index.
    pub ingredients: Vec<String>,
    /// Stored as steps `1..=len` in order.
    pub instructions: Vec<String>,
}

/// Fields overwritten by a content replacement. Children are replaced
/// wholesale; `image_data` is only written when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeUpdate {
    pub title: String,
    pub category: String,
    pub time_minutes: i64,
    pub image_data: Option<Vec<u8>>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
}
