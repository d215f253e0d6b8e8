//! Local recipe store: entity payloads and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: write payloads accepted by the repositories.
//! - `repo`: SQL-only functions that map rows into `crate::model` entities.
//!
//! External modules should import from `recipe_sync::db`; the repository API
//! and the payloads are re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{NewRecipe, RecipeUpdate};
