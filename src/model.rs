use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Recipe as returned by the remote API. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeRecord {
    pub title: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub dish_types: Vec<String>,
    pub image: Option<String>,
    pub ready_in_minutes: Option<i64>,
    #[serde(alias = "sourceURL")]
    pub source_url: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub extended_ingredients: Vec<ExtendedIngredient>,
    #[serde(deserialize_with = "null_as_empty")]
    pub analyzed_instructions: Vec<AnalyzedInstruction>,
    pub servings: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedIngredient {
    pub original_string: Option<String>,
}

/// One instruction group; `steps` carries the individual steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedInstruction {
    pub original_string: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Step {
    pub step: Option<String>,
}

/// Lists sent as `null` decode the same as missing ones.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response envelope of the random-recipes endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeResponse {
    pub recipes: Option<Vec<RecipeRecord>>,
}

/// Hit from the autocomplete endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutocompleteHit {
    pub id: i64,
    pub title: String,
}

impl RecipeRecord {
    /// Ingredient texts in source order.
    pub fn ingredient_texts(&self) -> Vec<String> {
        self.extended_ingredients
            .iter()
            .map(|i| i.original_string.clone().unwrap_or_default())
            .collect()
    }

    /// Every step of every group, flattened in encountered order.
    pub fn instruction_steps(&self) -> Vec<String> {
        self.analyzed_instructions
            .iter()
            .flat_map(|group| group.steps.iter())
            .map(|s| s.step.clone().unwrap_or_default())
            .collect()
    }

    /// One text per instruction group, as entered through the edit form.
    pub fn instruction_paragraphs(&self) -> Vec<String> {
        self.analyzed_instructions
            .iter()
            .map(|group| match &group.original_string {
                Some(text) => text.clone(),
                None => group
                    .steps
                    .iter()
                    .filter_map(|s| s.step.as_deref())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect()
    }

    /// Tags joined with `", "`, used by the ingest path.
    pub fn joined_category(&self) -> String {
        self.dish_types.join(", ")
    }

    /// First tag only, used by the edit path.
    pub fn first_category(&self) -> String {
        self.dish_types.first().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingredient {
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instruction {
    pub step: i64,
    pub description: String,
}

/// Recipe as held in the local store, children attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedRecipe {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub time_minutes: i64,
    pub image_data: Option<Vec<u8>>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub servings: Option<i64>,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<Instruction>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeType {
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_spoonacular_payload() {
        let payload = json!({
            "recipes": [{
                "title": "Pancakes",
                "dishTypes": ["breakfast", "brunch"],
                "image": "https://img/p.jpg",
                "readyInMinutes": 25,
                "sourceUrl": "https://example.com/p",
                "servings": 4,
                "extendedIngredients": [
                    {"originalString": "2 eggs", "id": 1},
                    {"originalString": "1 cup flour"}
                ],
                "analyzedInstructions": [
                    {"name": "", "steps": [{"number": 1, "step": "Mix"}, {"number": 2, "step": "Fry"}]}
                ]
            }]
        });
        let resp: RecipeResponse = serde_json::from_value(payload).unwrap();
        let recipes = resp.recipes.unwrap();
        let r = &recipes[0];
        assert_eq!(r.title.as_deref(), Some("Pancakes"));
        assert_eq!(r.ready_in_minutes, Some(25));
        assert_eq!(r.source_url.as_deref(), Some("https://example.com/p"));
        assert_eq!(r.ingredient_texts(), vec!["2 eggs", "1 cup flour"]);
        assert_eq!(r.instruction_steps(), vec!["Mix", "Fry"]);
        assert_eq!(r.joined_category(), "breakfast, brunch");
        assert_eq!(r.first_category(), "breakfast");
    }

    #[test]
    fn missing_fields_are_empty() {
        let r: RecipeRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(r, RecipeRecord::default());
        assert!(r.instruction_steps().is_empty());
        assert_eq!(r.joined_category(), "");
        assert_eq!(r.first_category(), "");

        let resp: RecipeResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.recipes.is_none());
    }

    #[test]
    fn null_lists_are_empty() {
        let r: RecipeRecord = serde_json::from_value(json!({
            "title": "Soup",
            "dishTypes": null,
            "extendedIngredients": null,
            "analyzedInstructions": [{"originalString": "Stir", "steps": null}]
        }))
        .unwrap();
        assert_eq!(r.title.as_deref(), Some("Soup"));
        assert!(r.dish_types.is_empty());
        assert!(r.extended_ingredients.is_empty());
        assert_eq!(r.instruction_paragraphs(), vec!["Stir"]);
    }

    #[test]
    fn accepts_legacy_source_url_key() {
        let r: RecipeRecord =
            serde_json::from_value(json!({"sourceURL": "https://a/b"})).unwrap();
        assert_eq!(r.source_url.as_deref(), Some("https://a/b"));
    }

    #[test]
    fn paragraphs_prefer_original_string() {
        let r = RecipeRecord {
            analyzed_instructions: vec![
                AnalyzedInstruction {
                    original_string: Some("Whisk everything".into()),
                    steps: vec![Step { step: Some("ignored".into()) }],
                },
                AnalyzedInstruction {
                    original_string: None,
                    steps: vec![
                        Step { step: Some("Bake.".into()) },
                        Step { step: Some("Cool.".into()) },
                    ],
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            r.instruction_paragraphs(),
            vec!["Whisk everything", "Bake. Cool."]
        );
        assert_eq!(r.instruction_steps(), vec!["ignored", "Bake.", "Cool."]);
    }
}
