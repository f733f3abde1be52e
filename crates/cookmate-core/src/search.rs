//! Recipe list filtering for browsing.

use crate::types::Recipe;

/// Recipes matching every given criterion, in their original order.
///
/// `query` is a case-insensitive substring of the title or of any
/// ingredient. `cuisine` and `difficulty` must equal the recipe's field,
/// ignoring case. Empty or `None` criteria match everything.
pub fn filter_recipes<'a>(
    recipes: &'a [Recipe],
    query: Option<&str>,
    cuisine: Option<&str>,
    difficulty: Option<&str>,
) -> Vec<&'a Recipe> {
    let query = non_empty(query).map(str::to_lowercase);
    let cuisine = non_empty(cuisine);
    let difficulty = non_empty(difficulty);

    recipes
        .iter()
        .filter(|r| cuisine.is_none_or(|c| field_is(r.cuisine.as_deref(), c)))
        .filter(|r| difficulty.is_none_or(|d| field_is(r.difficulty.as_deref(), d)))
        .filter(|r| query.as_deref().is_none_or(|q| mentions(r, q)))
        .collect()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn field_is(field: Option<&str>, wanted: &str) -> bool {
    field.is_some_and(|f| f.trim().eq_ignore_ascii_case(wanted))
}

fn mentions(recipe: &Recipe, query: &str) -> bool {
    recipe.display_name().to_lowercase().contains(query)
        || recipe
            .ingredients
            .iter()
            .any(|i| i.to_lowercase().contains(query))
}
