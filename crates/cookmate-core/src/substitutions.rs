//! Ingredient substitution lookup.
//!
//! A small fixed table; the backend has no substitution endpoint.

const SUBSTITUTIONS: &[(&str, &[&str])] = &[
    ("buttermilk", &["Yogurt+water", "Milk+lemon juice", "Sour cream"]),
    ("butter", &["Ghee", "Coconut oil", "Olive oil"]),
    ("egg", &["Flax egg", "Banana", "Applesauce"]),
    ("milk", &["Almond milk", "Coconut milk", "Soy milk"]),
    ("tomato", &["Tomato paste+water", "Red bell pepper", "Canned tomatoes"]),
];

/// Substitutes for `ingredient`, matched case-insensitively on the whole
/// name.
pub fn substitutes_for(ingredient: &str) -> Option<&'static [&'static str]> {
    let key = ingredient.trim().to_lowercase();
    SUBSTITUTIONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, subs)| *subs)
}

/// Ingredients with known substitutes.
pub fn known_ingredients() -> impl Iterator<Item = &'static str> {
    SUBSTITUTIONS.iter().map(|(name, _)| *name)
}
