use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// The fixed classification labels a place can carry.
///
/// Declaration order matters: substring matching in [`normalize`] returns the
/// first category that matches, scanning in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Restaurants,
    StreetFood,
    Shopping,
    Attractions,
    Sweets,
    Cable,
    Hotel,
}

pub const DEFAULT_CATEGORY: Category = Category::Attractions;

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Restaurants,
        Category::StreetFood,
        Category::Shopping,
        Category::Attractions,
        Category::Sweets,
        Category::Cable,
        Category::Hotel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Restaurants => "Restaurants",
            Category::StreetFood => "Street food",
            Category::Shopping => "Shopping",
            Category::Attractions => "Attractions",
            Category::Sweets => "Sweets",
            Category::Cable => "Cable",
            Category::Hotel => "Hotel",
        }
    }

    /// Exact, case-sensitive match against the canonical literal.
    pub fn from_canonical(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cat| cat.as_str() == value)
    }

    /// Canonical labels joined for prompts, in declaration order.
    pub fn joined(separator: &str) -> String {
        Self::ALL
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Step files are hand-editable, so stored labels go through the same
// normalization as model output instead of failing the load.
impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(normalize(raw.as_deref()))
    }
}

const CATEGORY_ALIASES: &[(&str, Category)] = &[
    ("restaurant", Category::Restaurants),
    ("restaurants", Category::Restaurants),
    ("street food", Category::StreetFood),
    ("streetfood", Category::StreetFood),
    ("shopping", Category::Shopping),
    ("attraction", Category::Attractions),
    ("attractions", Category::Attractions),
    ("sweet", Category::Sweets),
    ("sweets", Category::Sweets),
    ("cable", Category::Cable),
    ("hotel", Category::Hotel),
    ("hotels", Category::Hotel),
];

/// Maps free-form category text to exactly one canonical [`Category`].
///
/// Resolution order: exact canonical literal, lower-cased alias, then the
/// first canonical name contained in the input. Anything else resolves to
/// [`DEFAULT_CATEGORY`] with a warning.
pub fn normalize(raw: Option<&str>) -> Category {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_CATEGORY;
    };

    if let Some(category) = Category::from_canonical(value) {
        return category;
    }

    let key = value.to_lowercase();
    if let Some((_, category)) = CATEGORY_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return *category;
    }

    if let Some(category) = Category::ALL
        .into_iter()
        .find(|cat| key.contains(&cat.as_str().to_lowercase()))
    {
        return category;
    }

    warn!(
        raw = value,
        default = DEFAULT_CATEGORY.as_str(),
        "unrecognized category; using default"
    );
    DEFAULT_CATEGORY
}
