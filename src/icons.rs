use serde::{Deserialize, Serialize};

use crate::categories::Category;
use crate::places::PlaceRecord;

/// Icon identifiers understood by the map styling step; one per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Restaurant,
    StreetFood,
    Shopping,
    Attraction,
    Sweets,
    Cable,
    Hotel,
}

pub const DEFAULT_ICON: Icon = Icon::Attraction;

const CATEGORY_ICONS: [(Category, Icon); 7] = [
    (Category::Restaurants, Icon::Restaurant),
    (Category::StreetFood, Icon::StreetFood),
    (Category::Shopping, Icon::Shopping),
    (Category::Attractions, Icon::Attraction),
    (Category::Sweets, Icon::Sweets),
    (Category::Cable, Icon::Cable),
    (Category::Hotel, Icon::Hotel),
];

impl Icon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Icon::Restaurant => "restaurant",
            Icon::StreetFood => "street_food",
            Icon::Shopping => "shopping",
            Icon::Attraction => "attraction",
            Icon::Sweets => "sweets",
            Icon::Cable => "cable",
            Icon::Hotel => "hotel",
        }
    }
}

/// Looks up the icon for a category label. Only trimmed canonical labels hit.
pub fn icon_for(label: Option<&str>) -> Icon {
    let Some(label) = label.map(str::trim) else {
        return DEFAULT_ICON;
    };
    CATEGORY_ICONS
        .iter()
        .find(|(category, _)| category.as_str() == label)
        .map(|(_, icon)| *icon)
        .unwrap_or(DEFAULT_ICON)
}

pub fn icon_for_category(category: Option<Category>) -> Icon {
    icon_for(category.as_ref().map(Category::as_str))
}

pub fn assign_icons(places: &mut [PlaceRecord]) {
    for place in places.iter_mut() {
        place.icon = Some(icon_for_category(place.category));
    }
}
