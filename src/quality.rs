use serde::{Deserialize, Serialize};

const GOOD_RATING: f64 = 4.0;
const POOR_RATING: f64 = 3.0;
const ENOUGH_REVIEWS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityColor {
    Green,
    Yellow,
    Red,
}

impl QualityColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityColor::Green => "green",
            QualityColor::Yellow => "yellow",
            QualityColor::Red => "red",
        }
    }
}

/// Derives the quality label from a rating and its review volume.
///
/// A mid-band rating (3.0 up to 4.0) never earns green, however many reviews
/// back it.
pub fn classify(rating: Option<f64>, review_count: Option<u64>) -> QualityColor {
    let rating = rating.unwrap_or(0.0);
    let enough_reviews = review_count.unwrap_or(0) >= ENOUGH_REVIEWS;

    if rating >= GOOD_RATING {
        if enough_reviews {
            QualityColor::Green
        } else {
            QualityColor::Yellow
        }
    } else if rating < POOR_RATING {
        QualityColor::Red
    } else if enough_reviews {
        QualityColor::Yellow
    } else {
        QualityColor::Red
    }
}
