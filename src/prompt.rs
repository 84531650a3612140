use std::fmt::Write;

use crate::categories::Category;
use crate::places::PlaceRecord;

const MAX_TYPES: usize = 10;
const REVIEW_SNIPPET_CHARS: usize = 400;

/// Builds the classification prompt for one batch.
///
/// Places are numbered by their 1-based position in `batch`; the reply is
/// matched back by those numbers, never by name.
pub fn build_prompt(batch: &[PlaceRecord]) -> String {
    let blocks = batch
        .iter()
        .enumerate()
        .map(|(index, place)| format_place_block(place, index + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Classify each place below into exactly one category.\n\
         \n\
         {blocks}\n\
         \n\
         Categories (use exactly these): {categories}.\n\
         \n\
         Reply with a JSON object only. Keys are the place numbers as strings (\"1\", \"2\", \"3\", ...). \
         Values are the category for that place. No other text.\n\
         Example: {{\"1\": \"Restaurants\", \"2\": \"Shopping\", \"3\": \"Attractions\"}}",
        categories = Category::joined(", "),
    )
}

fn format_place_block(place: &PlaceRecord, number: usize) -> String {
    let types = if place.types.is_empty() {
        "unknown".to_string()
    } else {
        place
            .types
            .iter()
            .take(MAX_TYPES)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut block = format!(
        "--- Place {number} ---\nName: {}\nTypes: {types}\n",
        place.name
    );

    let mut stats = Vec::new();
    if let Some(rating) = place.rating {
        stats.push(format!("Rating: {}", format_rating(rating)));
    }
    if let Some(count) = place.user_ratings_count {
        stats.push(format!("Review count: {count}"));
    }
    if !stats.is_empty() {
        let _ = writeln!(block, "{}", stats.join(" "));
    }

    if let Some(first) = place.reviews.first() {
        let snippet: String = first.chars().take(REVIEW_SNIPPET_CHARS).collect();
        let _ = writeln!(block, "Review snippet: {snippet}");
    }

    block
}

// Whole ratings keep one decimal: "4.0", not "4".
fn format_rating(rating: f64) -> String {
    if rating.is_finite() && rating.fract() == 0.0 {
        format!("{rating:.1}")
    } else {
        format!("{rating}")
    }
}
