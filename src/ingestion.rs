use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::places::PlaceRecord;

const NAME_HEADERS: [&str; 3] = ["name", "place", "title"];
const ADDRESS_HEADER: &str = "address";

/// Loads a place list: one name per line for `.txt`, a headed CSV otherwise.
pub fn load_places(path: &Path) -> AppResult<Vec<PlaceRecord>> {
    ensure_exists(path)?;
    let is_text = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);

    let places = if is_text {
        parse_text_list(&fs::read_to_string(path)?)
    } else {
        parse_csv_list(fs::File::open(path)?)?
    };
    debug!(path = %path.display(), count = places.len(), "loaded place list");
    Ok(places)
}

/// Loads a JSON array of previously enriched records.
pub fn load_enriched(path: &Path) -> AppResult<Vec<PlaceRecord>> {
    ensure_exists(path)?;
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn parse_text_list(contents: &str) -> Vec<PlaceRecord> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PlaceRecord::named)
        .collect()
}

pub fn parse_csv_list<R: io::Read>(reader: R) -> AppResult<Vec<PlaceRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let name_col = normalized
        .iter()
        .position(|h| NAME_HEADERS.contains(&h.as_str()))
        .unwrap_or(0);
    let address_col = normalized.iter().position(|h| h == ADDRESS_HEADER);

    let mut places = Vec::new();
    for row in reader.records() {
        let row = row?;
        let name = row.get(name_col).unwrap_or_default().trim();
        if name.is_empty() {
            continue;
        }
        let mut place = PlaceRecord::named(name);
        if let Some(address) = address_col
            .and_then(|col| row.get(col))
            .filter(|value| !value.is_empty())
        {
            place.address = Some(address.trim().to_string());
        }
        places.push(place);
    }
    Ok(places)
}

fn ensure_exists(path: &Path) -> AppResult<()> {
    if path.exists() {
        return Ok(());
    }
    Err(AppError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("input file not found: {}", path.display()),
    )))
}
