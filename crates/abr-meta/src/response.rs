use abr_model::{Book, ReleaseDate, SeriesEntry};
use serde::Deserialize;
use time::Date;
use time::macros::format_description;

use crate::genre::{GenreValue, normalize_genres};

#[derive(Debug, Clone, Deserialize)]
pub struct NamedEntry {
    pub name: String,
}

fn names(entries: Vec<NamedEntry>) -> Vec<String> {
    entries.into_iter().map(|e| e.name).collect()
}

/// A series name sometimes carries its index inline (`"Coda #3"`); split
/// it back into name and index the way the rest of the system expects.
fn parse_series_entry(raw: &str) -> SeriesEntry {
    match raw.rsplit_once(" #") {
        Some((name, index)) if !index.trim().is_empty() => SeriesEntry {
            name: name.to_string(),
            index: Some(index.trim().to_string()),
        },
        _ => SeriesEntry {
            name: raw.to_string(),
            index: None,
        },
    }
}

fn parse_release_date(raw: Option<serde_json::Value>) -> Option<ReleaseDate> {
    let raw = raw?;
    if let Some(s) = raw.as_str() {
        let fmt = format_description!("[year]-[month]-[day]");
        if let Ok(date) = Date::parse(s, &fmt) {
            return Some(ReleaseDate::Date(date));
        }
        if let Ok(year) = s.trim().parse::<i32>() {
            return Some(ReleaseDate::Year(year));
        }
        return None;
    }
    raw.as_i64().map(|y| ReleaseDate::Year(y as i32))
}

/// Primary provider's book-by-identifier response.
#[derive(Debug, Clone, Deserialize)]
pub struct PrimaryBookResponse {
    pub asin: String,
    pub title: String,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub authors: Vec<NamedEntry>,
    #[serde(default)]
    pub narrators: Vec<NamedEntry>,
    pub series: Option<Vec<NamedEntry>>,
    pub genres: Option<Vec<GenreValue>>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(rename = "releaseDate")]
    pub release_date: Option<serde_json::Value>,
    #[serde(rename = "lengthMinutes")]
    pub length_minutes: Option<u32>,
}

impl PrimaryBookResponse {
    pub fn into_book(self) -> Book {
        Book {
            asin: self.asin,
            title: self.title,
            subtitle: self.subtitle,
            authors: names(self.authors),
            narrators: names(self.narrators),
            cover_url: self.image_url,
            release_date: parse_release_date(self.release_date),
            runtime_minutes: self.length_minutes,
            series: self
                .series
                .unwrap_or_default()
                .into_iter()
                .map(|e| parse_series_entry(&e.name))
                .collect(),
            genres: normalize_genres(self.genres),
            publisher: self.publisher,
            description: self.description,
            language: self.language,
        }
    }
}

/// Secondary provider's book-by-identifier response. Same shape as
/// `PrimaryBookResponse` except for two renamed fields; `runtime_minutes`
/// defaults to `0` when the field is absent rather than staying `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct SecondaryBookResponse {
    pub asin: String,
    pub title: String,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub authors: Vec<NamedEntry>,
    #[serde(default)]
    pub narrators: Vec<NamedEntry>,
    pub series: Option<Vec<NamedEntry>>,
    pub genres: Option<Vec<GenreValue>>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub image: Option<String>,
    #[serde(rename = "releaseDate")]
    pub release_date: Option<serde_json::Value>,
    #[serde(rename = "runtimeLengthMin")]
    pub runtime_length_min: Option<u32>,
}

impl SecondaryBookResponse {
    pub fn into_book(self) -> Book {
        Book {
            asin: self.asin,
            title: self.title,
            subtitle: self.subtitle,
            authors: names(self.authors),
            narrators: names(self.narrators),
            cover_url: self.image,
            release_date: parse_release_date(self.release_date),
            runtime_minutes: Some(self.runtime_length_min.unwrap_or(0)),
            series: self
                .series
                .unwrap_or_default()
                .into_iter()
                .map(|e| parse_series_entry(&e.name))
                .collect(),
            genres: normalize_genres(self.genres),
            publisher: self.publisher,
            description: self.description,
            language: self.language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_defaults_runtime_to_zero() {
        let raw = r#"{"asin":"A1","title":"T","authors":[],"narrators":[]}"#;
        let resp: SecondaryBookResponse = serde_json::from_str(raw).unwrap();
        let book = resp.into_book();
        assert_eq!(book.runtime_minutes, Some(0));
    }

    #[test]
    fn series_index_is_split_out_of_the_name() {
        let entry = parse_series_entry("Coda #3");
        assert_eq!(entry.name, "Coda");
        assert_eq!(entry.index.as_deref(), Some("3"));
    }

    #[test]
    fn series_without_index_stays_whole() {
        let entry = parse_series_entry("Coda");
        assert_eq!(entry.name, "Coda");
        assert_eq!(entry.index, None);
    }

    #[test]
    fn release_date_parses_full_date() {
        let v = serde_json::Value::String("2020-05-01".to_string());
        match parse_release_date(Some(v)) {
            Some(ReleaseDate::Date(d)) => assert_eq!(d.year(), 2020),
            other => panic!("expected a full date, got {other:?}"),
        }
    }

    #[test]
    fn release_date_falls_back_to_year() {
        let v = serde_json::Value::String("2020".to_string());
        match parse_release_date(Some(v)) {
            Some(ReleaseDate::Year(y)) => assert_eq!(y, 2020),
            other => panic!("expected a bare year, got {other:?}"),
        }
    }
}
