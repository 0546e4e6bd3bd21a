use serde::Deserialize;

/// A provider's genre entry is either a bare string or an object keyed by
/// one of `name`/`label`/`title` — both shapes are seen across the two
/// providers' responses, so this carries either and flattens to a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GenreValue {
    Name(String),
    Tagged {
        #[serde(alias = "label", alias = "title")]
        name: String,
    },
}

impl GenreValue {
    pub fn into_string(self) -> String {
        match self {
            GenreValue::Name(s) => s,
            GenreValue::Tagged { name } => name,
        }
    }
}

pub fn normalize_genres(raw: Option<Vec<GenreValue>>) -> Vec<String> {
    raw.unwrap_or_default()
        .into_iter()
        .map(GenreValue::into_string)
        .filter(|s| !s.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_bare_strings() {
        let raw: Vec<GenreValue> = serde_json::from_str(r#"["Fantasy", "Sci-Fi"]"#).unwrap();
        assert_eq!(normalize_genres(Some(raw)), vec!["Fantasy", "Sci-Fi"]);
    }

    #[test]
    fn flattens_tagged_objects() {
        let raw: Vec<GenreValue> =
            serde_json::from_str(r#"[{"name": "Fantasy"}, {"label": "Sci-Fi"}]"#).unwrap();
        assert_eq!(normalize_genres(Some(raw)), vec!["Fantasy", "Sci-Fi"]);
    }

    #[test]
    fn mixed_shapes_in_one_list() {
        let raw: Vec<GenreValue> =
            serde_json::from_str(r#"["Fantasy", {"title": "Sci-Fi"}]"#).unwrap();
        assert_eq!(normalize_genres(Some(raw)), vec!["Fantasy", "Sci-Fi"]);
    }

    #[test]
    fn missing_list_is_empty() {
        assert!(normalize_genres(None).is_empty());
    }
}
