use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use walkdir::WalkDir;

pub(crate) const AUDIO_EXTENSIONS: &[&str] = &["m4b", "mp3", "m4a", "flac", "wav", "ogg", "opus", "aac", "wma"];

const PART_MARKERS: &[&str] = &["part", "chapter", "disc", "volume", "chp", "level", "buch"];

static PART_FOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(cd|part|disc|volume|pt|level|buch)\.?\s*\d+$").unwrap());

static EIGHT_DOT_THREE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[A-Z0-9_~]{1,8}(~\d)?\.[A-Z0-9]{3}$").unwrap());

static LANGUAGE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[\[(](ger|german|french|espanol|spanish|italian|buch)[\])]").unwrap());

/// One book's physical footprint on disk, as the scanner found it.
#[derive(Debug, Clone, PartialEq)]
pub enum BookUnit {
    SingleFile(PathBuf),
    FolderOfParts(PathBuf),
    /// Sibling audio files sharing a normalized prefix, in natural order.
    Collection(Vec<PathBuf>),
    FolderClaim(PathBuf),
}

impl BookUnit {
    /// The `|`-joined representation used as an ImportItem's source path.
    pub fn source_path(&self) -> String {
        match self {
            BookUnit::SingleFile(p) | BookUnit::FolderOfParts(p) | BookUnit::FolderClaim(p) => {
                p.display().to_string()
            }
            BookUnit::Collection(paths) => {
                paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join("|")
            }
        }
    }

    fn representative_name(&self) -> String {
        match self {
            BookUnit::SingleFile(p) | BookUnit::FolderOfParts(p) | BookUnit::FolderClaim(p) => {
                p.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string()
            }
            BookUnit::Collection(paths) => paths
                .first()
                .and_then(|p| p.file_stem())
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn parent_dir(&self) -> Option<PathBuf> {
        match self {
            BookUnit::SingleFile(p) => p.parent().map(Path::to_path_buf),
            BookUnit::FolderOfParts(p) | BookUnit::FolderClaim(p) => p.parent().map(Path::to_path_buf),
            BookUnit::Collection(paths) => paths.first().and_then(|p| p.parent()).map(Path::to_path_buf),
        }
    }
}

/// Derived `(author, title, language)` for a unit, used to seed match
/// candidates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookGuess {
    pub author: Option<String>,
    pub title: Option<String>,
    pub language: Option<String>,
}

fn is_audio_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn has_part_marker(stem: &str) -> bool {
    let lower = stem.to_ascii_lowercase();
    PART_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_garbage_8_3(stem_with_ext: &str) -> bool {
    EIGHT_DOT_THREE.is_match(stem_with_ext)
}

/// Normalizes a filename for prefix-grouping: lowercase, drop a
/// trailing part/track index, collapse whitespace/punctuation runs.
fn normalized_prefix(stem: &str) -> String {
    let lower = stem.to_ascii_lowercase();
    let trimmed = lower.trim_end_matches(|c: char| c.is_ascii_digit() || c == ' ' || c == '-' || c == '_');
    trimmed.chars().map(|c| if c.is_alphanumeric() { c } else { ' ' }).collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sniff_language(text: &str) -> Option<String> {
    let captures = LANGUAGE_MARKER.captures(text)?;
    let raw = captures.get(1)?.as_str().to_ascii_lowercase();
    Some(match raw.as_str() {
        "ger" | "german" | "buch" => "german".to_string(),
        "french" => "french".to_string(),
        "espanol" | "spanish" => "spanish".to_string(),
        "italian" => "italian".to_string(),
        other => other.to_string(),
    })
}

/// `author - title` / `author` / lone-`title` cascade over a cleaned
/// basename, falling back to the parent (then grandparent) directory
/// name for the author when the basename alone doesn't carry one.
pub fn derive_guess(unit: &BookUnit) -> BookGuess {
    let name = unit.representative_name();
    let language = sniff_language(&name).or_else(|| unit.parent_dir().and_then(|p| sniff_language(&p.display().to_string())));

    let segments: Vec<&str> = name.split(" - ").map(str::trim).filter(|s| !s.is_empty()).collect();
    let (mut author, mut title) = match segments.len() {
        3 => {
            // drop a trailing short/numeric segment (track/disc marker)
            let keep = if segments[2].len() <= 3 || segments[2].chars().all(|c| c.is_ascii_digit()) {
                &segments[..2]
            } else {
                &segments[..]
            };
            (Some(keep[0].to_string()), Some(keep.get(1).unwrap_or(&segments[0]).to_string()))
        }
        2 => (Some(segments[0].to_string()), Some(segments[1].to_string())),
        1 if !segments[0].is_empty() => (None, Some(segments[0].to_string())),
        _ => (None, None),
    };

    if author.is_none()
        && let Some(parent) = unit.parent_dir()
        && let Some(parent_name) = parent.file_name().and_then(|n| n.to_str())
    {
        let parent_segments: Vec<&str> = parent_name.split(" - ").map(str::trim).collect();
        if parent_segments.len() >= 2 {
            author = Some(parent_segments[0].to_string());
            if title.is_none() {
                title = Some(parent_segments[1].to_string());
            }
        } else if let Some(grandparent) = parent.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()) {
            author = Some(grandparent.to_string());
        }
    }

    BookGuess { author, title, language }
}

/// Walks `root` grouping children into book units per folder.
pub fn scan(root: &Path) -> Vec<BookUnit> {
    let mut units = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() {
            continue;
        }
        units.extend(units_in_folder(entry.path()));
    }
    units
}

fn units_in_folder(dir: &Path) -> Vec<BookUnit> {
    let Ok(entries) = std::fs::read_dir(dir) else { return Vec::new() };
    let mut children: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    children.sort();

    let subdirs: Vec<&PathBuf> = children.iter().filter(|p| p.is_dir()).collect();
    if !subdirs.is_empty() {
        let part_like = subdirs
            .iter()
            .filter(|p| p.file_name().and_then(|n| n.to_str()).map(|n| PART_FOLDER.is_match(n)).unwrap_or(false))
            .count();
        if subdirs.len() > 1 && part_like * 2 >= subdirs.len() {
            return vec![BookUnit::FolderOfParts(dir.to_path_buf())];
        }
        // Has subdirectories that aren't a parts pattern: let the walker
        // descend into them on its own pass rather than claiming this
        // folder's audio files as a separate unit too.
        return Vec::new();
    }

    let audio_files: Vec<PathBuf> = children.iter().filter(|p| p.is_file() && is_audio_ext(p)).cloned().collect();
    if audio_files.is_empty() {
        return Vec::new();
    }
    if audio_files.len() == 1 {
        let stem = audio_files[0].file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if !has_part_marker(stem) {
            return vec![BookUnit::SingleFile(audio_files[0].clone())];
        }
    }

    let mut groups: HashMap<String, Vec<PathBuf>> = HashMap::new();
    let mut garbage: Vec<PathBuf> = Vec::new();
    for file in &audio_files {
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if is_garbage_8_3(name) {
            garbage.push(file.clone());
            continue;
        }
        groups.entry(normalized_prefix(stem)).or_default().push(file.clone());
    }

    let mut collections: Vec<Vec<PathBuf>> = groups.into_values().collect();
    for group in &mut collections {
        group.sort_by(|a, b| natural_sort_key(a).cmp(&natural_sort_key(b)));
    }
    if !garbage.is_empty() {
        let mut garbage_sorted = garbage;
        garbage_sorted.sort_by(|a, b| natural_sort_key(a).cmp(&natural_sort_key(b)));
        collections.push(garbage_sorted);
    }

    let has_master_variant = audio_files.iter().any(|p| {
        p.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("m4b") || e.eq_ignore_ascii_case("m4a")).unwrap_or(false)
    });

    if collections.len() == 1 && !has_master_variant {
        return vec![BookUnit::FolderClaim(dir.to_path_buf())];
    }

    collections
        .into_iter()
        .map(|files| if files.len() == 1 { BookUnit::SingleFile(files.into_iter().next().unwrap()) } else { BookUnit::Collection(files) })
        .collect()
}

/// Sort key treating embedded digit runs as numbers, so `track2` sorts
/// before `track10`.
pub(crate) fn natural_sort_key(path: &Path) -> Vec<(bool, String)> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let mut key = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;
    for c in name.chars() {
        let is_digit = c.is_ascii_digit();
        if !current.is_empty() && is_digit != in_digits {
            key.push((in_digits, std::mem::take(&mut current)));
        }
        in_digits = is_digit;
        current.push(c);
    }
    if !current.is_empty() {
        key.push((in_digits, current));
    }
    key.into_iter()
        .map(|(is_digits, s)| if is_digits { (true, format!("{:020}", s.parse::<u128>().unwrap_or(0))) } else { (false, s) })
        .collect()
}

#[derive(Debug, Deserialize)]
struct MetadataIdentifier {
    asin: String,
}

/// Walks `root` for a `metadata.json` whose `asin` matches `target`.
pub fn find_by_identifier(root: &Path, target: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() == "metadata.json")
        .find_map(|e| {
            let contents = std::fs::read_to_string(e.path()).ok()?;
            let parsed: MetadataIdentifier = serde_json::from_str(&contents).ok()?;
            if parsed.asin == target { e.path().parent().map(Path::to_path_buf) } else { None }
        })
}

/// Bulk form of `find_by_identifier`, one walk for every `metadata.json`
/// found under `root`.
pub fn map_by_identifier(root: &Path) -> HashMap<String, PathBuf> {
    let mut out = HashMap::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_name() == "metadata.json") {
        let Ok(contents) = std::fs::read_to_string(entry.path()) else { continue };
        let Ok(parsed) = serde_json::from_str::<MetadataIdentifier>(&contents) else { continue };
        if let Some(parent) = entry.path().parent() {
            out.insert(parsed.asin, parent.to_path_buf());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn single_file_without_part_marker_is_a_single_file_book() {
        let dir = tempdir().unwrap();
        let author_dir = dir.path().join("Susan Cain");
        fs::create_dir_all(&author_dir).unwrap();
        fs::write(author_dir.join("Quiet.m4b"), b"").unwrap();
        let units = scan(dir.path());
        assert_eq!(units, vec![BookUnit::SingleFile(author_dir.join("Quiet.m4b"))]);
    }

    #[test]
    fn cd_numbered_subfolders_form_a_folder_of_parts() {
        let dir = tempdir().unwrap();
        let book_dir = dir.path().join("Book");
        fs::create_dir_all(book_dir.join("cd1")).unwrap();
        fs::create_dir_all(book_dir.join("cd2")).unwrap();
        let units = scan(dir.path());
        assert!(units.contains(&BookUnit::FolderOfParts(book_dir.clone())));
    }

    #[test]
    fn sibling_files_sharing_a_prefix_form_a_collection() {
        let dir = tempdir().unwrap();
        let book_dir = dir.path().join("Mistborn");
        fs::create_dir_all(&book_dir).unwrap();
        for i in 1..=3 {
            fs::write(book_dir.join(format!("mistborn cd{i}.mp3")), b"").unwrap();
        }
        let units = scan(dir.path());
        assert_eq!(units.len(), 1);
        assert!(matches!(units[0], BookUnit::Collection(_)));
    }

    #[test]
    fn garbage_8_3_filenames_are_bucketed_separately() {
        let dir = tempdir().unwrap();
        let book_dir = dir.path().join("Book");
        fs::create_dir_all(&book_dir).unwrap();
        fs::write(book_dir.join("track1.mp3"), b"").unwrap();
        fs::write(book_dir.join("track2.mp3"), b"").unwrap();
        fs::write(book_dir.join("MI2K~1.MP3"), b"").unwrap();
        let units = scan(dir.path());
        // two groups: the real collection and the garbage bucket
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn derives_author_title_from_dash_separated_basename() {
        let unit = BookUnit::SingleFile(PathBuf::from("/lib/Brandon Sanderson - Mistborn.m4b"));
        let guess = derive_guess(&unit);
        assert_eq!(guess.author.as_deref(), Some("Brandon Sanderson"));
        assert_eq!(guess.title.as_deref(), Some("Mistborn"));
    }

    #[test]
    fn falls_back_to_parent_directory_for_author() {
        let unit = BookUnit::SingleFile(PathBuf::from("/lib/Brandon Sanderson/Mistborn.m4b"));
        let guess = derive_guess(&unit);
        assert_eq!(guess.title.as_deref(), Some("Mistborn"));
    }

    #[test]
    fn natural_sort_orders_numeric_suffixes_correctly() {
        let mut paths = vec![PathBuf::from("track10.mp3"), PathBuf::from("track2.mp3")];
        paths.sort_by(|a, b| natural_sort_key(a).cmp(&natural_sort_key(b)));
        assert_eq!(paths, vec![PathBuf::from("track2.mp3"), PathBuf::from("track10.mp3")]);
    }
}
