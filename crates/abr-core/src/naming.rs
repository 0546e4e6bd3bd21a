use std::path::{Path, PathBuf};

use abr_model::Book;

use crate::error::{CoreError, CoreResult};

/// Characters forbidden in any interpolated path segment. Filtered
/// silently rather than rejected, since a provider-supplied title is
/// not something a user can be expected to fix.
const FORBIDDEN: &[char] = &['\\', '/', '*', '?', ':', '"', '>', '|', '<'];

pub fn sanitize_segment(segment: &str) -> String {
    segment.chars().filter(|c| !FORBIDDEN.contains(c)).collect::<String>().trim().to_string()
}

/// `"Part " + zero-padded(i, ceil(log10(n)))`, empty when there's only
/// one part.
pub fn part_label(i: usize, n: usize) -> String {
    if n <= 1 {
        return String::new();
    }
    let width = (n as f64).log10().ceil() as usize;
    let width = width.max(1);
    format!("Part {i:0width$}")
}

fn series_display(book: &Book) -> String {
    match book.primary_series() {
        Some(series) => series.display(),
        None => String::new(),
    }
}

fn year_display(book: &Book) -> String {
    match &book.release_date {
        Some(date) => date.year().to_string(),
        None => "Unknown".to_string(),
    }
}

/// Substitutes every `{placeholder}` the naming scheme recognizes;
/// unrecognized placeholders are left verbatim. Each substituted value
/// is sanitized independently so a forbidden character in, say, the
/// title never leaks past its own segment.
pub fn interpolate(pattern: &str, book: &Book, part: &str) -> String {
    let series = book.primary_series();
    let replacements: [(&str, String); 7] = [
        ("{author}", sanitize_segment(book.first_author())),
        ("{title}", sanitize_segment(&book.title)),
        ("{year}", sanitize_segment(&year_display(book))),
        ("{asin}", sanitize_segment(&book.asin)),
        ("{series}", sanitize_segment(&series.map(|s| s.name.clone()).unwrap_or_default())),
        (
            "{series_index}",
            sanitize_segment(&series.and_then(|s| s.index.clone()).unwrap_or_default()),
        ),
        ("{part}", sanitize_segment(part)),
    ];
    let mut out = pattern.to_string();
    for (placeholder, value) in replacements {
        out = out.replace(placeholder, &value);
    }
    out
}

/// Relative destination folder for a book. Falls back to
/// `<author>/<series>/<title>` when the configured pattern has no
/// `{series}` placeholder but the deployment wants series folders and
/// the book actually has a series.
pub fn folder_rel(pattern: &str, use_series_folders: bool, book: &Book) -> String {
    if use_series_folders && !pattern.contains("{series}") && book.primary_series().is_some() {
        return format!(
            "{}/{}/{}",
            sanitize_segment(book.first_author()),
            sanitize_segment(&series_display(book)),
            sanitize_segment(&book.title),
        );
    }
    interpolate(pattern, book, "")
}

/// File name (without directory) for one part. When the pattern has no
/// `{part}` placeholder and there's more than one file, the part label
/// is appended before the extension.
pub fn file_name(pattern: &str, book: &Book, index: usize, total: usize, extension: &str) -> String {
    let label = part_label(index, total);
    let base = interpolate(pattern, book, &label);
    let base = if !pattern.contains("{part}") && total > 1 {
        format!("{base} - {label}")
    } else {
        base
    };
    format!("{base}.{}", extension.trim_start_matches('.'))
}

/// Joins `library_root` and `rel` and rejects any result that escapes
/// the root (P3). `rel` is expected to already be sanitized per-segment
/// by `folder_rel`/`file_name`.
pub fn resolve_under_root(library_root: &Path, rel: &str) -> CoreResult<PathBuf> {
    if !library_root.is_absolute() {
        return Err(CoreError::Misconfigured("library_path must be an absolute path".to_string()));
    }
    let mut resolved = library_root.to_path_buf();
    for segment in rel.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(CoreError::Validation("destination path escapes library root".to_string())),
            other => resolved.push(other),
        }
    }
    if !resolved.starts_with(library_root) {
        return Err(CoreError::Validation("destination path escapes library root".to_string()));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use abr_model::{ReleaseDate, SeriesEntry};

    fn book() -> Book {
        Book {
            asin: "B0AAA00001".to_string(),
            title: "Quiet".to_string(),
            subtitle: None,
            authors: vec!["Susan Cain".to_string()],
            narrators: vec![],
            cover_url: None,
            release_date: Some(ReleaseDate::Year(2012)),
            runtime_minutes: Some(640),
            series: vec![],
            genres: vec![],
            publisher: None,
            description: None,
            language: None,
        }
    }

    #[test]
    fn default_pattern_interpolates_author_title_year() {
        let rel = folder_rel("{author}/{title} ({year})", false, &book());
        assert_eq!(rel, "Susan Cain/Quiet (2012)");
    }

    #[test]
    fn series_folder_fallback_applies_when_pattern_lacks_series_placeholder() {
        let mut b = book();
        b.series = vec![SeriesEntry { name: "The Stormlight Archive".to_string(), index: Some("4".to_string()) }];
        let rel = folder_rel("{author}/{title} ({year})", true, &b);
        assert_eq!(rel, "Susan Cain/The Stormlight Archive #4/Quiet");
    }

    #[test]
    fn forbidden_characters_are_stripped() {
        assert_eq!(sanitize_segment("A/B: C?"), "AB C");
    }

    #[test]
    fn part_label_zero_pads_to_digit_width() {
        assert_eq!(part_label(3, 13), "Part 03");
        assert_eq!(part_label(1, 1), "");
    }

    #[test]
    fn resolve_under_root_rejects_escape() {
        let root = Path::new("/lib");
        assert!(resolve_under_root(root, "../etc").is_err());
        assert!(resolve_under_root(root, "Author/Title").is_ok());
    }
}
