use std::path::{Path, PathBuf};
use std::sync::Arc;

use abr_db::{RequestRecord, Store};
use abr_model::{Book, ProcessingStatus, ReleaseDate};
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use crate::naming;
use crate::scanner::{AUDIO_EXTENSIONS, natural_sort_key};

/// Turns a completed download into an organized library entry: moves
/// (or hardlinks, falling back to copy across filesystems) the audio
/// files into their computed destination, then writes the
/// `metadata.json` / `metadata.opf` / `cover.<ext>` sidecars. Mirrors
/// `mlm_core`'s post-download organize step, generalized from a single
/// destination convention to the configurable naming scheme in
/// `naming.rs`.
pub struct Processor {
    store: Arc<Store>,
    http: reqwest::Client,
}

impl Processor {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, http: reqwest::Client::new() }
    }

    /// Full pipeline for a request whose torrent has finished
    /// downloading: compute the destination, move the files in, write
    /// the sidecars, mark the book downloaded. On any step failing, the
    /// request is moved to `failed:<reason>` and the error is returned.
    #[instrument(skip(self, request))]
    pub async fn process_download(
        &self,
        request: &RequestRecord,
        download_path: &Path,
        library_root: &Path,
        folder_pattern: &str,
        file_pattern: &str,
        use_series_folders: bool,
        delete_source: bool,
    ) -> Result<PathBuf, String> {
        match self.try_process(request, download_path, library_root, folder_pattern, file_pattern, use_series_folders, delete_source).await {
            Ok(dest) => Ok(dest),
            Err(reason) => {
                warn!(asin = %request.asin, %reason, "processing failed");
                let mut failed = request.clone();
                failed.set_status(ProcessingStatus::Failed(reason.clone()));
                let _ = self.store.save_request(failed).await;
                Err(reason)
            }
        }
    }

    async fn try_process(
        &self,
        request: &RequestRecord,
        download_path: &Path,
        library_root: &Path,
        folder_pattern: &str,
        file_pattern: &str,
        use_series_folders: bool,
        delete_source: bool,
    ) -> Result<PathBuf, String> {
        let book = self
            .store
            .get_book(&request.asin)
            .map_err(|e| format!("book lookup failed: {e}"))?
            .ok_or_else(|| "no cached book metadata".to_string())?;

        let dest_rel = naming::folder_rel(folder_pattern, use_series_folders, &book);
        let dest_dir = naming::resolve_under_root(library_root, &dest_rel).map_err(|e| e.to_string())?;
        std::fs::create_dir_all(&dest_dir).map_err(|e| format!("creating destination dir: {e}"))?;

        let mut progress = request.clone();
        progress.set_status(ProcessingStatus::OrganizingFiles);
        progress.download_progress = 0.90;
        let _ = self.store.save_request(progress.clone()).await;

        let mut audio_files: Vec<PathBuf> = WalkDir::new(download_path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| {
                p.extension().and_then(|e| e.to_str()).map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str())).unwrap_or(false)
            })
            .collect();
        audio_files.sort_by(|a, b| natural_sort_key(a).cmp(&natural_sort_key(b)));

        if audio_files.is_empty() {
            return Err("no audio files found in download".to_string());
        }

        let total = audio_files.len();
        for (idx, src) in audio_files.iter().enumerate() {
            let ext = src.extension().and_then(|e| e.to_str()).unwrap_or("mp3");
            let name = naming::file_name(file_pattern, &book, idx + 1, total, ext);
            let dest = dest_dir.join(&name);
            place_file(src, &dest, delete_source).map_err(|e| format!("moving {}: {e}", src.display()))?;

            progress.download_progress = 0.90 + 0.02 * ((idx + 1) as f32 / total as f32);
            let _ = self.store.save_request(progress.clone()).await;
        }

        progress.set_status(ProcessingStatus::GeneratingMetadata);
        progress.download_progress = 0.95;
        let _ = self.store.save_request(progress.clone()).await;
        write_metadata_json(&dest_dir, &book).map_err(|e| format!("writing metadata.json: {e}"))?;
        write_metadata_opf(&dest_dir, &book).map_err(|e| format!("writing metadata.opf: {e}"))?;

        progress.set_status(ProcessingStatus::SavingCover);
        progress.download_progress = 0.98;
        let _ = self.store.save_request(progress.clone()).await;
        if let Some(cover_url) = &book.cover_url {
            if let Err(e) = self.save_cover(&dest_dir, cover_url).await {
                warn!(error = %e, "cover download failed, continuing without one");
            }
        }

        progress.set_status(ProcessingStatus::Completed);
        progress.download_progress = 1.0;
        let _ = self.store.save_request(progress.clone()).await;
        let _ = self.store.mark_downloaded(&request.asin).await;

        info!(asin = %request.asin, dest = %dest_dir.display(), "processing complete");
        Ok(dest_dir)
    }

    async fn save_cover(&self, dest_dir: &Path, cover_url: &str) -> Result<(), String> {
        let resp = self.http.get(cover_url).send().await.map_err(|e| e.to_string())?;
        let resp = resp.error_for_status().map_err(|e| e.to_string())?;
        let ext = content_type_extension(resp.headers().get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok())).unwrap_or_else(|| extension_from_url(cover_url));
        let bytes = resp.bytes().await.map_err(|e| e.to_string())?;
        std::fs::write(dest_dir.join(format!("cover.{ext}")), &bytes).map_err(|e| e.to_string())
    }

    /// Re-writes the sidecars for a book already sitting in place on
    /// disk (the importer's path: a matched library item whose files
    /// never need to move, only be labeled).
    #[instrument(skip(self, book))]
    pub async fn reorganize_in_place(&self, book: &Book, dir: &Path) -> Result<(), String> {
        write_metadata_json(dir, book).map_err(|e| format!("writing metadata.json: {e}"))?;
        write_metadata_opf(dir, book).map_err(|e| format!("writing metadata.opf: {e}"))?;
        if let Some(cover_url) = &book.cover_url
            && !dir.read_dir().map(|mut it| it.any(|e| e.map(|e| e.file_name().to_string_lossy().starts_with("cover.")).unwrap_or(false))).unwrap_or(false)
        {
            if let Err(e) = self.save_cover(dir, cover_url).await {
                warn!(error = %e, "cover download failed during in-place reorganize");
            }
        }
        Ok(())
    }
}

fn place_file(src: &Path, dest: &Path, delete_source: bool) -> std::io::Result<()> {
    match std::fs::hard_link(src, dest) {
        Ok(()) => {
            if delete_source {
                std::fs::remove_file(src)?;
            }
            Ok(())
        }
        Err(_) => {
            std::fs::copy(src, dest)?;
            if delete_source {
                std::fs::remove_file(src)?;
            }
            Ok(())
        }
    }
}

fn content_type_extension(content_type: Option<&str>) -> Option<String> {
    match content_type?.split(';').next()?.trim() {
        "image/jpeg" | "image/jpg" => Some("jpg".to_string()),
        "image/png" => Some("png".to_string()),
        "image/webp" => Some("webp".to_string()),
        _ => None,
    }
}

fn extension_from_url(url: &str) -> String {
    url.rsplit('.').next().filter(|s| s.len() <= 4 && !s.contains('/')).unwrap_or("jpg").to_string()
}

#[derive(serde::Serialize)]
struct MetadataJson<'a> {
    asin: &'a str,
    title: &'a str,
    subtitle: &'a Option<String>,
    authors: &'a [String],
    narrators: &'a [String],
    series: Vec<SeriesJson<'a>>,
    genres: &'a [String],
    publisher: &'a Option<String>,
    description: &'a Option<String>,
    language: &'a Option<String>,
    #[serde(rename = "publishedYear")]
    published_year: Option<String>,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
}

#[derive(serde::Serialize)]
struct SeriesJson<'a> {
    name: &'a str,
    index: &'a Option<String>,
}

fn write_metadata_json(dir: &Path, book: &Book) -> std::io::Result<()> {
    let doc = MetadataJson {
        asin: &book.asin,
        title: &book.title,
        subtitle: &book.subtitle,
        authors: &book.authors,
        narrators: &book.narrators,
        series: book.series.iter().map(|s| SeriesJson { name: &s.name, index: &s.index }).collect(),
        genres: &book.genres,
        publisher: &book.publisher,
        description: &book.description,
        language: &book.language,
        published_year: book.release_date.as_ref().map(|d| d.year().to_string()),
        published_date: book.release_date.as_ref().and_then(release_date_iso),
    };
    let json = serde_json::to_string_pretty(&doc)?;
    std::fs::write(dir.join("metadata.json"), json)
}

/// `YYYY-MM-DD`, only when we have a full calendar date; a bare year
/// has nothing to format a day/month from.
fn release_date_iso(date: &ReleaseDate) -> Option<String> {
    match date {
        ReleaseDate::Date(d) => {
            let fmt = time::macros::format_description!("[year]-[month]-[day]");
            d.format(&fmt).ok()
        }
        ReleaseDate::Year(_) => None,
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Minimal OPF 2.0 package document: enough `dc:*` fields for an
/// audiobook server to pick up title/author/narrator/series without
/// depending on a full EPUB-metadata crate for one sidecar file.
fn write_metadata_opf(dir: &Path, book: &Book) -> std::io::Result<()> {
    let mut creators = String::new();
    for author in &book.authors {
        let author = xml_escape(author);
        creators.push_str(&format!(
            "    <dc:creator opf:role=\"aut\" opf:file-as=\"{author}\">{author}</dc:creator>\n"
        ));
    }
    for narrator in &book.narrators {
        let narrator = xml_escape(narrator);
        creators.push_str(&format!(
            "    <dc:contributor opf:role=\"nrt\" opf:file-as=\"{narrator}\">{narrator}</dc:contributor>\n"
        ));
    }

    let mut series_meta = String::new();
    for s in &book.series {
        series_meta.push_str(&format!(
            "    <meta name=\"calibre:series\" content=\"{}\"/>\n    <meta name=\"calibre:series_index\" content=\"{}\"/>\n",
            xml_escape(&s.name),
            xml_escape(s.index.as_deref().unwrap_or("1"))
        ));
    }

    let description = book
        .description
        .as_deref()
        .map(|d| format!("    <dc:description>{}</dc:description>\n", xml_escape(d)))
        .unwrap_or_default();

    let publisher = book
        .publisher
        .as_deref()
        .map(|p| format!("    <dc:publisher>{}</dc:publisher>\n", xml_escape(p)))
        .unwrap_or_default();

    let language = format!("    <dc:language>{}</dc:language>\n", xml_escape(book.language.as_deref().unwrap_or("en")));

    let date = book
        .release_date
        .as_ref()
        .map(|d| format!("    <dc:date>{}</dc:date>\n", release_date_opf(d)))
        .unwrap_or_default();

    let opf = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"2.0\">\n  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:opf=\"http://www.idpf.org/2007/opf\">\n    <dc:title>{title}</dc:title>\n{creators}{publisher}{description}{language}{date}{series_meta}    <dc:identifier id=\"bookid\" system=\"ASIN\">{asin}</dc:identifier>\n  </metadata>\n  <manifest>\n    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n    <item id=\"text\" href=\"dummy.html\" media-type=\"application/xhtml+xml\"/>\n  </manifest>\n  <spine toc=\"ncx\">\n    <itemref idref=\"text\"/>\n  </spine>\n</package>\n",
        asin = xml_escape(&book.asin),
        title = xml_escape(&book.title),
    );
    std::fs::write(dir.join("metadata.opf"), opf)
}

/// `YYYY-MM-DD`, falling back to `YYYY-01-01` when only a bare year is
/// known — `<dc:date>` has no single-field form.
fn release_date_opf(date: &ReleaseDate) -> String {
    match date {
        ReleaseDate::Date(_) => release_date_iso(date).unwrap_or_default(),
        ReleaseDate::Year(y) => format!("{y}-01-01"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abr_model::SeriesEntry;
    use tempfile::tempdir;

    fn book() -> Book {
        Book {
            asin: "B0AAA00001".to_string(),
            title: "Quiet".to_string(),
            subtitle: None,
            authors: vec!["Susan Cain".to_string()],
            narrators: vec!["Kathe Mazur".to_string()],
            cover_url: None,
            release_date: Some(ReleaseDate::Year(2012)),
            runtime_minutes: Some(640),
            series: vec![SeriesEntry { name: "Self Help".to_string(), index: Some("1".to_string()) }],
            genres: vec!["Nonfiction".to_string()],
            publisher: Some("Random House".to_string()),
            description: Some("A book about introverts".to_string()),
            language: Some("en".to_string()),
        }
    }

    #[test]
    fn metadata_json_round_trips_through_serde() {
        let dir = tempdir().unwrap();
        write_metadata_json(dir.path(), &book()).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("metadata.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["asin"], "B0AAA00001");
        assert_eq!(parsed["publishedYear"], "2012");
        assert_eq!(parsed["publishedDate"], serde_json::Value::Null);
    }

    #[test]
    fn metadata_json_published_date_from_full_date() {
        let dir = tempdir().unwrap();
        let mut b = book();
        b.release_date = Some(ReleaseDate::Date(time::macros::date!(2012 - 06 - 11)));
        write_metadata_json(dir.path(), &b).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("metadata.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["publishedYear"], "2012");
        assert_eq!(parsed["publishedDate"], "2012-06-11");
    }

    #[test]
    fn metadata_opf_escapes_ampersands() {
        let dir = tempdir().unwrap();
        let mut b = book();
        b.title = "Rock & Roll".to_string();
        write_metadata_opf(dir.path(), &b).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("metadata.opf")).unwrap();
        assert!(raw.contains("Rock &amp; Roll"));
    }

    #[test]
    fn metadata_opf_has_contributor_file_as_date_manifest_and_spine() {
        let dir = tempdir().unwrap();
        write_metadata_opf(dir.path(), &book()).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("metadata.opf")).unwrap();
        assert!(raw.contains("<dc:creator opf:role=\"aut\" opf:file-as=\"Susan Cain\">Susan Cain</dc:creator>"));
        assert!(raw.contains("<dc:contributor opf:role=\"nrt\" opf:file-as=\"Kathe Mazur\">Kathe Mazur</dc:contributor>"));
        assert!(raw.contains("<dc:date>2012-01-01</dc:date>"));
        assert!(raw.contains("<dc:identifier id=\"bookid\" system=\"ASIN\">B0AAA00001</dc:identifier>"));
        assert!(raw.contains("unique-identifier=\"bookid\""));
        assert!(raw.contains("<item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>"));
        assert!(raw.contains("<item id=\"text\" href=\"dummy.html\" media-type=\"application/xhtml+xml\"/>"));
        assert!(raw.contains("<spine toc=\"ncx\">"));
        assert!(raw.contains("<itemref idref=\"text\"/>"));
    }

    #[test]
    fn metadata_opf_writes_a_series_meta_pair_per_series() {
        let dir = tempdir().unwrap();
        let mut b = book();
        b.series.push(SeriesEntry { name: "Second Series".to_string(), index: Some("3".to_string()) });
        write_metadata_opf(dir.path(), &b).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("metadata.opf")).unwrap();
        assert!(raw.contains("<meta name=\"calibre:series\" content=\"Self Help\"/>"));
        assert!(raw.contains("<meta name=\"calibre:series\" content=\"Second Series\"/>"));
        assert!(raw.contains("<meta name=\"calibre:series_index\" content=\"3\"/>"));
    }

    #[test]
    fn content_type_extension_maps_known_image_types() {
        assert_eq!(content_type_extension(Some("image/jpeg; charset=binary")), Some("jpg".to_string()));
        assert_eq!(content_type_extension(Some("text/html")), None);
    }

    #[test]
    fn place_file_hardlinks_within_same_filesystem() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.mp3");
        std::fs::write(&src, b"data").unwrap();
        let dest = dir.path().join("dest.mp3");
        place_file(&src, &dest, false).unwrap();
        assert!(dest.exists());
        assert!(src.exists());
    }
}
