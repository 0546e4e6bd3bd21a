//! Well-known config keys. Not exhaustive; callers may read arbitrary
//! keys through `ConfigStore` directly.

pub const LIBRARY_PATH: &str = "library_path";
pub const FOLDER_PATTERN: &str = "folder_pattern";
pub const FILE_PATTERN: &str = "file_pattern";
pub const USE_SERIES_FOLDERS: &str = "use_series_folders";

pub const QBIT_HOST: &str = "qbit_host";
pub const QBIT_PORT: &str = "qbit_port";
pub const QBIT_USER: &str = "qbit_user";
pub const QBIT_PASS: &str = "qbit_pass";
pub const QBIT_CATEGORY: &str = "qbit_category";
pub const QBIT_SAVE_PATH: &str = "qbit_save_path";
pub const QBIT_ENABLED: &str = "qbit_enabled";
pub const QBIT_COMPLETE_ACTION: &str = "qbit_complete_action";

pub const PROWLARR_BASE_URL: &str = "prowlarr_base_url";
pub const PROWLARR_API_KEY: &str = "prowlarr_api_key";
pub const PROWLARR_CATEGORIES: &str = "prowlarr_categories";
pub const PROWLARR_INDEXERS: &str = "prowlarr_indexers";
pub const PROWLARR_SOURCE_TTL: &str = "prowlarr_source_ttl";

pub const QUALITY_FLAC: &str = "quality_flac";
pub const QUALITY_M4B: &str = "quality_m4b";
pub const QUALITY_MP3: &str = "quality_mp3";
pub const QUALITY_UNKNOWN_AUDIO: &str = "quality_unknown_audio";
pub const QUALITY_UNKNOWN: &str = "quality_unknown";

pub const MIN_SEEDERS: &str = "min_seeders";
pub const NAME_EXISTS_RATIO: &str = "name_exists_ratio";
pub const TITLE_EXISTS_RATIO: &str = "title_exists_ratio";
pub const INDEXER_FLAGS: &str = "indexer_flags";

pub const AUTO_DOWNLOAD: &str = "auto_download";
pub const DEFAULT_REGION: &str = "default_region";

pub const ABS_BASE_URL: &str = "abs_base_url";
pub const ABS_API_TOKEN: &str = "abs_api_token";
pub const ABS_LIBRARY_ID: &str = "abs_library_id";
pub const ABS_CHECK_DOWNLOADED: &str = "abs_check_downloaded";

pub const BOOK_CACHE_TTL_SECS: &str = "book_cache_ttl_secs";
pub const METADATA_SEARCH_TTL_SECS: &str = "metadata_search_ttl_secs";
pub const PROWLARR_SEARCH_LIMIT: &str = "prowlarr_search_limit";
pub const COMPLETE_ACTION_DEFAULT: &str = "copy";

pub const RANKING_WEIGHT_QUALITY: &str = "ranking_weight_quality";
pub const RANKING_WEIGHT_SEEDERS: &str = "ranking_weight_seeders";
pub const RANKING_WEIGHT_INDEXER_FLAGS: &str = "ranking_weight_indexer_flags";
pub const RANKING_WEIGHT_TITLE_AFFINITY: &str = "ranking_weight_title_affinity";
