use std::fmt;
use std::str::FromStr;

/// The request lifecycle, modeled as a tagged sum instead of a free-form
/// status string. `Display`/`FromStr` round-trip through the `failed:`
/// taxonomy the rest of the system expects, so the durable store can
/// keep storing a plain string column (`abr-db` serializes via these
/// impls).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProcessingStatus {
    Pending,
    DownloadInitiated,
    Queued,
    OrganizingFiles,
    GeneratingMetadata,
    SavingCover,
    Completed,
    ReviewRequired,
    Failed(String),
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Completed
                | ProcessingStatus::Failed(_)
                | ProcessingStatus::ReviewRequired
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProcessingStatus::Failed(_))
    }

    /// Ordinal position along the happy path. `Failed` and
    /// `ReviewRequired` have no ordinal — they are reached
    /// from anywhere and are not compared for monotonicity.
    pub fn happy_path_ordinal(&self) -> Option<u8> {
        match self {
            ProcessingStatus::Pending => Some(0),
            ProcessingStatus::DownloadInitiated => Some(1),
            ProcessingStatus::Queued => Some(2),
            ProcessingStatus::OrganizingFiles => Some(3),
            ProcessingStatus::GeneratingMetadata => Some(4),
            ProcessingStatus::SavingCover => Some(5),
            ProcessingStatus::Completed => Some(6),
            ProcessingStatus::Failed(_) | ProcessingStatus::ReviewRequired => None,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::DownloadInitiated => write!(f, "download_initiated"),
            ProcessingStatus::Queued => write!(f, "queued"),
            ProcessingStatus::OrganizingFiles => write!(f, "organizing_files"),
            ProcessingStatus::GeneratingMetadata => write!(f, "generating_metadata"),
            ProcessingStatus::SavingCover => write!(f, "saving_cover"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::ReviewRequired => write!(f, "review_required"),
            ProcessingStatus::Failed(reason) => write!(f, "failed:{reason}"),
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => ProcessingStatus::Pending,
            "download_initiated" => ProcessingStatus::DownloadInitiated,
            "queued" => ProcessingStatus::Queued,
            "organizing_files" => ProcessingStatus::OrganizingFiles,
            "generating_metadata" => ProcessingStatus::GeneratingMetadata,
            "saving_cover" => ProcessingStatus::SavingCover,
            "completed" => ProcessingStatus::Completed,
            "review_required" => ProcessingStatus::ReviewRequired,
            other => match other.strip_prefix("failed:") {
                Some(reason) => ProcessingStatus::Failed(reason.to_string()),
                None => ProcessingStatus::Failed(other.to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::DownloadInitiated,
            ProcessingStatus::Queued,
            ProcessingStatus::OrganizingFiles,
            ProcessingStatus::GeneratingMetadata,
            ProcessingStatus::SavingCover,
            ProcessingStatus::Completed,
            ProcessingStatus::ReviewRequired,
            ProcessingStatus::Failed("torrent missing".to_string()),
        ] {
            let s = status.to_string();
            assert_eq!(ProcessingStatus::from_str(&s).unwrap(), status);
        }
    }

    #[test]
    fn ordinals_are_non_decreasing_along_happy_path() {
        let path = [
            ProcessingStatus::Pending,
            ProcessingStatus::DownloadInitiated,
            ProcessingStatus::Queued,
            ProcessingStatus::OrganizingFiles,
            ProcessingStatus::GeneratingMetadata,
            ProcessingStatus::SavingCover,
            ProcessingStatus::Completed,
        ];
        let ordinals: Vec<_> = path.iter().map(|s| s.happy_path_ordinal().unwrap()).collect();
        assert!(ordinals.windows(2).all(|w| w[0] < w[1]));
    }
}
