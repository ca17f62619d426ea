use crate::ids::UnitId;

/// Which records a [`SeriesSummary`] was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SummarySource {
    /// Aggregated from per-episode records.
    Episodes,
    /// No episode records; a series-level record was used directly.
    SeriesRecord,
}

/// Aggregated watch status of a multi-episode title.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesSummary {
    pub series_id: UnitId,
    /// Completion in `0..=100`.
    pub percent: f64,
    pub is_watched: bool,
    pub tracked_episodes: u32,
    pub watched_episodes: u32,
    /// At least one episode is started but not watched.
    pub in_progress: bool,
    /// Most recently touched partially watched episode.
    pub resume_episode: Option<UnitId>,
    pub source: SummarySource,
}
