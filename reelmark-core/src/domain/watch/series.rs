//! Series-level status derived from per-episode cache entries.
//!
//! There is no stored per-series record in the normal case: episodes are
//! keyed `<series>:ep:<episode>` and the summary is recomputed on demand.

use reelmark_model::{ProgressRecord, SeriesSummary, SummarySource, UnitId};

use super::cache::ProgressCache;

/// Aggregates the cached episodes of `series_id`.
///
/// `total_episodes` is the catalog's episode count when known. Without it,
/// "watched" can only mean every episode the viewer ever touched is watched.
/// With it, the percent is spread over all `N` episodes and never exceeds
/// 100 even when more than `N` distinct episode keys were tracked.
///
/// Returns `None` when neither episodes nor a series-level record exist.
pub fn summarize_series(
    cache: &ProgressCache,
    series_id: &UnitId,
    total_episodes: Option<u32>,
) -> Option<SeriesSummary> {
    let prefix = series_id.episode_prefix();

    let mut tracked: u32 = 0;
    let mut watched: u32 = 0;
    let mut percent_sum = 0.0_f64;
    let mut resume: Option<&ProgressRecord> = None;

    for record in cache
        .iter()
        .filter(|record| record.unit_id.as_str().starts_with(&prefix))
    {
        tracked += 1;
        percent_sum += record.percent.clamp(0.0, 100.0);

        if record.is_watched {
            watched += 1;
        } else if record.percent > 0.0
            && resume.is_none_or(|current| {
                record.updated_at > current.updated_at
            })
        {
            resume = Some(record);
        }
    }

    if tracked == 0 {
        return cache.get(series_id).map(|record| SeriesSummary {
            series_id: series_id.clone(),
            percent: record.percent,
            is_watched: record.is_watched,
            tracked_episodes: 0,
            watched_episodes: 0,
            in_progress: record.is_in_progress(),
            resume_episode: None,
            source: SummarySource::SeriesRecord,
        });
    }

    let known_total = total_episodes.filter(|n| *n > 0);
    let denominator = f64::from(known_total.unwrap_or(tracked));
    let is_watched = match known_total {
        Some(total) => watched >= total,
        None => watched >= tracked,
    };

    Some(SeriesSummary {
        series_id: series_id.clone(),
        percent: (percent_sum / denominator).min(100.0),
        is_watched,
        tracked_episodes: tracked,
        watched_episodes: watched,
        in_progress: resume.is_some(),
        resume_episode: resume.map(|record| record.unit_id.clone()),
        source: SummarySource::Episodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use reelmark_model::UnitKind;

    fn episode(
        series: &UnitId,
        number: u32,
        position: f64,
        secs: i64,
    ) -> ProgressRecord {
        ProgressRecord::from_sample(
            UnitId::episode(series, number),
            UnitKind::Episode,
            position,
            100.0,
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
    }

    #[test]
    fn known_total_spreads_over_untouched_episodes() {
        let series = UnitId::series("S");
        let mut cache = ProgressCache::new();
        cache.insert(episode(&series, 1, 100.0, 0));
        cache.insert(episode(&series, 2, 100.0, 1));
        cache.insert(episode(&series, 3, 50.0, 2));

        let summary = summarize_series(&cache, &series, Some(4)).unwrap();
        assert_eq!(summary.percent, 62.5);
        assert!(!summary.is_watched);
        assert_eq!(summary.tracked_episodes, 3);
        assert_eq!(summary.watched_episodes, 2);
        assert!(summary.in_progress);
        assert_eq!(
            summary.resume_episode,
            Some(UnitId::episode(&series, 3))
        );
        assert_eq!(summary.source, SummarySource::Episodes);
    }

    #[test]
    fn unknown_total_uses_tracked_episodes() {
        let series = UnitId::series(9);
        let mut cache = ProgressCache::new();
        cache.insert(episode(&series, 1, 100.0, 0));
        cache.insert(episode(&series, 2, 90.0, 1));

        let summary = summarize_series(&cache, &series, None).unwrap();
        assert_eq!(summary.percent, 95.0);
        assert!(summary.is_watched);
        assert!(!summary.in_progress);

        // A zero count is treated as unknown.
        let zero = summarize_series(&cache, &series, Some(0)).unwrap();
        assert_eq!(zero, summary);
    }

    #[test]
    fn extra_tracked_episodes_never_exceed_full() {
        let series = UnitId::series(3);
        let mut cache = ProgressCache::new();
        for number in 1..=5 {
            cache.insert(episode(&series, number, 100.0, 0));
        }

        let summary = summarize_series(&cache, &series, Some(4)).unwrap();
        assert_eq!(summary.percent, 100.0);
        assert!(summary.is_watched);
    }

    #[test]
    fn other_series_are_ignored() {
        let series = UnitId::series(1);
        let sibling = UnitId::series(10);
        let mut cache = ProgressCache::new();
        cache.insert(episode(&sibling, 1, 100.0, 0));

        assert_eq!(summarize_series(&cache, &series, Some(2)), None);
    }

    #[test]
    fn falls_back_to_series_record() {
        let series = UnitId::series(5);
        let mut cache = ProgressCache::new();
        cache.insert(ProgressRecord::forced(
            series.clone(),
            UnitKind::Series,
            true,
            None,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        ));

        let summary = summarize_series(&cache, &series, Some(10)).unwrap();
        assert_eq!(summary.source, SummarySource::SeriesRecord);
        assert!(summary.is_watched);
        assert_eq!(summary.percent, 100.0);
    }

    #[test]
    fn most_recent_partial_episode_is_the_resume_hint() {
        let series = UnitId::series(2);
        let mut cache = ProgressCache::new();
        cache.insert(episode(&series, 1, 30.0, 10));
        cache.insert(episode(&series, 4, 20.0, 50));
        cache.insert(episode(&series, 2, 100.0, 90));

        let summary = summarize_series(&cache, &series, None).unwrap();
        assert_eq!(
            summary.resume_episode,
            Some(UnitId::episode(&series, 4))
        );
    }
}
