//! Progress record for a single trackable unit and its derived fields.
//!
//! A record is always replaced as a whole: samples from the player produce a
//! fresh record, and records loaded from the remote store replace whatever
//! the cache held for the same key.

use chrono::{DateTime, Utc};

use crate::error::{ModelError, Result};
use crate::ids::{UnitId, UnitKind};

/// Percent at or above which a unit counts as watched.
pub const WATCHED_THRESHOLD: f64 = 85.0;

/// Seconds subtracted from the stored position when resuming.
pub const RESUME_BACK_OFFSET: f64 = 1.0;

/// Resuming never lands within this many seconds of the end.
pub const END_GUARD_OFFSET: f64 = 15.0;

/// Latest known playback state of one movie, series aggregate or episode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressRecord {
    pub unit_id: UnitId,
    pub kind: UnitKind,
    /// Seconds elapsed.
    pub position: f64,
    /// Total seconds, `0` when unknown.
    pub duration: f64,
    /// Derived completion in `0..=100`.
    pub percent: f64,
    pub is_watched: bool,
    pub updated_at: DateTime<Utc>,
}

/// Clamps player-reported seconds: negative, NaN and infinite become `0`.
pub fn sanitize_seconds(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Completion percent for a position, `0` when the duration is unknown.
pub fn percent_of(position: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        (position * 100.0 / duration).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

impl ProgressRecord {
    /// Builds a record from a player sample.
    pub fn from_sample(
        unit_id: UnitId,
        kind: UnitKind,
        position: f64,
        duration: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let position = sanitize_seconds(position);
        let duration = sanitize_seconds(duration);
        let percent = percent_of(position, duration);

        Self {
            unit_id,
            kind,
            position,
            duration,
            percent,
            is_watched: percent >= WATCHED_THRESHOLD,
            updated_at: now,
        }
    }

    /// Builds a record for a manual "mark watched / unwatched" action.
    ///
    /// The position is moved to the end (watched) or the start (unwatched)
    /// so a later resume stays consistent with the flag.
    pub fn forced(
        unit_id: UnitId,
        kind: UnitKind,
        watched: bool,
        known_duration: Option<f64>,
        now: DateTime<Utc>,
    ) -> Self {
        let duration = known_duration.map(sanitize_seconds).unwrap_or(0.0);
        let (position, percent) = if watched {
            (duration, 100.0)
        } else {
            (0.0, 0.0)
        };

        Self {
            unit_id,
            kind,
            position,
            duration,
            percent,
            is_watched: watched,
            updated_at: now,
        }
    }

    pub fn is_started(&self) -> bool {
        self.percent > 0.0 || self.position > 0.0
    }

    /// Started but not yet watched.
    pub fn is_in_progress(&self) -> bool {
        !self.is_watched && self.is_started()
    }

    /// Position to resume playback from, `None` once watched.
    ///
    /// `duration` is the length the player currently knows about; when it is
    /// not positive the stored duration is used instead. With no known length
    /// at all the position is only backed off, never clamped.
    pub fn resume_position(&self, duration: f64) -> Option<f64> {
        if self.is_watched {
            return None;
        }

        let backed_off = (self.position - RESUME_BACK_OFFSET).max(0.0);
        let total = match sanitize_seconds(duration) {
            d if d > 0.0 => d,
            _ => self.duration,
        };

        if total > 0.0 {
            Some(backed_off.min((total - END_GUARD_OFFSET).max(0.0)))
        } else {
            Some(backed_off)
        }
    }
}

/// Loosely typed row handed back by a remote store.
///
/// Hosted data services return whatever was written, so every field is
/// validated again before it reaches the cache.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RemoteProgressRow {
    pub unit_id: String,
    pub kind: String,
    pub position: f64,
    pub duration: f64,
    pub percent: f64,
    pub is_watched: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProgressRecord> for RemoteProgressRow {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            unit_id: record.unit_id.as_str().to_string(),
            kind: record.kind.as_str().to_string(),
            position: record.position,
            duration: record.duration,
            percent: record.percent,
            is_watched: record.is_watched,
            updated_at: record.updated_at,
        }
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ModelError::InvalidValue { field, value })
    }
}

impl TryFrom<RemoteProgressRow> for ProgressRecord {
    type Error = ModelError;

    fn try_from(row: RemoteProgressRow) -> Result<Self> {
        // Keys are taken as written: the engine stores whatever id the
        // player handed it, so only a blank key counts as corrupt.
        if row.unit_id.trim().is_empty() {
            return Err(ModelError::InvalidUnitId(row.unit_id));
        }
        let kind: UnitKind = row.kind.parse()?;

        let position = non_negative("position", row.position)?;
        let duration = non_negative("duration", row.duration)?;
        let percent = non_negative("percent", row.percent)?;
        if percent > 100.0 {
            return Err(ModelError::InvalidValue {
                field: "percent",
                value: percent,
            });
        }

        Ok(Self {
            unit_id: UnitId::from(row.unit_id),
            kind,
            position,
            duration,
            percent,
            is_watched: row.is_watched,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn threshold_sample_is_watched() {
        let record = ProgressRecord::from_sample(
            UnitId::movie(7),
            UnitKind::Movie,
            170.0,
            200.0,
            at(0),
        );
        assert_eq!(record.percent, 85.0);
        assert!(record.is_watched);
        assert_eq!(record.resume_position(200.0), None);
    }

    #[test]
    fn invalid_samples_are_clamped() {
        let record = ProgressRecord::from_sample(
            UnitId::movie(1),
            UnitKind::Movie,
            f64::NAN,
            -30.0,
            at(0),
        );
        assert_eq!(record.position, 0.0);
        assert_eq!(record.duration, 0.0);
        assert_eq!(record.percent, 0.0);
        assert!(!record.is_watched);

        let overshoot = ProgressRecord::from_sample(
            UnitId::movie(1),
            UnitKind::Movie,
            500.0,
            200.0,
            at(0),
        );
        assert_eq!(overshoot.percent, 100.0);
        assert!(overshoot.is_watched);
    }

    #[test]
    fn resume_backs_off_and_guards_the_end() {
        let record = ProgressRecord::from_sample(
            UnitId::movie(2),
            UnitKind::Movie,
            60.0,
            1000.0,
            at(0),
        );
        assert_eq!(record.resume_position(1000.0), Some(59.0));

        // Player now reports a shorter cut; stay clear of the last seconds.
        assert_eq!(record.resume_position(70.0), Some(55.0));
        // Shorter than the guard itself.
        assert_eq!(record.resume_position(10.0), Some(0.0));
        // Unknown player duration falls back to the stored one.
        assert_eq!(record.resume_position(0.0), Some(59.0));

        let start = ProgressRecord::from_sample(
            UnitId::movie(3),
            UnitKind::Movie,
            0.4,
            1000.0,
            at(0),
        );
        assert_eq!(start.resume_position(1000.0), Some(0.0));
    }

    #[test]
    fn forced_records_ignore_position() {
        let watched = ProgressRecord::forced(
            UnitId::movie(4),
            UnitKind::Movie,
            true,
            Some(5400.0),
            at(0),
        );
        assert_eq!(watched.percent, 100.0);
        assert!(watched.is_watched);
        assert_eq!(watched.position, 5400.0);

        let unwatched = ProgressRecord::forced(
            UnitId::movie(4),
            UnitKind::Movie,
            false,
            None,
            at(0),
        );
        assert_eq!(unwatched.percent, 0.0);
        assert!(!unwatched.is_watched);
        assert!(!unwatched.is_started());
    }

    fn row(unit_id: &str, kind: &str) -> RemoteProgressRow {
        RemoteProgressRow {
            unit_id: unit_id.to_string(),
            kind: kind.to_string(),
            position: 10.0,
            duration: 100.0,
            percent: 10.0,
            is_watched: false,
            updated_at: at(5),
        }
    }

    #[test]
    fn rows_round_trip_into_records() {
        let record = ProgressRecord::try_from(row("series:4:ep:2", "episode"))
            .expect("valid row");
        assert_eq!(record.kind, UnitKind::Episode);
        assert_eq!(record.updated_at, at(5));
        assert_eq!(
            RemoteProgressRow::from(&record),
            row("series:4:ep:2", "episode")
        );
    }

    #[test]
    fn malformed_rows_are_rejected() {
        assert!(ProgressRecord::try_from(row("movie:1", "song")).is_err());
        assert!(ProgressRecord::try_from(row("", "movie")).is_err());
        assert!(ProgressRecord::try_from(row("  ", "episode")).is_err());

        let mut negative = row("movie:1", "movie");
        negative.position = -1.0;
        assert!(ProgressRecord::try_from(negative).is_err());

        let mut overflow = row("movie:1", "movie");
        overflow.percent = 130.0;
        assert!(ProgressRecord::try_from(overflow).is_err());
    }

    #[test]
    fn any_key_the_engine_writes_loads_back() {
        let odd = [
            (UnitId::from("show:5"), UnitKind::Series),
            (UnitId::movie(9), UnitKind::Episode),
            (UnitId::from("series:1"), UnitKind::Episode),
        ];
        for (unit_id, kind) in odd {
            let record =
                ProgressRecord::from_sample(unit_id, kind, 30.0, 100.0, at(1));
            let loaded =
                ProgressRecord::try_from(RemoteProgressRow::from(&record))
                    .expect("engine-written row");
            assert_eq!(loaded, record);
        }
    }
}
