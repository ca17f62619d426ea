use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, Result};

/// Kind of trackable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UnitKind {
    Movie,
    Series,
    Episode,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Movie => "movie",
            UnitKind::Series => "series",
            UnitKind::Episode => "episode",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(UnitKind::Movie),
            "series" => Ok(UnitKind::Series),
            "episode" => Ok(UnitKind::Episode),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }
}

/// Composite key of a trackable unit.
///
/// Layout is `<kind>:<ownerId>[:<subkind>:<subId>]`:
///
/// - `movie:7`
/// - `series:12`
/// - `series:12:ep:3` (episode `3` of series `12`)
///
/// Episode ids always embed [`UnitId::EPISODE_MARKER`] so the parent series
/// can be recovered by truncating at the marker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UnitId(String);

impl UnitId {
    pub const EPISODE_MARKER: &'static str = ":ep:";

    pub fn movie(id: impl fmt::Display) -> Self {
        UnitId(format!("movie:{id}"))
    }

    pub fn series(id: impl fmt::Display) -> Self {
        UnitId(format!("series:{id}"))
    }

    pub fn episode(series: &UnitId, episode: impl fmt::Display) -> Self {
        UnitId(format!("{}{}{episode}", series.0, Self::EPISODE_MARKER))
    }

    /// Parses and validates a raw key coming from outside the process.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let Some((prefix, rest)) = trimmed.split_once(':') else {
            return Err(ModelError::InvalidUnitId(raw.to_string()));
        };
        if rest.is_empty() || prefix.parse::<UnitKind>().is_err() {
            return Err(ModelError::InvalidUnitId(raw.to_string()));
        }
        if let Some((_, episode)) = trimmed.split_once(Self::EPISODE_MARKER)
            && episode.is_empty()
        {
            return Err(ModelError::InvalidUnitId(raw.to_string()));
        }
        Ok(UnitId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Kind implied by the key layout, if the prefix is recognised.
    pub fn kind(&self) -> Option<UnitKind> {
        if self.is_episode() {
            return Some(UnitKind::Episode);
        }
        let (prefix, _) = self.0.split_once(':')?;
        prefix.parse().ok()
    }

    pub fn is_episode(&self) -> bool {
        self.0.contains(Self::EPISODE_MARKER)
    }

    /// Parent series of an episode key.
    pub fn series_id(&self) -> Option<UnitId> {
        self.0
            .find(Self::EPISODE_MARKER)
            .map(|idx| UnitId(self.0[..idx].to_string()))
    }

    /// Prefix shared by every episode key of this series.
    pub fn episode_prefix(&self) -> String {
        format!("{}{}", self.0, Self::EPISODE_MARKER)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        UnitId(value.to_string())
    }
}

impl From<String> for UnitId {
    fn from(value: String) -> Self {
        UnitId(value)
    }
}

impl AsRef<str> for UnitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of the signed-in viewer that owns a set of progress records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ViewerId(String);

impl ViewerId {
    pub fn new(id: impl Into<String>) -> Self {
        ViewerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewerId {
    fn from(value: &str) -> Self {
        ViewerId(value.to_string())
    }
}
