//! JSON-lines playback samples fed through the engine.

use std::io::BufRead;

use anyhow::{Context, bail};
use reelmark_core::ProgressEngine;
use reelmark_model::{UnitId, UnitKind};
use serde::{Deserialize, Serialize};

/// One line of a sample file: either a playback position or a watched
/// toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub unit_id: String,
    pub kind: UnitKind,
    #[serde(default)]
    pub position: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub watched: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub samples: usize,
    pub toggles: usize,
}

/// Parses a sample stream. Blank lines and `#` comments are ignored.
pub fn parse_samples(reader: impl BufRead) -> anyhow::Result<Vec<Sample>> {
    let mut samples = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line
            .with_context(|| format!("failed to read line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let sample: Sample = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid sample on line {line_no}"))?;
        UnitId::parse(&sample.unit_id)
            .with_context(|| format!("invalid unit id on line {line_no}"))?;
        if sample.watched.is_none() && sample.position.is_none() {
            bail!("line {line_no}: sample needs `position` or `watched`");
        }
        samples.push(sample);
    }

    Ok(samples)
}

/// Applies samples in order. Watched toggles are flushed immediately, the
/// way a "mark watched" button would.
pub async fn replay(
    engine: &ProgressEngine,
    samples: &[Sample],
) -> ReplayStats {
    let mut stats = ReplayStats::default();

    for sample in samples {
        let unit_id = UnitId::from(sample.unit_id.as_str());
        match sample.watched {
            Some(watched) => {
                engine
                    .set_watched(unit_id, sample.kind, watched, sample.duration)
                    .await;
                stats.toggles += 1;
            }
            None => {
                engine.upsert_from_sample(
                    unit_id,
                    sample.kind,
                    sample.position.unwrap_or_default(),
                    sample.duration.unwrap_or_default(),
                );
                stats.samples += 1;
            }
        }
    }

    stats
}
