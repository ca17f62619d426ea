use thiserror::Error;

use super::models::Config;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
    #[error("event_capacity must be at least 1")]
    ZeroEventCapacity,
    #[error("retry.backoff_factor must be a finite number, got {value}")]
    InvalidBackoffFactor { value: f32 },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let engine = &config.engine;
    let mut warnings = ConfigWarnings::default();

    if engine.retry_interval_ms == 0 {
        // A zero cadence would spin the scheduler against the store.
        return Err(ConfigGuardRailError::ZeroInterval {
            field: "retry_interval_ms",
        });
    }
    if engine.event_capacity == 0 {
        return Err(ConfigGuardRailError::ZeroEventCapacity);
    }
    if !engine.retry.backoff_factor.is_finite() {
        return Err(ConfigGuardRailError::InvalidBackoffFactor {
            value: engine.retry.backoff_factor,
        });
    }

    if engine.debounce_ms == 0 {
        warnings.push_with_hint(
            "debounce_ms is 0; every sample is written to the store",
            "Use a debounce of a few seconds to coalesce player samples",
        );
    }
    if engine.retry.backoff_factor < 1.0 {
        warnings.push_with_hint(
            format!(
                "retry.backoff_factor {} is below 1.0 and is treated as 1.0",
                engine.retry.backoff_factor
            ),
            "Set 1.0 for a fixed retry cadence or a larger value to back off",
        );
    }
    if engine.retry.max_interval_ms < engine.retry_interval_ms {
        warnings.push(format!(
            "retry.max_interval_ms ({}) is below retry_interval_ms ({}); \
             the retry interval is used as the cap",
            engine.retry.max_interval_ms, engine.retry_interval_ms
        ));
    }
    if engine.debounce_ms >= engine.retry_interval_ms {
        warnings.push(
            "debounce_ms is not shorter than retry_interval_ms; writes only \
             go out on the retry cadence",
        );
    }

    Ok(warnings)
}
