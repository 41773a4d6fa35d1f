//! Worker startup parameters.

use tablefleet_types::{Amount, FleetError, WorkerId};

/// Validated launch parameters of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerParams {
    pub id: WorkerId,
    pub target_url: String,
    /// Highest call amount a check may turn into a call for.
    pub threshold: Amount,
}

impl WorkerParams {
    /// Validate raw parameters as received from flags or environment.
    ///
    /// A missing or invalid identity or target URL is fatal. A missing,
    /// unparseable or zero threshold falls back to `default_threshold` units.
    pub fn from_raw(
        id: Option<&str>,
        target_url: Option<&str>,
        threshold: Option<&str>,
        default_threshold: u64,
    ) -> Result<Self, FleetError> {
        let id = id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| FleetError::StartupError("worker id is required".into()))?
            .parse::<WorkerId>()
            .map_err(FleetError::StartupError)?;

        let target_url = validate_url(target_url)?;
        let threshold = parse_threshold(threshold, default_threshold);

        Ok(Self {
            id,
            target_url,
            threshold,
        })
    }
}

/// Require a non-empty http(s) target URL.
pub fn validate_url(raw: Option<&str>) -> Result<String, FleetError> {
    let url = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FleetError::StartupError("target URL is required".into()))?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(FleetError::StartupError(format!(
            "target URL must be http(s), got {url:?}"
        )));
    }
    Ok(url.to_string())
}

/// Parse a call threshold, falling back to `default_units` when it is
/// missing, unparseable or zero.
pub fn parse_threshold(raw: Option<&str>, default_units: u64) -> Amount {
    match raw.and_then(Amount::parse) {
        Some(amount) if !amount.is_zero() => amount,
        _ => {
            if let Some(raw) = raw {
                tracing::warn!(raw, default = default_units, "invalid call threshold, using default");
            }
            Amount::from_units(default_units)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_parameters_pass() {
        let params =
            WorkerParams::from_raw(Some("2"), Some(" https://t.example/r "), Some("$250"), 1000)
                .unwrap();
        assert_eq!(params.id, WorkerId(2));
        assert_eq!(params.target_url, "https://t.example/r");
        assert_eq!(params.threshold, Amount::from_units(250));
    }

    #[test]
    fn missing_or_bad_identity_is_fatal() {
        for id in [None, Some(""), Some("-1"), Some("two")] {
            let err = WorkerParams::from_raw(id, Some("https://t.example"), None, 1000).unwrap_err();
            assert!(matches!(err, FleetError::StartupError(_)), "{id:?}");
        }
    }

    #[test]
    fn missing_or_bad_url_is_fatal() {
        for url in [None, Some("  "), Some("ftp://t.example")] {
            assert!(WorkerParams::from_raw(Some("0"), url, None, 1000).is_err());
        }
    }

    #[test]
    fn bad_threshold_falls_back_to_default() {
        let default = Amount::from_units(1000);
        assert_eq!(parse_threshold(None, 1000), default);
        assert_eq!(parse_threshold(Some("lots"), 1000), default);
        assert_eq!(parse_threshold(Some("0"), 1000), default);
        assert_eq!(parse_threshold(Some("-5"), 1000), default);
        assert_eq!(parse_threshold(Some("1,500"), 1000), Amount::from_units(1500));
    }
}
