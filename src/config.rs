use crate::imports::*;
use serde::{Deserialize, Serialize};

/*
    Types:
    * Config - Validated timing and logging settings shared by every node of a query chain
    * PartialConfig - User supplied overrides, merged over the defaults
*/
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub wait_timeout_milliseconds: u64,
    pub min_poll_period_milliseconds: u64,
    pub poll_times: u32,
    pub should_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            wait_timeout_milliseconds: 5000,
            min_poll_period_milliseconds: 10,
            poll_times: 5,
            should_log: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_milliseconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_poll_period_milliseconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_times: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_log: Option<bool>,
}

const NUMERIC_FIELDS: [&str; 3] = [
    "waitTimeoutMilliseconds",
    "minPollPeriodMilliseconds",
    "pollTimes",
];

impl Config {
    pub fn validate(&self) -> QueryResult<()> {
        if self.min_poll_period_milliseconds > self.wait_timeout_milliseconds {
            return Err(QueryError::new(
                ErrorKind::Argument,
                format!(
                    "'minPollPeriodMilliseconds' ({}ms) cannot be greater than 'waitTimeoutMilliseconds' ({}ms)",
                    self.min_poll_period_milliseconds, self.wait_timeout_milliseconds
                ),
            ));
        }
        if self.poll_times < 2 {
            return Err(QueryError::new(
                ErrorKind::Argument,
                format!("'pollTimes' ({}) cannot be less than 2", self.poll_times),
            ));
        }
        Ok(())
    }

    pub fn from_partial(partial: PartialConfig) -> QueryResult<Config> {
        let defaults = Config::default();
        let config = Config {
            wait_timeout_milliseconds: partial
                .wait_timeout_milliseconds
                .unwrap_or(defaults.wait_timeout_milliseconds),
            min_poll_period_milliseconds: partial
                .min_poll_period_milliseconds
                .unwrap_or(defaults.min_poll_period_milliseconds),
            poll_times: partial.poll_times.unwrap_or(defaults.poll_times),
            should_log: partial.should_log.unwrap_or(defaults.should_log),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON object of overrides. Numeric fields must hold non-negative
    /// numbers; unknown keys are ignored.
    pub fn from_json(text: &str) -> QueryResult<Config> {
        let value: JsonValue = serde_json::from_str(text).map_err(|e| {
            QueryError::new(
                ErrorKind::Argument,
                format!("'config' is expected to be a JSON object: {}", e),
            )
        })?;
        let Some(map) = value.as_object() else {
            return Err(QueryError::new(
                ErrorKind::Argument,
                "'config' is a mandatory parameter that is expected to be an object",
            ));
        };
        for field in NUMERIC_FIELDS {
            if let Some(v) = map.get(field) {
                if !v.as_f64().is_some_and(|n| n >= 0.0) {
                    return Err(QueryError::new(
                        ErrorKind::Argument,
                        format!("'{}' is expected to be a positive number", field),
                    ));
                }
            }
        }
        let number = |field: &str| map.get(field).and_then(JsonValue::as_f64);
        let partial = PartialConfig {
            wait_timeout_milliseconds: number("waitTimeoutMilliseconds").map(|n| n as u64),
            min_poll_period_milliseconds: number("minPollPeriodMilliseconds").map(|n| n as u64),
            poll_times: number("pollTimes").map(|n| n as u32),
            should_log: map.get("shouldLog").and_then(JsonValue::as_bool),
        };
        Config::from_partial(partial)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_milliseconds)
    }

    pub fn min_poll_period(&self) -> Duration {
        Duration::from_millis(self.min_poll_period_milliseconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_min_poll_greater_than_timeout_fails() {
        let config = Config {
            wait_timeout_milliseconds: 50,
            min_poll_period_milliseconds: 100,
            poll_times: 5,
            should_log: false,
        };
        let err = config.validate().unwrap_err();
        assert!(err.is(ErrorKind::Argument));
        assert_eq!(
            err.message(),
            "'minPollPeriodMilliseconds' (100ms) cannot be greater than 'waitTimeoutMilliseconds' (50ms)"
        );
    }

    #[test]
    fn test_poll_times_below_two_fails() {
        let config = Config {
            poll_times: 1,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.message(), "'pollTimes' (1) cannot be less than 2");
    }

    #[test]
    fn test_partial_overrides_merge_over_defaults() {
        let config = Config::from_partial(PartialConfig {
            wait_timeout_milliseconds: Some(100),
            ..PartialConfig::default()
        })
        .unwrap();
        assert_eq!(config.wait_timeout_milliseconds, 100);
        assert_eq!(config.poll_times, 5);
    }

    #[test]
    fn test_json_rejects_non_numeric_fields() {
        let err = Config::from_json(r#"{"pollTimes": "five"}"#).unwrap_err();
        assert_eq!(err.message(), "'pollTimes' is expected to be a positive number");

        let config = Config::from_json(r#"{"pollTimes": 3, "shouldLog": true, "other": 1}"#).unwrap();
        assert_eq!(config.poll_times, 3);
        assert!(config.should_log);
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let value = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "waitTimeoutMilliseconds": 5000,
                "minPollPeriodMilliseconds": 10,
                "pollTimes": 5,
                "shouldLog": false
            })
        );
    }
}
