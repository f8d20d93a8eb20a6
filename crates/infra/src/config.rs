//! Service configuration.

use tracing::warn;

use pcbforge_production::DEFAULT_SERIAL_NUMBER;

/// Settings for [`crate::production_service::ProductionService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Publish a `ProductionEvent` after every successful save.
    pub publish_events: bool,
    /// Serial to start from when a board has never been produced.
    pub default_serial_number: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            publish_events: true,
            default_serial_number: DEFAULT_SERIAL_NUMBER.to_string(),
        }
    }
}

impl ServiceConfig {
    pub const PUBLISH_EVENTS_VAR: &'static str = "PRODUCTION_PUBLISH_EVENTS";
    pub const DEFAULT_SERIAL_VAR: &'static str = "PRODUCTION_DEFAULT_SERIAL";

    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or invalid values keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::PUBLISH_EVENTS_VAR) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.publish_events = true,
                "0" | "false" | "no" | "off" => config.publish_events = false,
                other => warn!(
                    value = other,
                    "ignoring invalid {}", Self::PUBLISH_EVENTS_VAR
                ),
            }
        }

        if let Some(raw) = lookup(Self::DEFAULT_SERIAL_VAR) {
            let raw = raw.trim();
            if raw.is_empty() {
                warn!("ignoring empty {}", Self::DEFAULT_SERIAL_VAR);
            } else {
                config.default_serial_number = raw.to_string();
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(ServiceConfig::from_lookup(lookup(&[])), ServiceConfig::default());
    }

    #[test]
    fn overrides_are_read() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PRODUCTION_PUBLISH_EVENTS", "off"),
            ("PRODUCTION_DEFAULT_SERIAL", " SN-0000 "),
        ]));
        assert!(!config.publish_events);
        assert_eq!(config.default_serial_number, "SN-0000");
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PRODUCTION_PUBLISH_EVENTS", "maybe"),
            ("PRODUCTION_DEFAULT_SERIAL", "   "),
        ]));
        assert_eq!(config, ServiceConfig::default());
    }
}
