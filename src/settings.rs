//! Upload pipeline settings, loaded from `LOGSHIP_*` environment variables.

/// Default cap on events per POSTed block.
pub const DEFAULT_MAX_EVENTS_PER_REQUEST: usize = 500;

/// Configuration for recording and shipping event logs.
#[derive(Clone, Debug)]
pub struct UploadSettings {
    /// Statistics endpoint URL (from LOGSHIP_URL). `None` means the service
    /// is not configured and nothing can be shipped.
    pub service_url: Option<String>,
    /// Bearer token presented with every block (from LOGSHIP_API_TOKEN).
    pub api_token: Option<String>,
    /// Product code stamped on every batch (from LOGSHIP_PRODUCT).
    pub product: String,
    /// Rollout bucket stamped on recorded events (from LOGSHIP_BUCKET).
    pub bucket: String,
    /// Master switch for the recorder (from LOGSHIP_ENABLED).
    pub enabled: bool,
    /// Whether the server currently permits transmission (from
    /// LOGSHIP_PERMITTED).
    pub permitted: bool,
    /// Cap on events per POSTed block (from LOGSHIP_MAX_EVENTS_PER_REQUEST).
    pub max_events_per_request: usize,
}

impl UploadSettings {
    pub fn from_env() -> Self {
        let service_url = std::env::var("LOGSHIP_URL").ok().filter(|u| !u.is_empty());
        let api_token = std::env::var("LOGSHIP_API_TOKEN").ok();
        let product =
            std::env::var("LOGSHIP_PRODUCT").unwrap_or_else(|_| "logship".to_string());
        let bucket = std::env::var("LOGSHIP_BUCKET").unwrap_or_else(|_| "-1".to_string());
        let enabled = parse_flag(std::env::var("LOGSHIP_ENABLED").ok(), true);
        let permitted = parse_flag(std::env::var("LOGSHIP_PERMITTED").ok(), true);
        let max_events_per_request = std::env::var("LOGSHIP_MAX_EVENTS_PER_REQUEST")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_EVENTS_PER_REQUEST);

        Self {
            service_url,
            api_token,
            product,
            bucket,
            enabled,
            permitted,
            max_events_per_request,
        }
    }

    /// Settings pointing at an explicit endpoint. Used by tests and anywhere
    /// the URL is known up front.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            service_url: Some(url.into()),
            api_token: None,
            product: "logship".to_string(),
            bucket: "-1".to_string(),
            enabled: true,
            permitted: true,
            max_events_per_request: DEFAULT_MAX_EVENTS_PER_REQUEST,
        }
    }

    /// Settings with the recorder switched off.
    pub fn disabled() -> Self {
        Self {
            service_url: None,
            api_token: None,
            product: "logship".to_string(),
            bucket: "-1".to_string(),
            enabled: false,
            permitted: true,
            max_events_per_request: DEFAULT_MAX_EVENTS_PER_REQUEST,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref() {
        Some("1") | Some("true") | Some("yes") | Some("on") => true,
        Some("0") | Some("false") | Some("no") | Some("off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_settings_turn_the_recorder_off() {
        let settings = UploadSettings::disabled();
        assert!(!settings.enabled);
        assert!(settings.service_url.is_none());
    }

    #[test]
    fn with_url_enables_shipping_to_that_endpoint() {
        let settings = UploadSettings::with_url("http://127.0.0.1:17020/api/v1/events");
        assert!(settings.enabled);
        assert!(settings.permitted);
        assert_eq!(
            settings.service_url.as_deref(),
            Some("http://127.0.0.1:17020/api/v1/events")
        );
        assert_eq!(settings.max_events_per_request, DEFAULT_MAX_EVENTS_PER_REQUEST);
    }

    #[test]
    fn flags_parse_common_spellings() {
        assert!(parse_flag(Some("1".to_string()), false));
        assert!(parse_flag(Some("yes".to_string()), false));
        assert!(!parse_flag(Some("off".to_string()), true));
        assert!(parse_flag(None, true));
        assert!(!parse_flag(Some("maybe".to_string()), false));
    }
}
