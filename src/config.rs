use crate::errors::{ApiError, ApiResult};
use std::time::Duration;

const MIN_STALENESS_SECONDS: u64 = 1;
const MAX_STALENESS_SECONDS: u64 = 3_600;
const MIN_PAGE_SIZE: u32 = 1;
const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_path: String,
    pub staleness_window: Duration,
    pub eviction_window: Duration,
    pub default_page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_path: "/api".to_string(),
            staleness_window: Duration::from_secs(30),
            eviction_window: Duration::from_secs(15 * 60),
            default_page_size: 20,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> ApiResult<()> {
        let staleness = self.staleness_window.as_secs();
        if !(MIN_STALENESS_SECONDS..=MAX_STALENESS_SECONDS).contains(&staleness) {
            return Err(ApiError::Conflict(format!(
                "Staleness window {}s is out of allowed range ({}..={}s)",
                staleness, MIN_STALENESS_SECONDS, MAX_STALENESS_SECONDS
            )));
        }
        if self.eviction_window < self.staleness_window {
            return Err(ApiError::Conflict(
                "Eviction window must not be shorter than the staleness window".to_string(),
            ));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.default_page_size) {
            return Err(ApiError::Conflict(format!(
                "Default page size {} is out of allowed range ({}..={})",
                self.default_page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ClientConfig;
    use std::time::Duration;

    #[test]
    fn default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn eviction_shorter_than_staleness_is_rejected() {
        let config = ClientConfig {
            staleness_window: Duration::from_secs(60),
            eviction_window: Duration::from_secs(30),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_page_size_is_rejected() {
        let config = ClientConfig {
            default_page_size: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
