//! Dashboard module - checks that the browser is showing the dashboard

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Check the browser each cycle
    pub enabled: bool,

    /// DevTools tab listing of the dashboard browser
    pub devtools_url: String,

    /// URL prefix the dashboard tab must start with
    pub expected_url: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            devtools_url: "http://127.0.0.1:9222/json".to_string(),
            expected_url: String::new(),
        }
    }
}

/// One entry of the DevTools `/json` listing
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserTab {
    /// DevTools target id
    #[serde(default)]
    pub id: String,
    /// Page title
    #[serde(default)]
    pub title: String,
    /// Page URL
    pub url: String,
}

/// True when any tab URL starts with `expected` (ASCII case-insensitive).
pub fn any_tab_matches(tabs: &[BrowserTab], expected: &str) -> bool {
    let expected = expected.to_lowercase();
    tabs.iter()
        .any(|tab| tab.url.to_lowercase().starts_with(&expected))
}

/// Looks for the dashboard among the browser tabs
pub struct DashboardCheck {
    config: DashboardConfig,
    client: reqwest::Client,
}

impl DashboardCheck {
    /// Check with a short request timeout
    pub fn new(config: DashboardConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { config, client })
    }

    /// Configuration in use
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    async fn list_tabs(&self) -> Result<Vec<BrowserTab>, reqwest::Error> {
        self.client
            .get(&self.config.devtools_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Whether the browser has the dashboard open; any failure reads as `false`.
    pub async fn is_expected_url_open(&self) -> bool {
        match self.list_tabs().await {
            Ok(tabs) => {
                debug!("Browser reports {} tabs", tabs.len());
                any_tab_matches(&tabs, &self.config.expected_url)
            }
            Err(e) => {
                error!("Error while checking for {}: {}", self.config.expected_url, e);
                false
            }
        }
    }
}
