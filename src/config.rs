// src/config.rs

use anyhow::{Context, Result};
use chrono::Datelike;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

use crate::dom::{xpath_literal, Locator};
use crate::model::{CategoryAxis, TimeAxis};

pub const DEFAULT_DASHBOARD_URL: &str =
    "https://vahan.parivahan.gov.in/vahan4dashboard/vahan/view/reportview.xhtml";

/// Everything a harvest run needs, threaded explicitly into constructors.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub dashboard_url: String,
    pub browser: BrowserConfig,
    pub timing: TimingConfig,
    pub locators: Locators,
    pub labels: Labels,
    pub sweep: SweepConfig,
    pub paths: PathsConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            browser: BrowserConfig::default(),
            timing: TimingConfig::default(),
            locators: Locators::default(),
            labels: Labels::default(),
            sweep: SweepConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Read a YAML config file. Missing keys fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {:?}", path))?;
        let cfg: HarvestConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {:?}", path))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.dashboard_url)
            .with_context(|| format!("invalid dashboard_url {:?}", self.dashboard_url))?;
        let years = self.sweep.years();
        if years.is_empty() {
            anyhow::bail!(
                "empty year range {}..={}",
                self.sweep.from_year,
                self.sweep.last_year()
            );
        }
        if self.locators.result_containers.is_empty() {
            anyhow::bail!("no result container ids configured");
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: Option<String>,
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: None,
            sandbox: false,
        }
    }
}

/// All durations in milliseconds.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub wait_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub option_settle_ms: u64,
    pub confirm_probe_ms: u64,
    pub panel_close_ms: u64,
    pub container_probe_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 30_000,
            settle_delay_ms: 3_000,
            option_settle_ms: 1_000,
            confirm_probe_ms: 5_000,
            panel_close_ms: 5_000,
            container_probe_ms: 5_000,
            poll_interval_ms: 250,
        }
    }
}

impl TimingConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
    pub fn option_settle(&self) -> Duration {
        Duration::from_millis(self.option_settle_ms)
    }
    pub fn confirm_probe(&self) -> Duration {
        Duration::from_millis(self.confirm_probe_ms)
    }
    pub fn panel_close(&self) -> Duration {
        Duration::from_millis(self.panel_close_ms)
    }
    pub fn container_probe(&self) -> Duration {
        Duration::from_millis(self.container_probe_ms)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Zero delays and short waits, for driving scripted pages in tests.
    pub fn instant() -> Self {
        Self {
            wait_timeout_ms: 50,
            settle_delay_ms: 0,
            option_settle_ms: 0,
            confirm_probe_ms: 10,
            panel_close_ms: 10,
            container_probe_ms: 10,
            poll_interval_ms: 1,
        }
    }
}

/// Widget ids and XPaths of the PrimeFaces dashboard.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Locators {
    pub category_control: String,
    pub time_control: String,
    pub single_year_control: String,
    pub multi_year_control: String,
    pub refresh_button: String,
    pub loading_overlay: String,
    pub result_containers: Vec<String>,
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            category_control: "yaxisVar".into(),
            time_control: "xaxisVar".into(),
            single_year_control: "selectedYear".into(),
            multi_year_control: "yearList".into(),
            refresh_button: "//button[contains(@class, 'ui-button') and .//span[contains(@class, 'ui-icon-refresh')]]".into(),
            loading_overlay: "j_idt132_blocker".into(),
            result_containers: vec!["groupingTable".into(), "vchgroupTable".into()],
        }
    }
}

impl Locators {
    pub fn trigger(&self, control: &str) -> Locator {
        let id = xpath_literal(control);
        Locator::xpath(format!(
            "//div[@id={id}]/div[contains(@class,'ui-selectonemenu-trigger')] | //div[@id={id}]/div[contains(@class,'ui-selectcheckboxmenu-trigger')]"
        ))
    }

    pub fn panel(&self, control: &str) -> Locator {
        Locator::id(&format!("{}_panel", control))
    }

    pub fn single_options(&self, control: &str) -> Locator {
        Locator::xpath(format!(
            "//*[@id={}]//ul[contains(@class,'ui-selectonemenu-list')]/li[contains(@class,'ui-selectonemenu-item')]",
            xpath_literal(&format!("{}_panel", control))
        ))
    }

    pub fn single_option(&self, control: &str, text: &str) -> Locator {
        Locator::xpath(format!(
            "//*[@id={}]//ul[contains(@class,'ui-selectonemenu-list')]/li[contains(@class,'ui-selectonemenu-item') and normalize-space(.)={}]",
            xpath_literal(&format!("{}_panel", control)),
            xpath_literal(text)
        ))
    }

    pub fn multi_options(&self, control: &str) -> Locator {
        Locator::xpath(format!(
            "//*[@id={}]//div[contains(@class,'ui-selectcheckboxmenu-items-wrapper')]//li/label",
            xpath_literal(&format!("{}_panel", control))
        ))
    }

    /// Clickable label of one multi-select entry.
    pub fn multi_option(&self, control: &str, text: &str) -> Locator {
        Locator::xpath(format!(
            "//*[@id={}]//div[contains(@class,'ui-selectcheckboxmenu-items-wrapper')]//li/label[normalize-space(.)={}]",
            xpath_literal(&format!("{}_panel", control)),
            xpath_literal(text)
        ))
    }

    /// The `li` around a multi-select entry; carries the checked class.
    pub fn multi_option_item(&self, control: &str, text: &str) -> Locator {
        Locator::xpath(format!(
            "//*[@id={}]//div[contains(@class,'ui-selectcheckboxmenu-items-wrapper')]//li[label[normalize-space(.)={}]]",
            xpath_literal(&format!("{}_panel", control)),
            xpath_literal(text)
        ))
    }

    /// Label showing the current value of a single-select.
    pub fn current_label(&self, control: &str) -> Locator {
        Locator::xpath(format!(
            "//div[@id={}]//label[contains(@class,'ui-selectonemenu-label')]",
            xpath_literal(control)
        ))
    }

    pub fn confirm_button(&self, control: &str) -> Locator {
        Locator::xpath(format!(
            "//div[@id={}]//button[contains(span,'Filter')]",
            xpath_literal(&format!("{}_panel", control))
        ))
    }

    pub fn refresh(&self) -> Locator {
        Locator::xpath(self.refresh_button.clone())
    }

    pub fn overlay(&self) -> Locator {
        Locator::id(&self.loading_overlay)
    }

    pub fn container(&self, id: &str) -> Locator {
        Locator::id(id)
    }

    pub fn outside_click(&self) -> Locator {
        Locator::xpath("//body")
    }
}

/// Option texts the dashboard shows for each axis value.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub manufacturer: String,
    pub vehicle_category: String,
    pub calendar_year: String,
    pub month_wise: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            manufacturer: "Maker".into(),
            vehicle_category: "Vehicle Category".into(),
            calendar_year: "Calendar Year".into(),
            month_wise: "Month Wise".into(),
        }
    }
}

impl Labels {
    pub fn category(&self, axis: CategoryAxis) -> &str {
        match axis {
            CategoryAxis::Manufacturer => &self.manufacturer,
            CategoryAxis::VehicleCategory => &self.vehicle_category,
        }
    }

    pub fn time(&self, axis: TimeAxis) -> &str {
        match axis {
            TimeAxis::CalendarYear => &self.calendar_year,
            TimeAxis::MonthWise => &self.month_wise,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub categories: Vec<CategoryAxis>,
    pub time_axes: Vec<TimeAxis>,
    pub from_year: i32,
    /// Defaults to the current calendar year.
    pub to_year: Option<i32>,
    /// Store zero counts instead of dropping them.
    pub keep_zero: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            categories: vec![CategoryAxis::VehicleCategory, CategoryAxis::Manufacturer],
            time_axes: vec![TimeAxis::MonthWise, TimeAxis::CalendarYear],
            from_year: 2016,
            to_year: None,
            keep_zero: false,
        }
    }
}

impl SweepConfig {
    pub fn last_year(&self) -> i32 {
        self.to_year
            .unwrap_or_else(|| chrono::Local::now().year())
    }

    pub fn years(&self) -> Vec<i32> {
        (self.from_year..=self.last_year()).collect()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub database: PathBuf,
    pub snapshots_dir: PathBuf,
    pub outcomes_dir: PathBuf,
    pub snapshots_enabled: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("vahan_data.duckdb"),
            snapshots_dir: PathBuf::from("html_backups"),
            outcomes_dir: PathBuf::from("outcomes"),
            snapshots_enabled: true,
        }
    }
}
