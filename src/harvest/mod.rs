// src/harvest/mod.rs

pub mod summary;

use chrono::Local;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Instant,
};
use tracing::{info, info_span, warn};

use crate::config::{HarvestConfig, SweepConfig};
use crate::dom::DomControl;
use crate::dropdown::{DropdownController, WidgetKind};
use crate::error::{DomError, HarvestError};
use crate::extract::TableExtractor;
use crate::model::{CategoryAxis, FilterCombination, HarvestOutcome, OutcomeStatus, TimeAxis};
use crate::normalize::{Normalizer, NormalizerOptions};
use crate::snapshot::SnapshotWriter;
use crate::store::RegistrationStore;

pub use summary::HarvestSummary;

/// Every combination of the sweep, category outermost, year innermost.
pub fn combinations(sweep: &SweepConfig) -> Vec<FilterCombination> {
    let years = sweep.years();
    let mut out = Vec::with_capacity(sweep.categories.len() * sweep.time_axes.len() * years.len());
    for &category in &sweep.categories {
        for &time_axis in &sweep.time_axes {
            for &year in &years {
                out.push(FilterCombination::new(category, time_axis, year));
            }
        }
    }
    out
}

/// Drives the dashboard through the combination space, one unit at a time.
pub struct Harvester<'a, D: DomControl> {
    dom: &'a D,
    cfg: &'a HarvestConfig,
    store: &'a mut RegistrationStore,
    snapshots: &'a SnapshotWriter,
    extractor: TableExtractor,
    normalizer: Normalizer,
    cancel: Arc<AtomicBool>,
    /// Year options listed for the last (category, time axis) pair; `None`
    /// inside when the listing failed.
    offered: Option<((CategoryAxis, TimeAxis), Option<Vec<String>>)>,
}

impl<'a, D: DomControl> Harvester<'a, D> {
    pub fn new(
        dom: &'a D,
        cfg: &'a HarvestConfig,
        store: &'a mut RegistrationStore,
        snapshots: &'a SnapshotWriter,
    ) -> Self {
        Self {
            dom,
            cfg,
            store,
            snapshots,
            extractor: TableExtractor::new(),
            normalizer: Normalizer::new(NormalizerOptions {
                keep_zero: cfg.sweep.keep_zero,
            }),
            cancel: Arc::new(AtomicBool::new(false)),
            offered: None,
        }
    }

    /// Checked between combinations; pending units are skipped once set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    fn dropdowns(&self) -> DropdownController<'a, D> {
        let cfg: &'a HarvestConfig = self.cfg;
        DropdownController::new(self.dom, &cfg.locators, &cfg.timing)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn year_widget(&self, time_axis: TimeAxis) -> (&'a str, WidgetKind) {
        let cfg: &'a HarvestConfig = self.cfg;
        let loc = &cfg.locators;
        match time_axis {
            TimeAxis::CalendarYear => (loc.multi_year_control.as_str(), WidgetKind::Multi),
            TimeAxis::MonthWise => (loc.single_year_control.as_str(), WidgetKind::Single),
        }
    }

    fn all_controls(&self) -> [(&'a str, WidgetKind); 4] {
        let cfg: &'a HarvestConfig = self.cfg;
        let loc = &cfg.locators;
        [
            (loc.category_control.as_str(), WidgetKind::Single),
            (loc.time_control.as_str(), WidgetKind::Single),
            (loc.single_year_control.as_str(), WidgetKind::Single),
            (loc.multi_year_control.as_str(), WidgetKind::Multi),
        ]
    }

    /// Run the whole sweep in [`combinations`] order. Per-combination
    /// failures are recorded in the summary and never abort the run.
    pub fn run(&mut self) -> HarvestSummary {
        let started = Local::now();
        let clock = Instant::now();
        let plan = combinations(&self.cfg.sweep);
        let mut outcomes: Vec<HarvestOutcome> = Vec::with_capacity(plan.len());
        let mut cancelled = false;
        self.offered = None;

        info!(
            combinations = plan.len(),
            keep_zero = self.cfg.sweep.keep_zero,
            "starting sweep"
        );
        if self.snapshots.is_enabled() {
            match self.dom.page_source() {
                Ok(html) => {
                    self.snapshots.save("initial_page", &html);
                }
                Err(e) => warn!(error = %e, "could not read initial page"),
            }
        }

        for combo in plan {
            if self.cancelled() {
                cancelled = true;
                break;
            }
            let outcome = self.harvest_one(combo);
            log_outcome(&outcome);
            outcomes.push(outcome);
        }

        if cancelled {
            warn!(attempted = outcomes.len(), "sweep cancelled");
        }
        HarvestSummary::new(outcomes, cancelled, started, clock.elapsed())
    }

    /// Bring both axis widgets to the combination's values. Each select is a
    /// no-op when the widget already shows it.
    fn select_axes(&self, combo: &FilterCombination) -> Result<(), DomError> {
        let cfg = self.cfg;
        let dd = self.dropdowns();
        dd.choose(
            &cfg.locators.category_control,
            WidgetKind::Single,
            cfg.labels.category(combo.category),
        )?;
        dd.choose(
            &cfg.locators.time_control,
            WidgetKind::Single,
            cfg.labels.time(combo.time_axis),
        )?;
        Ok(())
    }

    /// Whether the year widget offers `year_text`. The options are listed once
    /// per (category, time axis) pair; when that listing fails every year is
    /// attempted.
    fn year_offered(
        &mut self,
        combo: &FilterCombination,
        control: &str,
        kind: WidgetKind,
        year_text: &str,
    ) -> bool {
        let pair = (combo.category, combo.time_axis);
        if self.offered.as_ref().map(|(p, _)| *p) != Some(pair) {
            let listed = match self.dropdowns().options(control, kind) {
                Ok(opts) => Some(opts),
                Err(e) => {
                    warn!(control, error = %e, "could not list year options");
                    self.dropdowns().close_all(&self.all_controls());
                    None
                }
            };
            self.offered = Some((pair, listed));
        }
        match &self.offered {
            Some((_, Some(years))) => years.iter().any(|y| y == year_text),
            _ => true,
        }
    }

    /// One unit: axes → year → refresh → wait → extract → normalize →
    /// persist, then restore the year widget.
    pub fn harvest_one(&mut self, combo: FilterCombination) -> HarvestOutcome {
        let span = info_span!(
            "combination",
            category = ?combo.category,
            time_axis = ?combo.time_axis,
            year = combo.year
        );
        let _enter = span.enter();

        let (control, kind) = self.year_widget(combo.time_axis);
        let year_text = combo.year.to_string();
        let mut year_touched = false;
        let res = self.try_harvest(&combo, control, kind, &year_text, &mut year_touched);

        let dd = self.dropdowns();
        if kind == WidgetKind::Multi && year_touched {
            if let Err(e) = dd.deselect(control, &year_text) {
                warn!(control, year = %year_text, error = %e, "could not unselect year");
            }
        }
        dd.close_all(&self.all_controls());

        match res {
            Ok(records_written) => HarvestOutcome {
                combination: combo,
                status: OutcomeStatus::Success,
                records_written,
                detail: None,
            },
            Err(e) => HarvestOutcome {
                combination: combo,
                status: e.status(),
                records_written: 0,
                detail: Some(format!("{:#}", e)),
            },
        }
    }

    fn try_harvest(
        &mut self,
        combo: &FilterCombination,
        control: &str,
        kind: WidgetKind,
        year_text: &str,
        year_touched: &mut bool,
    ) -> Result<usize, HarvestError> {
        let cfg = self.cfg;
        let timing = &cfg.timing;
        let loc = &cfg.locators;

        // 1) axes and year
        self.select_axes(combo)?;
        if !self.year_offered(combo, control, kind, year_text) {
            return Err(DomError::OptionMissing {
                control: control.to_string(),
                option: year_text.to_string(),
            }
            .into());
        }
        *year_touched = true;
        self.dropdowns().choose(control, kind, year_text)?;

        // 2) refresh and wait for the overlay to clear
        let refresh = loc.refresh();
        self.dom.wait_clickable(&refresh, timing.wait_timeout())?;
        self.dom.click(&refresh)?;
        self.dom.wait_invisible(&loc.overlay(), timing.wait_timeout())?;
        if !timing.settle_delay().is_zero() {
            thread::sleep(timing.settle_delay());
        }

        if self.snapshots.is_enabled() {
            let stem = combo.slug(cfg.labels.category(combo.category), cfg.labels.time(combo.time_axis));
            match self.dom.page_source() {
                Ok(html) => {
                    self.snapshots.save(&stem, &html);
                }
                Err(e) => warn!(error = %e, "could not read page for snapshot"),
            }
        }

        // 3) extract
        let html = self.read_container()?;
        let table = self
            .extractor
            .extract(&html)
            .ok_or_else(|| HarvestError::NoTableFound("no table met the selection threshold".into()))?;

        // 4) normalize and persist
        let batch = self.normalizer.normalize(&table, combo)?;
        let written = self.store.upsert(&batch)?;
        Ok(written)
    }

    /// Outer HTML of the first configured result container that is visible.
    fn read_container(&self) -> Result<String, HarvestError> {
        let loc = &self.cfg.locators;
        let probe = self.cfg.timing.container_probe();
        for id in &loc.result_containers {
            let target = loc.container(id);
            if self.dom.wait_visible(&target, probe).is_ok() {
                return Ok(self.dom.outer_html(&target)?);
            }
        }
        Err(HarvestError::NoTableFound(format!(
            "none of the result containers {:?} became visible",
            loc.result_containers
        )))
    }
}

fn log_outcome(o: &HarvestOutcome) {
    let c = &o.combination;
    match o.status {
        OutcomeStatus::Success => info!(
            category = ?c.category,
            time_axis = ?c.time_axis,
            year = c.year,
            status = %o.status,
            records = o.records_written,
            "combination finished"
        ),
        _ => warn!(
            category = ?c.category,
            time_axis = ?c.time_axis,
            year = c.year,
            status = %o.status,
            detail = o.detail.as_deref().unwrap_or(""),
            "combination failed"
        ),
    }
}
