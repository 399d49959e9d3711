// src/dropdown.rs

use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Locators, TimingConfig};
use crate::dom::{DomControl, Locator};
use crate::error::DomError;

const CHECKED_CLASS: &str = "ui-selectcheckboxmenu-checked";

/// Single-select replaces the current value; multi-select toggles membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetKind {
    Single,
    Multi,
}

/// An open filter panel.
#[derive(Debug)]
pub struct PanelHandle {
    control: String,
    kind: WidgetKind,
    selection_made: bool,
}

pub struct DropdownController<'a, D: DomControl> {
    dom: &'a D,
    locators: &'a Locators,
    timing: &'a TimingConfig,
}

impl<'a, D: DomControl> DropdownController<'a, D> {
    pub fn new(dom: &'a D, locators: &'a Locators, timing: &'a TimingConfig) -> Self {
        Self {
            dom,
            locators,
            timing,
        }
    }

    fn settle(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }

    /// Open `control`'s panel. An already visible panel is returned as is.
    pub fn open(&self, control: &str, kind: WidgetKind) -> Result<PanelHandle, DomError> {
        let handle = PanelHandle {
            control: control.to_string(),
            kind,
            selection_made: false,
        };
        let panel = self.locators.panel(control);
        if self.dom.is_visible(&panel) {
            debug!(control, "panel already open");
            return Ok(handle);
        }

        let trigger = self.locators.trigger(control);
        self.dom.wait_clickable(&trigger, self.timing.wait_timeout())?;
        self.dom.scroll_into_view(&trigger)?;
        self.dom.click(&trigger)?;
        self.settle(self.timing.settle_delay());
        self.dom.wait_visible(&panel, self.timing.wait_timeout())?;
        debug!(control, ?kind, "panel opened");
        Ok(handle)
    }

    pub fn list_options(&self, panel: &PanelHandle) -> Result<Vec<String>, DomError> {
        let loc = match panel.kind {
            WidgetKind::Single => self.locators.single_options(&panel.control),
            WidgetKind::Multi => self.locators.multi_options(&panel.control),
        };
        self.dom.wait_visible(&loc, self.timing.wait_timeout())?;
        self.dom.texts(&loc)
    }

    /// The closed single-select widget shows `text` as its value.
    fn shows(&self, control: &str, text: &str) -> Result<bool, DomError> {
        let current = self.dom.texts(&self.locators.current_label(control))?;
        Ok(current.first().map_or(false, |c| c == text))
    }

    fn is_selected(&self, panel: &PanelHandle, text: &str) -> Result<bool, DomError> {
        match panel.kind {
            WidgetKind::Single => self.shows(&panel.control, text),
            WidgetKind::Multi => {
                let item = self.locators.multi_option_item(&panel.control, text);
                let class = self.dom.attribute(&item, "class")?.unwrap_or_default();
                Ok(class.split_whitespace().any(|c| c == CHECKED_CLASS))
            }
        }
    }

    fn option_locator(&self, panel: &PanelHandle, text: &str) -> Locator {
        match panel.kind {
            WidgetKind::Single => self.locators.single_option(&panel.control, text),
            WidgetKind::Multi => self.locators.multi_option(&panel.control, text),
        }
    }

    fn click_option(&self, panel: &mut PanelHandle, text: &str) -> Result<(), DomError> {
        let loc = self.option_locator(panel, text);
        self.dom.scroll_into_view(&loc)?;
        self.dom.wait_clickable(&loc, self.timing.wait_timeout())?;
        self.dom.click(&loc)?;
        panel.selection_made = true;
        self.settle(self.timing.option_settle());
        Ok(())
    }

    /// Make `text` part of the selection. Selecting an already selected
    /// option is a no-op.
    pub fn select_option(&self, panel: &mut PanelHandle, text: &str) -> Result<(), DomError> {
        let offered = self.list_options(panel)?;
        if !offered.iter().any(|o| o == text) {
            return Err(DomError::OptionMissing {
                control: panel.control.clone(),
                option: text.to_string(),
            });
        }
        if self.is_selected(panel, text)? {
            debug!(control = %panel.control, option = text, "already selected");
            return Ok(());
        }
        self.click_option(panel, text)?;
        debug!(control = %panel.control, option = text, "selected");
        Ok(())
    }

    /// Remove `text` from a multi-select's selection. Unselected options are
    /// left alone.
    pub fn unselect_option(&self, panel: &mut PanelHandle, text: &str) -> Result<(), DomError> {
        if panel.kind == WidgetKind::Single || !self.is_selected(panel, text)? {
            return Ok(());
        }
        self.click_option(panel, text)
    }

    /// Close the panel and verify it is gone, falling back to a click outside
    /// the panel when the normal close does not take.
    pub fn close(&self, panel: PanelHandle) -> Result<(), DomError> {
        let panel_loc = self.locators.panel(&panel.control);

        // auto-closing single selects hide themselves after a pick
        let grace = if panel.kind == WidgetKind::Single && panel.selection_made {
            self.timing.panel_close()
        } else {
            Duration::ZERO
        };
        if self.dom.wait_invisible(&panel_loc, grace).is_ok() {
            self.settle(self.timing.settle_delay());
            return Ok(());
        }

        let trigger = self.locators.trigger(&panel.control);
        match panel.kind {
            WidgetKind::Multi => {
                let confirm = self.locators.confirm_button(&panel.control);
                if self
                    .dom
                    .wait_visible(&confirm, self.timing.confirm_probe())
                    .is_ok()
                {
                    self.dom.click(&confirm)?;
                    debug!(control = %panel.control, "applied via confirm button");
                } else {
                    self.dom.click(&trigger)?;
                    debug!(control = %panel.control, "no confirm button; closed via trigger");
                }
            }
            WidgetKind::Single => self.dom.click(&trigger)?,
        }

        if self
            .dom
            .wait_invisible(&panel_loc, self.timing.panel_close())
            .is_err()
        {
            warn!(control = %panel.control, "panel still visible; clicking outside");
            self.dom.click(&self.locators.outside_click())?;
            self.dom
                .wait_invisible(&panel_loc, self.timing.panel_close())?;
        }
        self.settle(self.timing.settle_delay());
        Ok(())
    }

    /// Open, list, close.
    pub fn options(&self, control: &str, kind: WidgetKind) -> Result<Vec<String>, DomError> {
        let panel = self.open(control, kind)?;
        let options = self.list_options(&panel)?;
        self.close(panel)?;
        Ok(options)
    }

    /// Open, select `text`, close. A single select already showing `text`
    /// is left closed.
    pub fn choose(&self, control: &str, kind: WidgetKind, text: &str) -> Result<(), DomError> {
        if kind == WidgetKind::Single && self.shows(control, text)? {
            debug!(control, option = text, "already showing");
            return Ok(());
        }
        let mut panel = self.open(control, kind)?;
        let picked = self.select_option(&mut panel, text);
        // close even when the pick failed so the panel does not linger
        let closed = self.close(panel);
        picked?;
        closed
    }

    /// Reopen a multi-select, untick `text`, close again.
    pub fn deselect(&self, control: &str, text: &str) -> Result<(), DomError> {
        let mut panel = self.open(control, WidgetKind::Multi)?;
        let res = self.unselect_option(&mut panel, text);
        let closed = self.close(panel);
        res?;
        closed
    }

    /// Best effort: close every listed panel that is still visible.
    pub fn close_all(&self, controls: &[(&str, WidgetKind)]) {
        for (control, kind) in controls {
            if !self.dom.is_visible(&self.locators.panel(control)) {
                continue;
            }
            let handle = PanelHandle {
                control: control.to_string(),
                kind: *kind,
                selection_made: false,
            };
            if let Err(e) = self.close(handle) {
                warn!(control, error = %e, "could not close panel");
            }
        }
    }
}
