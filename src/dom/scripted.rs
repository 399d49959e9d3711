// src/dom/scripted.rs
//
// In-memory stand-in for the dashboard: PrimeFaces-like single and multi
// select widgets, a refresh button, a loading overlay and result containers.
// State never changes on its own, so every wait resolves on its first probe.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::config::Locators;
use crate::dom::{DomControl, Locator};
use crate::error::{DomError, WaitKind};

/// Current selection of every widget, keyed by control id.
pub type Selection = BTreeMap<String, Vec<String>>;

type RenderFn = Box<dyn Fn(&Selection) -> Option<(String, String)>>;
type HangFn = Box<dyn Fn(&Selection) -> bool>;

#[derive(Clone, Debug)]
pub struct Widget {
    pub multi: bool,
    pub options: Vec<String>,
    pub selected: Vec<String>,
    /// Single-select panels that hide themselves after a pick.
    pub auto_close: bool,
    pub confirm_button: bool,
    /// The trigger no longer closes the panel; only an outside click does.
    pub stuck_open: bool,
}

impl Widget {
    pub fn single(options: &[&str]) -> Self {
        Self {
            multi: false,
            options: options.iter().map(|s| s.to_string()).collect(),
            selected: options.first().map(|s| vec![s.to_string()]).unwrap_or_default(),
            auto_close: true,
            confirm_button: false,
            stuck_open: false,
        }
    }

    pub fn multi(options: &[&str]) -> Self {
        Self {
            multi: true,
            options: options.iter().map(|s| s.to_string()).collect(),
            selected: Vec::new(),
            auto_close: false,
            confirm_button: true,
            stuck_open: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Trigger(String),
    Panel(String),
    Options(String),
    OptionLabel(String, String),
    OptionItem(String, String),
    CurrentLabel(String),
    Confirm(String),
    Refresh,
    Overlay,
    Container(String),
    Body,
}

#[derive(Default)]
struct State {
    widgets: BTreeMap<String, Widget>,
    open: BTreeSet<String>,
    overlay_visible: bool,
    rendered: Option<(String, String)>,
    refreshes: usize,
    clicks: Vec<String>,
    listing_failures: BTreeMap<String, usize>,
}

pub struct ScriptedDom {
    locators: Locators,
    state: RefCell<State>,
    render: RenderFn,
    hang: HangFn,
}

impl ScriptedDom {
    pub fn new(locators: Locators) -> Self {
        Self {
            locators,
            state: RefCell::new(State::default()),
            render: Box::new(|_| None),
            hang: Box::new(|_| false),
        }
    }

    pub fn with_widget(self, control: &str, widget: Widget) -> Self {
        self.state
            .borrow_mut()
            .widgets
            .insert(control.to_string(), widget);
        self
    }

    /// `render` returns the visible container id and its HTML after a refresh.
    pub fn on_render(mut self, render: impl Fn(&Selection) -> Option<(String, String)> + 'static) -> Self {
        self.render = Box::new(render);
        self
    }

    /// Refreshes for which the loading overlay never disappears.
    pub fn hang_refresh_when(mut self, hang: impl Fn(&Selection) -> bool + 'static) -> Self {
        self.hang = Box::new(hang);
        self
    }

    /// The next `n` option listings of `control` fail.
    pub fn fail_listings(self, control: &str, n: usize) -> Self {
        self.state
            .borrow_mut()
            .listing_failures
            .insert(control.to_string(), n);
        self
    }

    pub fn listing_failures_left(&self, control: &str) -> usize {
        self.state
            .borrow()
            .listing_failures
            .get(control)
            .copied()
            .unwrap_or(0)
    }

    pub fn selected(&self, control: &str) -> Vec<String> {
        self.state
            .borrow()
            .widgets
            .get(control)
            .map(|w| w.selected.clone())
            .unwrap_or_default()
    }

    pub fn is_open(&self, control: &str) -> bool {
        self.state.borrow().open.contains(control)
    }

    pub fn refreshes(&self) -> usize {
        self.state.borrow().refreshes
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.borrow().clicks.clone()
    }

    pub fn open_panel(&self, control: &str) {
        self.state.borrow_mut().open.insert(control.to_string());
    }

    fn selection(state: &State) -> Selection {
        state
            .widgets
            .iter()
            .map(|(k, w)| (k.clone(), w.selected.clone()))
            .collect()
    }

    fn resolve(&self, loc: &Locator) -> Option<Target> {
        let l = &self.locators;
        if *loc == l.refresh() {
            return Some(Target::Refresh);
        }
        if *loc == l.overlay() {
            return Some(Target::Overlay);
        }
        if *loc == l.outside_click() {
            return Some(Target::Body);
        }
        for id in &l.result_containers {
            if *loc == l.container(id) {
                return Some(Target::Container(id.clone()));
            }
        }
        let state = self.state.borrow();
        for (id, w) in &state.widgets {
            if *loc == l.trigger(id) {
                return Some(Target::Trigger(id.clone()));
            }
            if *loc == l.panel(id) {
                return Some(Target::Panel(id.clone()));
            }
            if *loc == l.confirm_button(id) {
                return Some(Target::Confirm(id.clone()));
            }
            if *loc == l.current_label(id) {
                return Some(Target::CurrentLabel(id.clone()));
            }
            if (!w.multi && *loc == l.single_options(id)) || (w.multi && *loc == l.multi_options(id)) {
                return Some(Target::Options(id.clone()));
            }
            for opt in &w.options {
                if (!w.multi && *loc == l.single_option(id, opt)) || (w.multi && *loc == l.multi_option(id, opt)) {
                    return Some(Target::OptionLabel(id.clone(), opt.clone()));
                }
                if w.multi && *loc == l.multi_option_item(id, opt) {
                    return Some(Target::OptionItem(id.clone(), opt.clone()));
                }
            }
        }
        None
    }

    fn visible(&self, target: &Target) -> bool {
        let state = self.state.borrow();
        let open = |id: &String| state.open.contains(id);
        match target {
            Target::Trigger(_) | Target::CurrentLabel(_) | Target::Refresh | Target::Body => true,
            Target::Panel(id) | Target::Options(id) => open(id),
            Target::OptionLabel(id, _) | Target::OptionItem(id, _) => open(id),
            Target::Confirm(id) => open(id) && state.widgets.get(id).map_or(false, |w| w.confirm_button),
            Target::Overlay => state.overlay_visible,
            Target::Container(cid) => state
                .rendered
                .as_ref()
                .map_or(false, |(id, _)| id == cid),
        }
    }

    fn probe(&self, loc: &Locator, kind: WaitKind, timeout: Duration, ok: bool) -> Result<(), DomError> {
        if ok {
            Ok(())
        } else {
            Err(DomError::Timeout {
                locator: loc.clone(),
                kind,
                timeout,
            })
        }
    }
}

impl DomControl for ScriptedDom {
    fn click(&self, target: &Locator) -> Result<(), DomError> {
        let t = self
            .resolve(target)
            .ok_or_else(|| DomError::NotFound(target.clone()))?;
        if !self.visible(&t) {
            return Err(DomError::interaction(target, "element is not visible"));
        }
        let mut state = self.state.borrow_mut();
        state.clicks.push(format!("{:?}", t));
        match t {
            Target::Trigger(id) => {
                let stuck = state.widgets.get(&id).map_or(false, |w| w.stuck_open);
                if state.open.contains(&id) {
                    if !stuck {
                        state.open.remove(&id);
                    }
                } else {
                    state.open.insert(id);
                }
            }
            Target::OptionLabel(id, opt) => {
                let mut close = false;
                if let Some(w) = state.widgets.get_mut(&id) {
                    if w.multi {
                        if let Some(pos) = w.selected.iter().position(|s| *s == opt) {
                            w.selected.remove(pos);
                        } else {
                            w.selected.push(opt);
                        }
                    } else {
                        w.selected = vec![opt];
                        close = w.auto_close;
                    }
                }
                if close {
                    state.open.remove(&id);
                }
            }
            Target::Confirm(id) => {
                state.open.remove(&id);
            }
            Target::Body => state.open.clear(),
            Target::Refresh => {
                state.refreshes += 1;
                state.open.clear();
                let sel = Self::selection(&state);
                if (self.hang)(&sel) {
                    state.overlay_visible = true;
                    state.rendered = None;
                } else {
                    state.overlay_visible = false;
                    state.rendered = (self.render)(&sel);
                }
            }
            Target::Panel(_)
            | Target::Options(_)
            | Target::OptionItem(_, _)
            | Target::CurrentLabel(_)
            | Target::Overlay
            | Target::Container(_) => {}
        }
        Ok(())
    }

    fn scroll_into_view(&self, target: &Locator) -> Result<(), DomError> {
        self.resolve(target)
            .map(|_| ())
            .ok_or_else(|| DomError::NotFound(target.clone()))
    }

    fn wait_visible(&self, target: &Locator, timeout: Duration) -> Result<(), DomError> {
        let ok = self.resolve(target).map_or(false, |t| self.visible(&t));
        self.probe(target, WaitKind::Visible, timeout, ok)
    }

    fn wait_invisible(&self, target: &Locator, timeout: Duration) -> Result<(), DomError> {
        let ok = self.resolve(target).map_or(true, |t| !self.visible(&t));
        self.probe(target, WaitKind::Invisible, timeout, ok)
    }

    fn wait_clickable(&self, target: &Locator, timeout: Duration) -> Result<(), DomError> {
        self.wait_visible(target, timeout).map_err(|_| DomError::Timeout {
            locator: target.clone(),
            kind: WaitKind::Clickable,
            timeout,
        })
    }

    fn outer_html(&self, target: &Locator) -> Result<String, DomError> {
        match self.resolve(target) {
            Some(Target::Container(cid)) => {
                let state = self.state.borrow();
                match &state.rendered {
                    Some((id, html)) if *id == cid => Ok(html.clone()),
                    _ => Err(DomError::NotFound(target.clone())),
                }
            }
            _ => Err(DomError::NotFound(target.clone())),
        }
    }

    fn texts(&self, target: &Locator) -> Result<Vec<String>, DomError> {
        let t = match self.resolve(target) {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };
        if let Target::Options(id) = &t {
            let mut state = self.state.borrow_mut();
            if let Some(left) = state.listing_failures.get_mut(id).filter(|n| **n > 0) {
                *left -= 1;
                return Err(DomError::interaction(target, "option list detached"));
            }
        }
        let state = self.state.borrow();
        Ok(match t {
            Target::Options(id) if state.open.contains(&id) => state
                .widgets
                .get(&id)
                .map(|w| w.options.clone())
                .unwrap_or_default(),
            Target::CurrentLabel(id) => state
                .widgets
                .get(&id)
                .map(|w| w.selected.iter().take(1).cloned().collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        })
    }

    fn attribute(&self, target: &Locator, name: &str) -> Result<Option<String>, DomError> {
        match self.resolve(target) {
            Some(Target::OptionItem(id, opt)) if name == "class" => {
                let state = self.state.borrow();
                let checked = state
                    .widgets
                    .get(&id)
                    .map_or(false, |w| w.selected.contains(&opt));
                Ok(Some(if checked {
                    "ui-selectcheckboxmenu-item ui-selectcheckboxmenu-checked".to_string()
                } else {
                    "ui-selectcheckboxmenu-item ui-selectcheckboxmenu-unchecked".to_string()
                }))
            }
            Some(_) => Ok(None),
            None => Err(DomError::NotFound(target.clone())),
        }
    }

    fn page_source(&self) -> Result<String, DomError> {
        let state = self.state.borrow();
        let body = state
            .rendered
            .as_ref()
            .map(|(_, html)| html.as_str())
            .unwrap_or("");
        Ok(format!("<html><body>{}</body></html>", body))
    }
}
