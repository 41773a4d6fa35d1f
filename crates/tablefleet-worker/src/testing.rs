//! Scripted [`RemoteSurface`] for engine tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tablefleet_browser::ElementState;
use tablefleet_types::Control;

use crate::surface::{RemoteSurface, SurfaceError};

/// A surface whose controls have fixed states until a click changes them.
///
/// Unscripted controls are absent. Text reads pop from a per-control queue
/// and return `None` once it is drained.
#[derive(Default)]
pub struct ScriptedSurface {
    states: HashMap<Control, ElementState>,
    texts: HashMap<Control, VecDeque<Option<String>>>,
    broken: HashSet<Control>,
    effects: HashMap<Control, Vec<(Control, ElementState)>>,
    fail_navigation: bool,
    pub activations: Vec<Control>,
    pub fills: Vec<(Control, String)>,
    pub opened: Vec<String>,
    pub reloads: u32,
    pub settles: Vec<Duration>,
    /// Every `is_visible` call, with the timeout it was given.
    pub visibility_checks: Vec<(Control, Duration)>,
}

impl ScriptedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, control: Control, state: ElementState) -> Self {
        self.states.insert(control, state);
        self
    }

    pub fn enabled(self, controls: &[Control]) -> Self {
        controls
            .iter()
            .fold(self, |s, c| s.with(*c, ElementState::Enabled))
    }

    pub fn text(mut self, control: Control, value: Option<&str>) -> Self {
        self.texts
            .entry(control)
            .or_default()
            .push_back(value.map(str::to_string));
        self
    }

    /// Clicking `control` reports an interaction failure even when enabled.
    pub fn broken(mut self, control: Control) -> Self {
        self.broken.insert(control);
        self
    }

    /// After a successful click on `trigger`, `target` takes `state`.
    pub fn on_click(mut self, trigger: Control, target: Control, state: ElementState) -> Self {
        self.effects.entry(trigger).or_default().push((target, state));
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    fn state(&self, control: Control) -> ElementState {
        self.states
            .get(&control)
            .copied()
            .unwrap_or(ElementState::Absent)
    }
}

#[async_trait]
impl RemoteSurface for ScriptedSurface {
    async fn is_visible(&mut self, control: Control, timeout: Duration) -> bool {
        self.visibility_checks.push((control, timeout));
        self.state(control).is_visible()
    }

    async fn is_enabled(&mut self, control: Control, _timeout: Duration) -> bool {
        self.state(control).is_enabled()
    }

    async fn activate(&mut self, control: Control, timeout: Duration) -> Result<(), SurfaceError> {
        if !self.state(control).is_enabled() {
            return Err(SurfaceError::Unavailable { control, timeout });
        }
        if self.broken.contains(&control) {
            return Err(SurfaceError::Interaction {
                control,
                reason: "scripted failure".into(),
            });
        }
        self.activations.push(control);
        if let Some(effects) = self.effects.get(&control).cloned() {
            for (target, state) in effects {
                self.states.insert(target, state);
            }
        }
        Ok(())
    }

    async fn read_text(
        &mut self,
        control: Control,
        _timeout: Duration,
    ) -> Result<Option<String>, SurfaceError> {
        Ok(self
            .texts
            .get_mut(&control)
            .and_then(|queue| queue.pop_front())
            .flatten())
    }

    async fn fill(
        &mut self,
        control: Control,
        text: &str,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        if !self.state(control).is_enabled() {
            return Err(SurfaceError::Unavailable { control, timeout });
        }
        self.fills.push((control, text.to_string()));
        Ok(())
    }

    async fn open(&mut self, url: &str, _timeout: Duration) -> Result<(), SurfaceError> {
        if self.fail_navigation {
            return Err(SurfaceError::Navigation("net::ERR_CONNECTION_REFUSED".into()));
        }
        self.opened.push(url.to_string());
        Ok(())
    }

    async fn reload(&mut self, _timeout: Duration) -> Result<(), SurfaceError> {
        self.reloads += 1;
        Ok(())
    }

    async fn settle(&mut self, pause: Duration) {
        self.settles.push(pause);
    }
}
