// Viewport-triggered staggered reveal for a group of children.
// Visibility is confirmed from several signals (mount check, intersection, next paint,
// fonts ready, safety timeout). Each mount opens an epoch; signals from older epochs are ignored.

use log::debug;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::timer::TimerSlot;
use crate::types::{ElementRect, Millis, StaggerSettings};

/// Identifies one mount of the container (one route, one layout pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealEpoch(u64);

/// Late layout readiness signals that can shift the container into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutSignal {
    NextPaint,
    FontsReady,
}

/// Per-child animation values at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChildFrame {
    pub opacity: f64,
    pub offset_y_px: f64,
}

/// Reveal state for one stagger container.
#[derive(Debug)]
pub struct StaggerReveal {
    settings: StaggerSettings,
    epoch: u64,
    mounted: bool,
    route: Option<String>,
    revealed_at: Option<Millis>,
    observing: bool,
    safety: TimerSlot,
}

impl StaggerReveal {
    pub fn new(settings: StaggerSettings) -> Self {
        StaggerReveal {
            settings,
            epoch: 0,
            mounted: false,
            route: None,
            revealed_at: None,
            observing: false,
            safety: TimerSlot::new(),
        }
    }

    pub fn settings(&self) -> &StaggerSettings {
        &self.settings
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed_at.is_some()
    }

    pub fn revealed_at(&self) -> Option<Millis> {
        self.revealed_at
    }

    /// True while an intersection observer should stay connected.
    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Mount on `route`, or re-run after navigating to it.
    /// Checks visibility immediately, since no intersection event fires for an
    /// element that is already on screen.
    pub fn mount(&mut self, route: &str, rect: ElementRect, viewport_height: f64, now: Millis) -> RevealEpoch {
        let route_changed = self.route.as_deref() != Some(route);
        if route_changed && self.settings.retrigger_on_route {
            self.revealed_at = None;
        }
        self.route = Some(route.to_string());
        self.epoch += 1;
        self.mounted = true;
        self.observing = !self.is_revealed() || !self.settings.once;
        self.safety.cancel();

        if self.check_visible(rect, viewport_height) {
            self.reveal(now);
        } else if !self.is_revealed() {
            self.safety.arm(now.after(self.settings.safety_timeout_ms));
        }
        debug!(
            "stagger mounted on '{}' (epoch {}, revealed: {})",
            route,
            self.epoch,
            self.is_revealed()
        );
        RevealEpoch(self.epoch)
    }

    /// Intersection observer callback.
    pub fn intersection(&mut self, epoch: RevealEpoch, is_intersecting: bool, now: Millis) -> bool {
        if !self.accepts(epoch) || !self.observing {
            return false;
        }
        if is_intersecting {
            return self.reveal(now);
        }
        if !self.settings.once && self.is_revealed() {
            self.revealed_at = None;
            return true;
        }
        false
    }

    /// Re-check after the next paint or once web fonts have loaded.
    pub fn layout_settled(
        &mut self,
        epoch: RevealEpoch,
        signal: LayoutSignal,
        rect: ElementRect,
        viewport_height: f64,
        now: Millis,
    ) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        if self.check_visible(rect, viewport_height) {
            debug!("stagger visible after {:?}", signal);
            return self.reveal(now);
        }
        false
    }

    /// Drive the safety timer. `rect` is the container's current box.
    pub fn tick(&mut self, now: Millis, rect: ElementRect, viewport_height: f64) -> bool {
        if self.safety.fire_due(now).is_none() {
            return false;
        }
        self.check_visible(rect, viewport_height) && self.reveal(now)
    }

    pub fn unmount(&mut self) {
        self.mounted = false;
        self.observing = false;
        self.safety.cancel();
        self.epoch += 1;
    }

    /// Top edge above the excluded bottom band and bottom edge below the viewport top.
    pub fn check_visible(&self, rect: ElementRect, viewport_height: f64) -> bool {
        rect.top < viewport_height * (1.0 - self.settings.viewport_amount) && rect.bottom() > 0.0
    }

    pub fn child_delay_ms(&self, index: usize) -> f64 {
        self.settings.delay_children_ms + index as f64 * self.settings.stagger_children_ms
    }

    /// Fade-in-up values for child `index` at `now`.
    pub fn child_frame(&self, index: usize, now: Millis) -> ChildFrame {
        let hidden = ChildFrame {
            opacity: 0.0,
            offset_y_px: self.settings.child_offset_px,
        };
        let Some(start) = self.revealed_at else {
            return hidden;
        };
        let elapsed = now.since(start) - self.child_delay_ms(index);
        if elapsed <= 0.0 {
            return hidden;
        }
        let t = if self.settings.child_duration_ms > 0.0 {
            elapsed / self.settings.child_duration_ms
        } else {
            1.0
        };
        let p = self.settings.child_easing.apply(t);
        ChildFrame {
            opacity: p,
            offset_y_px: self.settings.child_offset_px * (1.0 - p),
        }
    }

    /// When the last of `count` children finishes, if revealed.
    pub fn settles_at(&self, count: usize) -> Option<Millis> {
        let start = self.revealed_at?;
        let last = count.saturating_sub(1);
        Some(start.after(self.child_delay_ms(last) + self.settings.child_duration_ms))
    }

    fn accepts(&self, epoch: RevealEpoch) -> bool {
        self.mounted && epoch.0 == self.epoch
    }

    fn reveal(&mut self, now: Millis) -> bool {
        self.safety.cancel();
        if self.settings.once {
            self.observing = false;
        }
        if self.revealed_at.is_some() {
            return false;
        }
        self.revealed_at = Some(now);
        true
    }
}

// =============================================================================
// WASM Bindings
// =============================================================================

/// WASM-exposed stagger container.
#[wasm_bindgen]
pub struct WasmStaggerReveal {
    inner: StaggerReveal,
    epoch: Option<RevealEpoch>,
}

#[wasm_bindgen]
impl WasmStaggerReveal {
    /// Create from a JSON `StaggerSettings` (every field optional). Out-of-range values are rejected.
    #[wasm_bindgen(constructor)]
    pub fn new(settings_json: &str) -> Result<WasmStaggerReveal, JsValue> {
        let settings =
            StaggerSettings::from_json(settings_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmStaggerReveal {
            inner: StaggerReveal::new(settings),
            epoch: None,
        })
    }

    /// Mount or navigate. Rect is the container's bounding client rect.
    #[allow(clippy::too_many_arguments)]
    pub fn mount(
        &mut self,
        route: &str,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        viewport_height: f64,
        now_ms: f64,
    ) -> bool {
        let rect = ElementRect::new(left, top, width, height);
        self.epoch = Some(self.inner.mount(route, rect, viewport_height, Millis::new(now_ms)));
        self.inner.is_revealed()
    }

    pub fn intersection(&mut self, is_intersecting: bool, now_ms: f64) -> bool {
        match self.epoch {
            Some(epoch) => self
                .inner
                .intersection(epoch, is_intersecting, Millis::new(now_ms)),
            None => false,
        }
    }

    /// `fonts` is false for the next-paint check, true once `document.fonts.ready` resolves.
    pub fn layout_settled(&mut self, fonts: bool, top: f64, height: f64, viewport_height: f64, now_ms: f64) -> bool {
        let signal = if fonts {
            LayoutSignal::FontsReady
        } else {
            LayoutSignal::NextPaint
        };
        let rect = ElementRect::new(0.0, top, 0.0, height);
        match self.epoch {
            Some(epoch) => self
                .inner
                .layout_settled(epoch, signal, rect, viewport_height, Millis::new(now_ms)),
            None => false,
        }
    }

    pub fn tick(&mut self, now_ms: f64, top: f64, height: f64, viewport_height: f64) -> bool {
        let rect = ElementRect::new(0.0, top, 0.0, height);
        self.inner.tick(Millis::new(now_ms), rect, viewport_height)
    }

    pub fn unmount(&mut self) {
        self.inner.unmount();
        self.epoch = None;
    }

    pub fn is_revealed(&self) -> bool {
        self.inner.is_revealed()
    }

    pub fn child_delay_ms(&self, index: usize) -> f64 {
        self.inner.child_delay_ms(index)
    }

    /// Returns JSON `{ opacity, offset_y_px }`.
    pub fn child_frame(&self, index: usize, now_ms: f64) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.child_frame(index, Millis::new(now_ms)))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
