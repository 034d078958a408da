// Morphing dots: which shape is active, where each pooled dot is headed, and how that
// projects into container pixels. Timers are deadlines polled through `tick`.

use futures::StreamExt;
use log::{debug, trace};

use crate::cache::{load_shapes, LoadOutcome, LoadTicket, ShapeCache, ShapeFetcher};
use crate::correspondence::{map_dots, pad_with_ghosts, TransitionHint};
use crate::error::EngineError;
use crate::timer::TimerSlot;
use crate::types::*;

/// Diameter of the collapsed centre dots when no shape is showing.
const COLLAPSED_DIAMETER_PX: f64 = 6.0;
/// Smallest radius a visible slot is drawn with.
const MIN_RADIUS_PX: f64 = 1.0;

/// Where the dot pool is in its activation lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionState {
    /// Nothing requested, or a held layout has collapsed.
    NoActiveShape,
    /// Requested from the collapsed state but not loaded yet.
    ActivatingShape(String),
    /// Deactivated; the layout stays put while fading until the deadline.
    HoldingLastShape { id: String, until: Millis },
    ShapeActive(String),
}

/// The layout the next correspondence starts from.
#[derive(Debug, Clone)]
struct LastLayout {
    shape_id: String,
    slots: Vec<Dot>,
}

type Listener = Box<dyn FnMut(u64)>;

/// One morphing dots instance. Owns its registry, timers, and slot assignment.
pub struct MorphEngine {
    settings: MorphSettings,
    cache: ShapeCache,
    state: TransitionState,
    /// Latest external request, kept until it can be honoured.
    requested: Option<String>,
    slots: Vec<Dot>,
    last_layout: Option<LastLayout>,
    hold_timer: TimerSlot,
    kick_timer: TimerSlot,
    kick_target: Option<String>,
    revision: u64,
    listeners: Vec<Listener>,
}

impl MorphEngine {
    pub fn new(settings: MorphSettings) -> Self {
        MorphEngine {
            settings,
            cache: ShapeCache::new(),
            state: TransitionState::NoActiveShape,
            requested: None,
            slots: Vec::new(),
            last_layout: None,
            hold_timer: TimerSlot::new(),
            kick_timer: TimerSlot::new(),
            kick_target: None,
            revision: 0,
            listeners: Vec::new(),
        }
    }

    pub fn settings(&self) -> &MorphSettings {
        &self.settings
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn slots(&self) -> &[Dot] {
        &self.slots
    }

    pub fn cache(&self) -> &ShapeCache {
        &self.cache
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn requested(&self) -> Option<&str> {
        self.requested.as_deref()
    }

    /// Register a callback fired with the new revision whenever the render model changes.
    pub fn on_render_model_changed(&mut self, listener: impl FnMut(u64) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Apply the consumer's props. Returns a ticket when the source list changed and
    /// a new load must be started; results for that ticket go to `accept`.
    pub fn configure(
        &mut self,
        sources: Vec<ShapeSource>,
        active_id: Option<&str>,
        move_transition_ms: f64,
        fade_transition_ms: f64,
        now: Millis,
    ) -> Option<LoadTicket> {
        self.settings.move_transition_ms = move_transition_ms.max(0.0);
        self.settings.fade_transition_ms = fade_transition_ms.max(0.0);

        let ticket = if sources.as_slice() != self.cache.sources() {
            self.reset_layout();
            Some(self.cache.begin_load(sources))
        } else {
            None
        };
        self.set_active_id(active_id, now);
        ticket
    }

    /// Merge one load result; activates a pending request if its shape just arrived.
    pub fn accept(&mut self, ticket: LoadTicket, outcome: LoadOutcome, now: Millis) -> bool {
        match self.cache.accept(ticket, outcome) {
            Some(_) => {
                self.on_registry_grew(now);
                true
            }
            None => false,
        }
    }

    pub fn accept_markup(
        &mut self,
        ticket: LoadTicket,
        source: ShapeSource,
        markup: Result<String, EngineError>,
        now: Millis,
    ) -> bool {
        match self.cache.accept_markup(ticket, source, markup) {
            Some(_) => {
                self.on_registry_grew(now);
                true
            }
            None => false,
        }
    }

    /// Configure and drive the whole load to completion with `fetcher`.
    pub async fn configure_and_load<F: ShapeFetcher + ?Sized>(
        &mut self,
        fetcher: &F,
        sources: Vec<ShapeSource>,
        active_id: Option<&str>,
        now: Millis,
    ) {
        let move_ms = self.settings.move_transition_ms;
        let fade_ms = self.settings.fade_transition_ms;
        let Some(ticket) = self.configure(sources.clone(), active_id, move_ms, fade_ms, now)
        else {
            return;
        };
        let mut pending = load_shapes(fetcher, &sources);
        while let Some(outcome) = pending.next().await {
            self.accept(ticket, outcome, now);
        }
    }

    /// External active-id signal. A pending mount kick is superseded.
    pub fn set_active_id(&mut self, id: Option<&str>, now: Millis) {
        self.kick_timer.cancel();
        self.kick_target = None;
        self.apply_request(id, now);
    }

    /// Start collapsed, then activate `id` after `delay_ms` so the first appearance animates.
    pub fn schedule_activation(&mut self, id: &str, delay_ms: f64, now: Millis) {
        self.set_active_id(None, now);
        self.kick_target = Some(id.to_string());
        self.kick_timer.arm(now.after(delay_ms));
    }

    /// Fire due timers. Returns true if the render model changed.
    pub fn tick(&mut self, now: Millis) -> bool {
        let before = self.revision;

        if self.hold_timer.fire_due(now).is_some() {
            if let TransitionState::HoldingLastShape { id, .. } = &self.state {
                debug!("hold on '{}' expired, collapsing", id);
                self.state = match &self.requested {
                    Some(pending) => TransitionState::ActivatingShape(pending.clone()),
                    None => TransitionState::NoActiveShape,
                };
                self.slots = vec![Dot::ghost(); self.cache.master_count()];
                self.bump();
            }
        }

        if self.kick_timer.fire_due(now).is_some() {
            let target = self.kick_target.take();
            self.apply_request(target.as_deref(), now);
        }

        self.revision != before
    }

    /// Cancel every timer and forget all shapes. A later `configure` starts from scratch.
    pub fn unmount(&mut self) {
        self.hold_timer.cancel();
        self.kick_timer.cancel();
        self.kick_target = None;
        self.requested = None;
        self.cache.cancel();
        self.reset_layout();
    }

    /// The id whose geometry the slots are projected with, if any.
    pub fn display_shape_id(&self) -> Option<&str> {
        match &self.state {
            TransitionState::ShapeActive(id) | TransitionState::HoldingLastShape { id, .. } => {
                Some(id)
            }
            _ => None,
        }
    }

    /// Project the slots into a `width` x `height` container. Does not mutate state.
    pub fn render_model(&self, width: f64, height: f64) -> RenderFrame {
        let (w, h) = square_fallback(width.max(0.0), height.max(0.0));
        let shape = self.display_shape_id().and_then(|id| self.cache.get(id));
        let holding = matches!(self.state, TransitionState::HoldingLastShape { .. });
        let no_motion = self
            .display_shape_id()
            .is_some_and(|id| self.settings.is_no_motion(id));

        let dots = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, dot)| match shape {
                Some(shape) => {
                    let (x_percent, y_percent) = match self.settings.exit {
                        ExitPolicy::Explode { distance_percent } if holding && !no_motion => {
                            explode(i, dot, distance_percent)
                        }
                        _ => (dot.x_percent, dot.y_percent),
                    };
                    let opacity = if dot.ghost || holding {
                        0.0
                    } else {
                        self.settings.dot_opacity
                    };
                    project(shape, x_percent, y_percent, dot.r_px, (w, h), opacity)
                }
                None => RenderDot {
                    x_px: w / 2.0 - COLLAPSED_DIAMETER_PX / 2.0,
                    y_px: h / 2.0 - COLLAPSED_DIAMETER_PX / 2.0,
                    diameter_px: COLLAPSED_DIAMETER_PX,
                    opacity: 0.0,
                },
            })
            .collect();

        RenderFrame {
            dots,
            move_duration_ms: if no_motion {
                0.0
            } else {
                self.settings.move_transition_ms
            },
            fade_duration_ms: self.settings.fade_transition_ms,
            revision: self.revision,
        }
    }

    fn apply_request(&mut self, id: Option<&str>, now: Millis) {
        self.requested = id.map(str::to_string);

        match id {
            Some(id) => {
                if self.state == TransitionState::ShapeActive(id.to_string()) {
                    return;
                }
                if self.cache.contains(id) {
                    self.activate(id);
                } else if matches!(
                    self.state,
                    TransitionState::NoActiveShape | TransitionState::ActivatingShape(_)
                ) {
                    debug!("'{}' requested before it loaded; waiting", id);
                    self.state = TransitionState::ActivatingShape(id.to_string());
                }
            }
            None => match &self.state {
                TransitionState::ShapeActive(current) => {
                    let until = now.after(self.settings.hold_ms());
                    debug!("holding '{}' until {:.0}ms", current, until.as_f64());
                    self.state = TransitionState::HoldingLastShape {
                        id: current.clone(),
                        until,
                    };
                    self.hold_timer.arm(until);
                    self.bump();
                }
                TransitionState::ActivatingShape(_) => {
                    self.state = TransitionState::NoActiveShape;
                }
                TransitionState::HoldingLastShape { .. } | TransitionState::NoActiveShape => {}
            },
        }
    }

    fn activate(&mut self, id: &str) {
        let Some(shape) = self.cache.get(id) else {
            return;
        };
        let master_count = self.cache.master_count();

        let slots = match &self.last_layout {
            Some(last) if !last.slots.is_empty() => {
                let hint = TransitionHint {
                    from_id: &last.shape_id,
                    to_id: id,
                };
                map_dots(&last.slots, shape, master_count, hint, &self.settings.reservations)
            }
            _ => pad_with_ghosts(&shape.dots, master_count),
        };

        trace!("activating '{}' across {} slots", id, slots.len());
        self.hold_timer.cancel();
        self.last_layout = Some(LastLayout {
            shape_id: id.to_string(),
            slots: slots.clone(),
        });
        self.slots = slots;
        self.state = TransitionState::ShapeActive(id.to_string());
        self.bump();
    }

    fn on_registry_grew(&mut self, now: Millis) {
        let master_count = self.cache.master_count();
        let mut changed = false;
        if self.slots.len() < master_count {
            let filler = Dot::ghost();
            self.slots.resize(master_count, filler);
            if let Some(last) = &mut self.last_layout {
                last.slots.resize(master_count.max(last.slots.len()), filler);
            }
            changed = true;
        }

        let pending = self
            .requested
            .clone()
            .filter(|id| self.cache.contains(id))
            .filter(|id| !matches!(&self.state, TransitionState::ShapeActive(cur) if cur == id));
        match pending {
            Some(id) => self.apply_request(Some(&id), now),
            None if changed => self.bump(),
            None => {}
        }
    }

    fn reset_layout(&mut self) {
        self.hold_timer.cancel();
        self.state = TransitionState::NoActiveShape;
        self.slots.clear();
        self.last_layout = None;
        self.bump();
    }

    fn bump(&mut self) {
        self.revision += 1;
        let revision = self.revision;
        for listener in &mut self.listeners {
            listener(revision);
        }
    }
}

/// A container missing one dimension is treated as square.
fn square_fallback(w: f64, h: f64) -> (f64, f64) {
    match (w > 0.0, h > 0.0) {
        (true, false) => (w, w),
        (false, true) => (h, h),
        _ => (w, h),
    }
}

/// Uniform scale-to-fit, centred.
fn project(
    shape: &Shape,
    x_percent: f64,
    y_percent: f64,
    r_px: f64,
    (w, h): (f64, f64),
    opacity: f64,
) -> RenderDot {
    let scale = (w / shape.width).min(h / shape.height);
    let offset_x = (w - shape.width * scale) / 2.0;
    let offset_y = (h - shape.height * scale) / 2.0;
    let cx = x_percent / 100.0 * shape.width;
    let cy = y_percent / 100.0 * shape.height;
    let radius = (r_px * scale).max(MIN_RADIUS_PX);
    let diameter = 2.0 * radius;

    RenderDot {
        x_px: offset_x + cx * scale - radius,
        y_px: offset_y + cy * scale - radius,
        diameter_px: diameter,
        opacity,
    }
}

/// Stable per-slot noise in `[0, 1)`.
fn slot_noise(slot: usize, salt: f64) -> f64 {
    let v = ((slot as f64 + 1.0) * 12.9898 + salt * 78.233).sin() * 43_758.545_3;
    v - v.floor()
}

/// Outward position for an exiting slot: away from the centre, jittered per slot.
fn explode(slot: usize, dot: &Dot, distance_percent: f64) -> (f64, f64) {
    let dx = dot.x_percent - 50.0;
    let dy = dot.y_percent - 50.0;
    let base_angle = if dx == 0.0 && dy == 0.0 {
        slot_noise(slot, 3.0) * std::f64::consts::TAU
    } else {
        dy.atan2(dx)
    };
    let angle = base_angle + (slot_noise(slot, 1.0) - 0.5) * 0.6;
    let distance = distance_percent * (0.75 + 0.5 * slot_noise(slot, 2.0));
    (
        dot.x_percent + angle.cos() * distance,
        dot.y_percent + angle.sin() * distance,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::future::LocalBoxFuture;
    use std::cell::Cell;
    use std::rc::Rc;

    fn svg(width: u32, height: u32, points: &[(u32, u32, u32)]) -> String {
        let mut s = format!(r#"<svg width="{width}" height="{height}">"#);
        for (x, y, r) in points {
            s.push_str(&format!(r#"<circle cx="{x}" cy="{y}" r="{r}"/>"#));
        }
        s.push_str("</svg>");
        s
    }

    fn at(ms: f64) -> Millis {
        Millis::new(ms)
    }

    const TRIANGLE: &[(u32, u32, u32)] = &[(50, 10, 4), (10, 90, 4), (90, 90, 4)];
    const LINE: &[(u32, u32, u32)] = &[(10, 50, 2), (30, 50, 2), (50, 50, 2), (70, 50, 2), (90, 50, 2)];

    /// Engine with "a" (3 dots) and "b" (5 dots) fully loaded.
    fn loaded_engine() -> MorphEngine {
        let mut engine = MorphEngine::new(MorphSettings::default());
        let sources = vec![ShapeSource::new("a", "/a.svg"), ShapeSource::new("b", "/b.svg")];
        let ticket = engine
            .configure(sources.clone(), None, 650.0, 650.0, at(0.0))
            .expect("new sources start a load");
        engine.accept_markup(ticket, sources[0].clone(), Ok(svg(100, 100, TRIANGLE)), at(0.0));
        engine.accept_markup(ticket, sources[1].clone(), Ok(svg(100, 100, LINE)), at(0.0));
        engine
    }

    #[test]
    fn first_activation_seeds_native_order() {
        let mut engine = loaded_engine();
        engine.set_active_id(Some("b"), at(0.0));

        let shape = engine.cache().get("b").unwrap().clone();
        assert_eq!(engine.state(), &TransitionState::ShapeActive("b".to_string()));
        assert_eq!(engine.slots(), shape.dots.as_slice());
    }

    #[test]
    fn hold_then_collapse() {
        let mut engine = loaded_engine();
        engine.set_active_id(Some("a"), at(0.0));
        let active_slots = engine.slots().to_vec();
        assert_eq!(active_slots.len(), 5);
        assert_eq!(active_slots.iter().filter(|d| !d.ghost).count(), 3);

        engine.set_active_id(None, at(100.0));
        assert!(matches!(
            engine.state(),
            TransitionState::HoldingLastShape { id, .. } if id == "a"
        ));
        assert_eq!(engine.slots(), active_slots.as_slice());

        assert!(!engine.tick(at(749.0)));
        assert_eq!(engine.slots(), active_slots.as_slice());

        assert!(engine.tick(at(750.0)));
        assert_eq!(engine.state(), &TransitionState::NoActiveShape);
        assert!(engine
            .slots()
            .iter()
            .all(|d| d.ghost && d.x_percent == 50.0 && d.y_percent == 50.0));
    }

    #[test]
    fn hold_uses_the_longer_duration() {
        let mut engine = loaded_engine();
        let sources = engine.cache().sources().to_vec();
        engine.configure(sources, Some("a"), 300.0, 900.0, at(0.0));
        engine.set_active_id(None, at(0.0));
        assert!(!engine.tick(at(899.0)));
        assert!(engine.tick(at(900.0)));
    }

    #[test]
    fn request_during_hold_cancels_the_collapse() {
        let mut engine = loaded_engine();
        engine.set_active_id(Some("a"), at(0.0));
        engine.set_active_id(None, at(10.0));
        engine.set_active_id(Some("b"), at(20.0));

        assert_eq!(engine.state(), &TransitionState::ShapeActive("b".to_string()));
        let slots = engine.slots().to_vec();
        assert!(!engine.tick(at(10_000.0)));
        assert_eq!(engine.slots(), slots.as_slice());
    }

    #[test]
    fn transition_maps_from_previous_layout() {
        let mut engine = loaded_engine();
        engine.set_active_id(Some("b"), at(0.0));
        engine.set_active_id(Some("a"), at(10.0));

        let slots = engine.slots();
        assert_eq!(slots.len(), 5);
        assert_eq!(slots.iter().filter(|d| d.ghost).count(), 2);
        // Left end of the line is closest to the triangle's bottom-left corner.
        assert_eq!((slots[0].x_percent, slots[0].y_percent), (10.0, 90.0));
    }

    #[test]
    fn unloaded_request_waits_for_its_shape() {
        let mut engine = MorphEngine::new(MorphSettings::default());
        let sources = vec![ShapeSource::new("a", "/a.svg"), ShapeSource::new("b", "/b.svg")];
        let ticket = engine
            .configure(sources.clone(), Some("b"), 650.0, 650.0, at(0.0))
            .unwrap();
        assert_eq!(engine.state(), &TransitionState::ActivatingShape("b".to_string()));

        engine.accept_markup(ticket, sources[0].clone(), Ok(svg(100, 100, TRIANGLE)), at(5.0));
        assert_eq!(engine.state(), &TransitionState::ActivatingShape("b".to_string()));
        assert!(engine.render_model(100.0, 100.0).dots.iter().all(|d| d.opacity == 0.0));

        engine.accept_markup(ticket, sources[1].clone(), Ok(svg(100, 100, LINE)), at(9.0));
        assert_eq!(engine.state(), &TransitionState::ShapeActive("b".to_string()));
    }

    #[test]
    fn superseded_pending_request_is_abandoned() {
        let mut engine = MorphEngine::new(MorphSettings::default());
        let sources = vec![ShapeSource::new("a", "/a.svg"), ShapeSource::new("b", "/b.svg")];
        let ticket = engine
            .configure(sources.clone(), Some("a"), 650.0, 650.0, at(0.0))
            .unwrap();
        engine.set_active_id(Some("b"), at(1.0));

        engine.accept_markup(ticket, sources[0].clone(), Ok(svg(100, 100, TRIANGLE)), at(2.0));
        assert_eq!(engine.state(), &TransitionState::ActivatingShape("b".to_string()));
    }

    #[test]
    fn unknown_id_never_errors() {
        let mut engine = loaded_engine();
        engine.set_active_id(Some("a"), at(0.0));
        engine.set_active_id(Some("nope"), at(1.0));
        assert_eq!(engine.state(), &TransitionState::ShapeActive("a".to_string()));
        assert_eq!(engine.requested(), Some("nope"));
    }

    #[test]
    fn render_model_scales_to_fit_and_centres() {
        let mut engine = MorphEngine::new(MorphSettings::default());
        let source = ShapeSource::new("wide", "/wide.svg");
        let ticket = engine
            .configure(vec![source.clone()], Some("wide"), 650.0, 650.0, at(0.0))
            .unwrap();
        engine.accept_markup(ticket, source, Ok(svg(200, 100, &[(100, 50, 5)])), at(0.0));

        let frame = engine.render_model(400.0, 400.0);
        let dot = frame.dots[0];
        // scale = min(400/200, 400/100) = 2, vertical offset (400 - 200) / 2 = 100
        assert_eq!(dot.diameter_px, 20.0);
        assert_eq!(dot.x_px, 200.0 - 10.0);
        assert_eq!(dot.y_px, 100.0 + 100.0 - 10.0);
        assert_eq!(dot.opacity, 1.0);
        assert_eq!(frame.move_duration_ms, 650.0);

        // Missing height defaults to square.
        assert_eq!(engine.render_model(400.0, 0.0), frame);
    }

    #[test]
    fn collapsed_pool_renders_invisible_centre_dots() {
        let engine = loaded_engine();
        let frame = engine.render_model(100.0, 60.0);
        assert_eq!(frame.dots.len(), 5);
        for dot in frame.dots {
            assert_eq!(dot.opacity, 0.0);
            assert_eq!(dot.diameter_px, COLLAPSED_DIAMETER_PX);
            assert_eq!((dot.x_px, dot.y_px), (47.0, 27.0));
        }
    }

    #[test]
    fn held_layout_fades_in_place() {
        let mut engine = loaded_engine();
        engine.set_active_id(Some("a"), at(0.0));
        let active = engine.render_model(100.0, 100.0);
        engine.set_active_id(None, at(1.0));
        let held = engine.render_model(100.0, 100.0);

        for (a, h) in active.dots.iter().zip(&held.dots) {
            assert_eq!((a.x_px, a.y_px), (h.x_px, h.y_px));
            assert_eq!(h.opacity, 0.0);
        }
    }

    #[test]
    fn explode_exit_is_deterministic_and_outward() {
        let settings = MorphSettings {
            exit: ExitPolicy::Explode {
                distance_percent: 30.0,
            },
            ..MorphSettings::default()
        };
        let run = || {
            let mut engine = MorphEngine::new(settings.clone());
            let source = ShapeSource::new("a", "/a.svg");
            let ticket = engine
                .configure(vec![source.clone()], Some("a"), 650.0, 650.0, at(0.0))
                .unwrap();
            engine.accept_markup(ticket, source, Ok(svg(100, 100, TRIANGLE)), at(0.0));
            let active = engine.render_model(100.0, 100.0);
            engine.set_active_id(None, at(1.0));
            (active, engine.render_model(100.0, 100.0))
        };

        let (active, exploded) = run();
        let (_, again) = run();
        assert_eq!(exploded, again);

        let from_centre = |d: &RenderDot| {
            let cx = d.x_px + d.diameter_px / 2.0 - 50.0;
            let cy = d.y_px + d.diameter_px / 2.0 - 50.0;
            (cx * cx + cy * cy).sqrt()
        };
        for (a, e) in active.dots.iter().zip(&exploded.dots) {
            assert!(from_centre(e) > from_centre(a));
            assert_eq!(e.opacity, 0.0);
        }
    }

    #[test]
    fn no_motion_shapes_do_not_travel() {
        let mut engine = MorphEngine::new(MorphSettings::default());
        let source = ShapeSource::new("strategy", "/strategy.svg");
        let ticket = engine
            .configure(vec![source.clone()], Some("strategy"), 650.0, 650.0, at(0.0))
            .unwrap();
        engine.accept_markup(ticket, source, Ok(svg(100, 100, TRIANGLE)), at(0.0));

        assert_eq!(engine.render_model(100.0, 100.0).move_duration_ms, 0.0);
        engine.set_active_id(None, at(1.0));
        assert_eq!(engine.render_model(100.0, 100.0).move_duration_ms, 0.0);
    }

    #[test]
    fn listeners_see_every_revision() {
        let mut engine = loaded_engine();
        let seen = Rc::new(Cell::new(0u64));
        let sink = Rc::clone(&seen);
        engine.on_render_model_changed(move |rev| sink.set(rev));

        engine.set_active_id(Some("a"), at(0.0));
        assert_eq!(seen.get(), engine.revision());
        engine.set_active_id(None, at(1.0));
        engine.tick(at(1000.0));
        assert_eq!(seen.get(), engine.revision());
    }

    #[test]
    fn mount_kick_activates_after_delay() {
        let mut engine = loaded_engine();
        engine.schedule_activation("a", 50.0, at(0.0));
        assert_eq!(engine.state(), &TransitionState::NoActiveShape);

        assert!(!engine.tick(at(49.0)));
        assert!(engine.tick(at(50.0)));
        assert_eq!(engine.state(), &TransitionState::ShapeActive("a".to_string()));
    }

    #[test]
    fn explicit_request_supersedes_mount_kick() {
        let mut engine = loaded_engine();
        engine.schedule_activation("a", 50.0, at(0.0));
        engine.set_active_id(Some("b"), at(10.0));
        engine.tick(at(100.0));
        assert_eq!(engine.state(), &TransitionState::ShapeActive("b".to_string()));
    }

    #[test]
    fn same_sources_do_not_reload() {
        let mut engine = loaded_engine();
        let sources = engine.cache().sources().to_vec();
        assert!(engine
            .configure(sources, Some("a"), 650.0, 650.0, at(0.0))
            .is_none());
        assert_eq!(engine.cache().len(), 2);
    }

    #[test]
    fn pool_grows_with_larger_shapes() {
        let mut engine = MorphEngine::new(MorphSettings::default());
        let sources = vec![ShapeSource::new("a", "/a.svg"), ShapeSource::new("b", "/b.svg")];
        let ticket = engine
            .configure(sources.clone(), Some("a"), 650.0, 650.0, at(0.0))
            .unwrap();
        engine.accept_markup(ticket, sources[0].clone(), Ok(svg(100, 100, TRIANGLE)), at(0.0));
        assert_eq!(engine.slots().len(), 3);

        engine.accept_markup(ticket, sources[1].clone(), Ok(svg(100, 100, LINE)), at(1.0));
        assert_eq!(engine.slots().len(), 5);
        assert_eq!(engine.slots().iter().filter(|d| d.ghost).count(), 2);
    }

    #[test]
    fn unmount_cancels_pending_hold() {
        let mut engine = loaded_engine();
        engine.set_active_id(Some("a"), at(0.0));
        engine.set_active_id(None, at(1.0));
        engine.unmount();
        assert!(!engine.tick(at(5000.0)));
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn remount_with_same_sources_reloads() {
        let mut engine = loaded_engine();
        let sources = engine.cache().sources().to_vec();
        engine.set_active_id(Some("a"), at(0.0));
        engine.unmount();

        let ticket = engine
            .configure(sources.clone(), Some("a"), 650.0, 650.0, at(100.0))
            .expect("remount starts a fresh load");
        assert_eq!(engine.state(), &TransitionState::ActivatingShape("a".to_string()));

        engine.accept_markup(ticket, sources[0].clone(), Ok(svg(100, 100, TRIANGLE)), at(110.0));
        assert_eq!(engine.state(), &TransitionState::ShapeActive("a".to_string()));
        assert_eq!(engine.cache().len(), 1);
    }

    struct StaticFetcher;

    impl ShapeFetcher for StaticFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<String, EngineError>> {
            Box::pin(async move {
                match url {
                    "/a.svg" => Ok(svg(100, 100, TRIANGLE)),
                    _ => Err(EngineError::Fetch {
                        url: url.to_string(),
                        message: "not found".to_string(),
                    }),
                }
            })
        }
    }

    #[test]
    fn configure_and_load_activates_once_ready() {
        let mut engine = MorphEngine::new(MorphSettings::default());
        let sources = vec![ShapeSource::new("a", "/a.svg"), ShapeSource::new("gone", "/gone.svg")];
        block_on(engine.configure_and_load(&StaticFetcher, sources, Some("a"), at(0.0)));

        assert_eq!(engine.state(), &TransitionState::ShapeActive("a".to_string()));
        assert_eq!(engine.cache().len(), 1);
    }
}
