// dotmorph_core: Rust/WASM engine for morphing dot shapes, staggered reveals, and typewriter openers.
// All animation state lives here; JS measures the DOM, drives `tick`, and draws what `render_model` returns.

mod cache;
mod columns;
mod correspondence;
mod easing;
mod error;
mod morph;
mod opener;
mod palette;
mod shape;
mod stagger;
mod timer;
mod types;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::StreamExt;
use log::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

pub use cache::{load_into, load_shapes, LoadOutcome, LoadTicket, ShapeCache, ShapeFetcher};
pub use columns::{measure_columns, ColumnLayout, ColumnSettings, ItemPlacement};
pub use correspondence::{map_dots, pad_with_ghosts, TransitionHint};
pub use easing::Easing;
pub use error::{EngineError, ParseError};
pub use morph::{MorphEngine, TransitionState};
pub use opener::{
    forward_step, prefix_step, reverse_step, Opener, OpenerEvent, OpenerMode, OpenerPhase, WasmOpener,
};
pub use palette::{
    choose_source, default_palette, icon_key, normalize_keyword, ToggleSelector, ToggleTrigger, FALLBACK_ID,
    MOUNT_KICK_MS,
};
pub use shape::{parse_shape, reading_order};
pub use stagger::{ChildFrame, LayoutSignal, RevealEpoch, StaggerReveal, WasmStaggerReveal};
pub use timer::{TimerSlot, TimerToken};
pub use types::*;

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    #[cfg(feature = "console_log")]
    let _ = console_log::init_with_level(log::Level::Debug);
}

fn to_js(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Adapts a JS `(url) => Promise<string> | string` function.
struct JsFetcher {
    func: js_sys::Function,
}

impl ShapeFetcher for JsFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<String, EngineError>> {
        Box::pin(async move {
            let fail = |e: JsValue| EngineError::Fetch {
                url: url.to_string(),
                message: e.as_string().unwrap_or_else(|| format!("{:?}", e)),
            };
            let returned = self.func.call1(&JsValue::NULL, &JsValue::from_str(url)).map_err(fail)?;
            let value = JsFuture::from(js_sys::Promise::resolve(&returned))
                .await
                .map_err(fail)?;
            value.as_string().ok_or_else(|| EngineError::Fetch {
                url: url.to_string(),
                message: "response is not a string".to_string(),
            })
        })
    }
}

/// Forwards revision bumps to the JS listener.
#[derive(Clone, Default)]
struct Notifier {
    pending: Rc<Cell<Option<u64>>>,
    callback: Rc<RefCell<Option<js_sys::Function>>>,
}

impl Notifier {
    /// Notify from a fresh task. Calls made from inside an `Engine` method run while
    /// wasm-bindgen still holds the object borrowed, so a listener that reads the
    /// render model must not be invoked synchronously.
    fn schedule(&self) {
        if self.pending.get().is_none() {
            return;
        }
        if self.callback.borrow().is_none() {
            self.pending.set(None);
            return;
        }
        let notifier = self.clone();
        wasm_bindgen_futures::spawn_local(async move { notifier.flush() });
    }

    /// Notify now. Only safe outside `Engine` methods, e.g. from a load task.
    fn flush(&self) {
        let Some(revision) = self.pending.take() else {
            return;
        };
        if let Some(callback) = self.callback.borrow().as_ref() {
            if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_f64(revision as f64)) {
                warn!("render model listener threw: {:?}", e);
            }
        }
    }
}

/// Main engine interface exposed to JavaScript: one morphing dots instance.
#[wasm_bindgen]
pub struct Engine {
    morph: Rc<RefCell<MorphEngine>>,
    fetcher: Option<Rc<JsFetcher>>,
    /// Load requested before a fetcher was installed.
    pending_load: Option<(LoadTicket, Vec<ShapeSource>)>,
    notifier: Notifier,
    /// Last host time seen; stamps load results that arrive between ticks.
    last_now: Rc<Cell<f64>>,
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Engine, JsValue> {
        let config: EngineConfig = serde_json::from_str(config_json)
            .map_err(|e| to_js(EngineError::InvalidConfig(e.to_string())))?;
        config.validate().map_err(to_js)?;

        let notifier = Notifier::default();
        let mut morph = MorphEngine::new(config.morph);
        let pending = Rc::clone(&notifier.pending);
        morph.on_render_model_changed(move |revision| pending.set(Some(revision)));

        Ok(Engine {
            morph: Rc::new(RefCell::new(morph)),
            fetcher: None,
            pending_load: None,
            notifier,
            last_now: Rc::new(Cell::new(0.0)),
        })
    }

    /// Install the `(url) => Promise<string>` used to load shape sources.
    /// A load configured before any fetcher was available starts now.
    pub fn set_fetcher(&mut self, fetcher: js_sys::Function) {
        let fetcher = Rc::new(JsFetcher { func: fetcher });
        self.fetcher = Some(Rc::clone(&fetcher));
        if let Some((ticket, sources)) = self.pending_load.take() {
            if self.morph.borrow().cache().is_current(ticket) {
                self.spawn_load(fetcher, ticket, sources);
            }
        }
    }

    /// Apply props. `sources_json` is an array of `{ id, url }`. A changed source
    /// list starts a new load in the background; stale results are dropped.
    pub fn configure(
        &mut self,
        sources_json: &str,
        active_id: Option<String>,
        move_transition_ms: f64,
        fade_transition_ms: f64,
        now_ms: f64,
    ) -> Result<(), JsValue> {
        let sources: Vec<ShapeSource> = serde_json::from_str(sources_json)
            .map_err(|e| to_js(EngineError::InvalidConfig(e.to_string())))?;
        self.last_now.set(now_ms);

        let ticket = self.morph.borrow_mut().configure(
            sources.clone(),
            active_id.as_deref(),
            move_transition_ms,
            fade_transition_ms,
            Millis::new(now_ms),
        );
        self.notifier.schedule();

        let Some(ticket) = ticket else {
            return Ok(());
        };
        match self.fetcher.clone() {
            Some(fetcher) => {
                self.pending_load = None;
                self.spawn_load(fetcher, ticket, sources);
            }
            None => {
                warn!("{}; load deferred until set_fetcher", EngineError::NoFetcher);
                self.pending_load = Some((ticket, sources));
            }
        }
        Ok(())
    }

    pub fn set_active_id(&mut self, active_id: Option<String>, now_ms: f64) {
        self.last_now.set(now_ms);
        self.morph
            .borrow_mut()
            .set_active_id(active_id.as_deref(), Millis::new(now_ms));
        self.notifier.schedule();
    }

    /// Mount kick: start collapsed and activate `id` after `delay_ms`.
    pub fn schedule_activation(&mut self, id: &str, delay_ms: f64, now_ms: f64) {
        self.last_now.set(now_ms);
        self.morph
            .borrow_mut()
            .schedule_activation(id, delay_ms, Millis::new(now_ms));
        self.notifier.schedule();
    }

    /// Fire due timers. Returns true if the render model changed.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.last_now.set(now_ms);
        let changed = self.morph.borrow_mut().tick(Millis::new(now_ms));
        self.notifier.schedule();
        changed
    }

    /// Returns `RenderFrame` JSON for a `width` x `height` container.
    pub fn render_model(&self, width: f64, height: f64) -> Result<String, JsValue> {
        let frame = self.morph.borrow().render_model(width, height);
        serde_json::to_string(&frame).map_err(|e| to_js(e.into()))
    }

    /// Register `(revision) => void`, called whenever the render model changes.
    /// Calls are delivered asynchronously, so the listener may read `render_model`.
    pub fn on_render_model_changed(&mut self, listener: js_sys::Function) {
        *self.notifier.callback.borrow_mut() = Some(listener);
    }

    pub fn revision(&self) -> f64 {
        self.morph.borrow().revision() as f64
    }

    pub fn unmount(&mut self) {
        self.morph.borrow_mut().unmount();
        self.pending_load = None;
        self.notifier.pending.set(None);
        *self.notifier.callback.borrow_mut() = None;
    }
}

impl Engine {
    /// Fetch and merge `sources` in the background. No borrow is held across an await.
    fn spawn_load(&self, fetcher: Rc<JsFetcher>, ticket: LoadTicket, sources: Vec<ShapeSource>) {
        let morph = Rc::clone(&self.morph);
        let notifier = self.notifier.clone();
        let last_now = Rc::clone(&self.last_now);
        wasm_bindgen_futures::spawn_local(async move {
            let mut pending = load_shapes(fetcher.as_ref(), &sources);
            while let Some(outcome) = pending.next().await {
                let now = Millis::new(last_now.get());
                morph.borrow_mut().accept(ticket, outcome, now);
                notifier.flush();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_creation_works() {
        assert!(Engine::new("{}").is_ok());
        let config = r#"{"morph":{"move_transition_ms":400,"exit":{"type":"Explode","distance_percent":30}}}"#;
        assert!(Engine::new(config).is_ok());
    }

    #[test]
    fn engine_render_model_is_json() {
        let engine = Engine::new("{}").unwrap();
        let json = engine.render_model(100.0, 100.0).unwrap();
        let frame: RenderFrame = serde_json::from_str(&json).unwrap();
        assert!(frame.dots.is_empty());
        assert_eq!(frame.revision, 0);
    }

    #[test]
    fn load_without_fetcher_is_kept_until_one_arrives() {
        let mut engine = Engine::new("{}").unwrap();
        let sources = r#"[{"id":"a","url":"/a.svg"}]"#;
        engine.configure(sources, Some("a".to_string()), 650.0, 650.0, 0.0).unwrap();

        let (ticket, pending) = engine.pending_load.clone().expect("load is deferred");
        assert_eq!(pending, vec![ShapeSource::new("a", "/a.svg")]);
        assert!(engine.morph.borrow().cache().is_current(ticket));

        // Re-applying the same props keeps the deferred load.
        engine.configure(sources, Some("a".to_string()), 650.0, 650.0, 10.0).unwrap();
        assert!(engine.pending_load.is_some());

        engine.unmount();
        assert!(engine.pending_load.is_none());
        engine.configure(sources, Some("a".to_string()), 650.0, 650.0, 20.0).unwrap();
        assert!(engine.pending_load.is_some());
    }
}
