// Typewriter opener: drives a text string between a collapsed and an expanded form.
// Forward steps walk a scripted sequence (hover) or reveal by prefix (autoplay);
// reverse steps apply a reduction rule that always terminates at the collapsed text.

use log::debug;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::timer::TimerSlot;
use crate::types::{Millis, OpenerSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenerMode {
    /// Splash screen: expand, pause, collapse, then report `Finished`.
    Autoplay,
    /// Logo: expand while hovered, collapse on leave.
    Hover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenerPhase {
    Idle,
    Forward,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text")]
pub enum OpenerEvent {
    TextChanged(String),
    Finished,
}

/// Next entry of the scripted `sequence` after `current`.
///
/// Text not found in the sequence restarts it from the first entry. Returns
/// `None` once the last entry has been reached.
pub fn forward_step(sequence: &[String], current: &str) -> Option<String> {
    let next = match sequence.iter().position(|s| s == current) {
        Some(i) => i + 1,
        None => 0,
    };
    sequence.get(next).cloned()
}

/// Reveal one more character of `full`.
pub fn prefix_step(full: &str, current: &str) -> Option<String> {
    let shown = current.chars().count();
    if shown >= full.chars().count() {
        return None;
    }
    Some(full.chars().take(shown + 1).collect())
}

/// One reduction towards `target`.
///
/// A " e." joint collapses into "e." first, then the character in front of the
/// last "e." is dropped, otherwise the character in front of the final period.
/// Anything without a period, or with nothing left before it, snaps to `target`.
pub fn reverse_step(current: &str, target: &str) -> String {
    if current == target {
        return target.to_string();
    }
    let Some(dot) = current.rfind('.') else {
        return target.to_string();
    };
    if let Some(i) = current.find(" e.") {
        let mut out = String::with_capacity(current.len());
        out.push_str(&current[..i]);
        out.push_str(&current[i + 1..]);
        return out;
    }
    if let Some(i) = current.rfind("e.") {
        if let Some(out) = remove_char_before(current, i) {
            return out;
        }
    }
    remove_char_before(current, dot).unwrap_or_else(|| target.to_string())
}

fn remove_char_before(s: &str, byte_idx: usize) -> Option<String> {
    let (start, _) = s[..byte_idx].char_indices().next_back()?;
    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..start]);
    out.push_str(&s[byte_idx..]);
    Some(out)
}

/// Timer-driven typewriter.
#[derive(Debug)]
pub struct Opener {
    settings: OpenerSettings,
    mode: OpenerMode,
    phase: OpenerPhase,
    text: String,
    desired_end_text: Option<String>,
    step: TimerSlot,
    finished: bool,
}

impl Opener {
    /// Start an autoplay run from empty text.
    pub fn autoplay(settings: OpenerSettings, now: Millis) -> Self {
        let mut opener = Opener {
            desired_end_text: Some(settings.collapsed_text.clone()),
            settings,
            mode: OpenerMode::Autoplay,
            phase: OpenerPhase::Idle,
            text: String::new(),
            step: TimerSlot::new(),
            finished: false,
        };
        let delay = opener.settings.forward_start_delay_ms;
        opener.start(OpenerPhase::Forward, now.after(delay));
        opener
    }

    /// An idle hover opener showing the collapsed text.
    pub fn hover(settings: OpenerSettings) -> Self {
        Opener {
            text: settings.collapsed_text.clone(),
            settings,
            mode: OpenerMode::Hover,
            phase: OpenerPhase::Idle,
            desired_end_text: None,
            step: TimerSlot::new(),
            finished: false,
        }
    }

    pub fn mode(&self) -> OpenerMode {
        self.mode
    }

    pub fn phase(&self) -> OpenerPhase {
        self.phase
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn desired_end_text(&self) -> Option<&str> {
        self.desired_end_text.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn pointer_enter(&mut self, now: Millis) {
        if self.mode != OpenerMode::Hover {
            return;
        }
        self.desired_end_text = Some(self.settings.full_text.clone());
        if self.phase == OpenerPhase::Idle && self.text != self.settings.full_text {
            self.start(OpenerPhase::Forward, now);
        }
    }

    pub fn pointer_leave(&mut self, now: Millis) {
        if self.mode != OpenerMode::Hover {
            return;
        }
        self.desired_end_text = Some(self.settings.collapsed_text.clone());
        if self.phase == OpenerPhase::Idle && self.text != self.settings.collapsed_text {
            let delay = self.settings.reverse_start_delay_ms;
            self.start(OpenerPhase::Reverse, now.after(delay));
        }
    }

    /// Run every step due by `now`, in order.
    pub fn tick(&mut self, now: Millis) -> Vec<OpenerEvent> {
        let mut events = Vec::new();
        while let Some(at) = self.step.deadline() {
            if self.step.fire_due(now).is_none() {
                break;
            }
            self.run_step(at, &mut events);
        }
        events
    }

    pub fn unmount(&mut self) {
        self.step.cancel();
        self.phase = OpenerPhase::Idle;
    }

    fn start(&mut self, phase: OpenerPhase, first_step_at: Millis) {
        debug!("opener {:?} from '{}'", phase, self.text);
        self.phase = phase;
        self.step.arm(first_step_at);
    }

    fn run_step(&mut self, at: Millis, events: &mut Vec<OpenerEvent>) {
        match self.phase {
            OpenerPhase::Forward => {
                let next = match self.mode {
                    OpenerMode::Autoplay => prefix_step(&self.settings.full_text, &self.text),
                    OpenerMode::Hover => forward_step(&self.settings.hover_sequence, &self.text),
                };
                match next {
                    Some(text) => {
                        let mut delay = self.settings.forward_delay_ms;
                        if self.mode == OpenerMode::Autoplay && text.ends_with(' ') {
                            delay += self.settings.word_break_extra_ms;
                        }
                        self.set_text(text, events);
                        if self.forward_done() {
                            self.forward_finished(at);
                        } else {
                            self.step.arm(at.after(delay));
                        }
                    }
                    None => self.forward_finished(at),
                }
            }
            OpenerPhase::Reverse => {
                let target = self.settings.collapsed_text.clone();
                let text = reverse_step(&self.text, &target);
                self.set_text(text, events);
                if self.text == target {
                    self.reverse_finished(at.after(self.settings.reverse_delay_ms), events);
                } else {
                    self.step.arm(at.after(self.settings.reverse_delay_ms));
                }
            }
            OpenerPhase::Idle => {}
        }
    }

    fn forward_done(&self) -> bool {
        match self.mode {
            OpenerMode::Autoplay => self.text == self.settings.full_text,
            OpenerMode::Hover => self.settings.hover_sequence.last() == Some(&self.text),
        }
    }

    /// Terminal point of the forward phase, reached at `at`.
    fn forward_finished(&mut self, at: Millis) {
        let wants_collapse = self.desired_end_text.as_deref() == Some(self.settings.collapsed_text.as_str());
        if !wants_collapse {
            self.phase = OpenerPhase::Idle;
            return;
        }
        let hold = match self.mode {
            OpenerMode::Autoplay => self.settings.autoplay_reverse_pause_ms,
            OpenerMode::Hover => self.settings.forward_delay_ms,
        };
        self.start(OpenerPhase::Reverse, at.after(hold + self.settings.reverse_start_delay_ms));
    }

    fn reverse_finished(&mut self, from: Millis, events: &mut Vec<OpenerEvent>) {
        if self.mode == OpenerMode::Autoplay {
            self.phase = OpenerPhase::Idle;
            self.finished = true;
            events.push(OpenerEvent::Finished);
            return;
        }
        let wants_expand = self.desired_end_text.as_deref() == Some(self.settings.full_text.as_str());
        if wants_expand {
            self.start(OpenerPhase::Forward, from);
        } else {
            self.phase = OpenerPhase::Idle;
        }
    }

    fn set_text(&mut self, text: String, events: &mut Vec<OpenerEvent>) {
        if text != self.text {
            self.text = text;
            events.push(OpenerEvent::TextChanged(self.text.clone()));
        }
    }
}

// =============================================================================
// WASM Bindings
// =============================================================================

/// WASM-exposed typewriter opener.
#[wasm_bindgen]
pub struct WasmOpener {
    inner: Opener,
}

fn parse_settings(settings_json: &str) -> Result<OpenerSettings, JsValue> {
    OpenerSettings::from_json(settings_json).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
impl WasmOpener {
    pub fn new_autoplay(settings_json: &str, now_ms: f64) -> Result<WasmOpener, JsValue> {
        Ok(WasmOpener {
            inner: Opener::autoplay(parse_settings(settings_json)?, Millis::new(now_ms)),
        })
    }

    pub fn new_hover(settings_json: &str) -> Result<WasmOpener, JsValue> {
        Ok(WasmOpener {
            inner: Opener::hover(parse_settings(settings_json)?),
        })
    }

    pub fn pointer_enter(&mut self, now_ms: f64) {
        self.inner.pointer_enter(Millis::new(now_ms));
    }

    pub fn pointer_leave(&mut self, now_ms: f64) {
        self.inner.pointer_leave(Millis::new(now_ms));
    }

    /// Returns the JSON array of events produced by this tick.
    pub fn tick(&mut self, now_ms: f64) -> Result<String, JsValue> {
        let events = self.inner.tick(Millis::new(now_ms));
        serde_json::to_string(&events).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn text(&self) -> String {
        self.inner.text().to_string()
    }

    pub fn phase(&self) -> String {
        format!("{:?}", self.inner.phase())
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    pub fn unmount(&mut self) {
        self.inner.unmount();
    }
}
