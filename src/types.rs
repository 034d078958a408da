// Strong typing over strings. Newtypes for time and percent-space geometry, plus the JS-facing config.
// Everything here is plain data; state machines live in their own modules.

use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::error::EngineError;

/// Milliseconds on the host clock (`performance.now()` in the browser).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
pub struct Millis(f64);

impl Millis {
    pub fn new(ms: f64) -> Self {
        Millis(ms)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Timestamp `ms` milliseconds after this one.
    pub fn after(&self, ms: f64) -> Self {
        Millis(self.0 + ms.max(0.0))
    }

    /// Milliseconds elapsed since `earlier`, never negative.
    pub fn since(&self, earlier: Millis) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

/// A single circle of a shape, expressed relative to the shape's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dot {
    pub x_percent: f64,
    pub y_percent: f64,
    pub r_percent_of_width: f64,
    /// Radius in the drawing's own coordinate system.
    pub r_px: f64,
    pub ghost: bool,
}

impl Dot {
    pub fn new(x_percent: f64, y_percent: f64, r_percent_of_width: f64, r_px: f64) -> Self {
        Dot {
            x_percent,
            y_percent,
            r_percent_of_width,
            r_px,
            ghost: false,
        }
    }

    /// Invisible placeholder parked at the centre of the box.
    pub fn ghost() -> Self {
        Dot {
            x_percent: 50.0,
            y_percent: 50.0,
            r_percent_of_width: 0.0,
            r_px: 0.0,
            ghost: true,
        }
    }

    /// Squared distance in percent-space.
    pub fn dist2(&self, other: &Dot) -> f64 {
        let dx = self.x_percent - other.x_percent;
        let dy = self.y_percent - other.y_percent;
        dx * dx + dy * dy
    }
}

/// A parsed vector drawing reduced to its dots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: String,
    /// Sorted by `(y_percent, x_percent)`. Never empty.
    pub dots: Vec<Dot>,
    pub width: f64,
    pub height: f64,
    pub median_radius_px: f64,
}

/// Where a shape resource lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeSource {
    pub id: String,
    pub url: String,
}

impl ShapeSource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        ShapeSource {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// One slot of the dot pool projected into container pixels.
/// `x_px`/`y_px` are the top-left corner of the dot's box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderDot {
    pub x_px: f64,
    pub y_px: f64,
    pub diameter_px: f64,
    pub opacity: f64,
}

/// Everything the presentation layer needs to draw one state of the dot pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub dots: Vec<RenderDot>,
    pub move_duration_ms: f64,
    pub fade_duration_ms: f64,
    pub revision: u64,
}

/// Engine configuration passed from JS.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub morph: MorphSettings,
    #[serde(default)]
    pub opener: OpenerSettings,
    #[serde(default)]
    pub stagger: StaggerSettings,
}

impl EngineConfig {
    /// Reject values no animation can be built from.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.morph.validate()?;
        self.opener.validate()?;
        self.stagger.validate()
    }
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig(message.into())
}

fn non_negative(name: &str, value: f64) -> Result<(), EngineError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be non-negative, got {value}")))
    }
}

/// Parse settings JSON (every field optional) and validate the result.
fn settings_from_json<T: serde::de::DeserializeOwned>(
    json: &str,
    validate: impl Fn(&T) -> Result<(), EngineError>,
) -> Result<T, EngineError> {
    let settings: T = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
    validate(&settings)?;
    Ok(settings)
}

/// How dots leave a shape that is being deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum ExitPolicy {
    /// Keep the last layout in place while fading out.
    #[default]
    Hold,
    /// Push dots radially outward with per-slot jitter while fading out.
    Explode { distance_percent: f64 },
}

/// Axis-aligned region in percent-space. Bounds are exclusive; `None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Region {
    #[serde(default)]
    pub min_x: Option<f64>,
    #[serde(default)]
    pub max_x: Option<f64>,
    #[serde(default)]
    pub min_y: Option<f64>,
    #[serde(default)]
    pub max_y: Option<f64>,
}

impl Region {
    pub fn contains(&self, dot: &Dot) -> bool {
        self.min_x.map_or(true, |v| dot.x_percent > v)
            && self.max_x.map_or(true, |v| dot.x_percent < v)
            && self.min_y.map_or(true, |v| dot.y_percent > v)
            && self.max_y.map_or(true, |v| dot.y_percent < v)
    }
}

/// Which previous slots take part in a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceCohort {
    /// Only slots strictly left of this x are candidates.
    pub max_x_percent: f64,
    /// Cohort size as a fraction of the master count (floored, at least `min_count`).
    pub fraction_of_master: f64,
    #[serde(default = "default_min_count")]
    pub min_count: usize,
}

fn default_min_count() -> usize {
    1
}

impl SourceCohort {
    pub fn size(&self, master_count: usize) -> usize {
        let scaled = (master_count as f64 * self.fraction_of_master).floor() as usize;
        scaled.max(self.min_count)
    }
}

/// Reserve a target region for a cohort of source slots on a named shape pair.
/// Patterns match shape ids case-insensitively as substrings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReservation {
    pub from_pattern: String,
    pub to_pattern: String,
    pub cohort: SourceCohort,
    pub region: Region,
}

impl RegionReservation {
    pub fn applies(&self, from_id: &str, to_id: &str) -> bool {
        contains_ignore_case(from_id, &self.from_pattern)
            && contains_ignore_case(to_id, &self.to_pattern)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Morphing dots behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorphSettings {
    #[serde(default = "default_transition_ms")]
    pub move_transition_ms: f64,
    #[serde(default = "default_transition_ms")]
    pub fade_transition_ms: f64,
    #[serde(default = "default_dot_opacity")]
    pub dot_opacity: f64,
    /// Shapes whose dots only fade, never travel.
    #[serde(default = "default_no_motion_ids")]
    pub no_motion_ids: Vec<String>,
    #[serde(default)]
    pub exit: ExitPolicy,
    #[serde(default = "default_reservations")]
    pub reservations: Vec<RegionReservation>,
}

impl Default for MorphSettings {
    fn default() -> Self {
        MorphSettings {
            move_transition_ms: default_transition_ms(),
            fade_transition_ms: default_transition_ms(),
            dot_opacity: default_dot_opacity(),
            no_motion_ids: default_no_motion_ids(),
            exit: ExitPolicy::default(),
            reservations: default_reservations(),
        }
    }
}

impl MorphSettings {
    /// How long a deactivated layout is held before collapsing.
    pub fn validate(&self) -> Result<(), EngineError> {
        non_negative("move_transition_ms", self.move_transition_ms)?;
        non_negative("fade_transition_ms", self.fade_transition_ms)?;
        if !(0.0..=1.0).contains(&self.dot_opacity) {
            return Err(invalid(format!("dot_opacity {} is outside 0..=1", self.dot_opacity)));
        }
        Ok(())
    }

    pub fn hold_ms(&self) -> f64 {
        self.move_transition_ms.max(self.fade_transition_ms)
    }

    pub fn is_no_motion(&self, id: &str) -> bool {
        self.no_motion_ids.iter().any(|n| n == id)
    }
}

fn default_transition_ms() -> f64 {
    650.0
}

fn default_dot_opacity() -> f64 {
    1.0
}

fn default_no_motion_ids() -> Vec<String> {
    vec!["strategy".to_string()]
}

/// Circle → question mark: the left side of the ring becomes the question mark's leg.
fn default_reservations() -> Vec<RegionReservation> {
    vec![RegionReservation {
        from_pattern: "circle".to_string(),
        to_pattern: "question".to_string(),
        cohort: SourceCohort {
            max_x_percent: 45.0,
            fraction_of_master: 0.18,
            min_count: 1,
        },
        region: Region {
            min_x: Some(30.0),
            max_x: Some(70.0),
            min_y: Some(80.0),
            max_y: None,
        },
    }]
}

/// Typewriter opener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenerSettings {
    #[serde(default = "default_forward_start_delay")]
    pub forward_start_delay_ms: f64,
    #[serde(default = "default_forward_delay")]
    pub forward_delay_ms: f64,
    #[serde(default)]
    pub reverse_start_delay_ms: f64,
    #[serde(default = "default_reverse_delay")]
    pub reverse_delay_ms: f64,
    #[serde(default = "default_autoplay_reverse_pause")]
    pub autoplay_reverse_pause_ms: f64,
    #[serde(default = "default_word_break_extra")]
    pub word_break_extra_ms: f64,
    #[serde(default = "default_full_text")]
    pub full_text: String,
    #[serde(default = "default_collapsed_text")]
    pub collapsed_text: String,
    /// Scripted expansion used on hover; starts at the collapsed text, ends at the full text.
    #[serde(default = "default_hover_sequence")]
    pub hover_sequence: Vec<String>,
}

impl Default for OpenerSettings {
    fn default() -> Self {
        OpenerSettings {
            forward_start_delay_ms: default_forward_start_delay(),
            forward_delay_ms: default_forward_delay(),
            reverse_start_delay_ms: 0.0,
            reverse_delay_ms: default_reverse_delay(),
            autoplay_reverse_pause_ms: default_autoplay_reverse_pause(),
            word_break_extra_ms: default_word_break_extra(),
            full_text: default_full_text(),
            collapsed_text: default_collapsed_text(),
            hover_sequence: default_hover_sequence(),
        }
    }
}

impl OpenerSettings {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        settings_from_json(json, OpenerSettings::validate)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        non_negative("forward_start_delay_ms", self.forward_start_delay_ms)?;
        non_negative("forward_delay_ms", self.forward_delay_ms)?;
        non_negative("reverse_start_delay_ms", self.reverse_start_delay_ms)?;
        non_negative("reverse_delay_ms", self.reverse_delay_ms)?;
        non_negative("autoplay_reverse_pause_ms", self.autoplay_reverse_pause_ms)?;
        non_negative("word_break_extra_ms", self.word_break_extra_ms)?;
        if self.full_text.is_empty() || self.collapsed_text.is_empty() {
            return Err(invalid("full_text and collapsed_text must not be empty"));
        }
        if self.hover_sequence.is_empty() {
            return Err(invalid("hover_sequence must not be empty"));
        }
        Ok(())
    }
}

fn default_forward_start_delay() -> f64 {
    500.0
}

fn default_forward_delay() -> f64 {
    150.0
}

fn default_reverse_delay() -> f64 {
    60.0
}

fn default_autoplay_reverse_pause() -> f64 {
    1000.0
}

fn default_word_break_extra() -> f64 {
    400.0
}

fn default_full_text() -> String {
    "itir eraslan.".to_string()
}

fn default_collapsed_text() -> String {
    "ie.".to_string()
}

fn default_hover_sequence() -> Vec<String> {
    [
        "ie.",
        "ite.",
        "itie.",
        "itire.",
        "itir e.",
        "itir er.",
        "itir era.",
        "itir eras.",
        "itir erasl.",
        "itir erasla.",
        "itir eraslan.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Staggered reveal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaggerSettings {
    #[serde(default = "default_delay_children")]
    pub delay_children_ms: f64,
    #[serde(default = "default_stagger_children")]
    pub stagger_children_ms: f64,
    /// Fraction of the viewport bottom excluded from the visibility check.
    #[serde(default = "default_viewport_amount")]
    pub viewport_amount: f64,
    /// Stay revealed after leaving the viewport. When false, leaving re-arms the reveal.
    #[serde(default = "default_true")]
    pub once: bool,
    #[serde(default = "default_true")]
    pub retrigger_on_route: bool,
    #[serde(default = "default_safety_timeout")]
    pub safety_timeout_ms: f64,
    #[serde(default = "default_child_duration")]
    pub child_duration_ms: f64,
    #[serde(default = "default_child_offset")]
    pub child_offset_px: f64,
    /// Curve for each child's fade-in-up, e.g. `"Linear"` or
    /// `{"CubicBezier":{"x1":0.4,"y1":0,"x2":0.2,"y2":1}}`.
    #[serde(default = "default_child_easing")]
    pub child_easing: Easing,
}

impl Default for StaggerSettings {
    fn default() -> Self {
        StaggerSettings {
            delay_children_ms: default_delay_children(),
            stagger_children_ms: default_stagger_children(),
            viewport_amount: default_viewport_amount(),
            once: true,
            retrigger_on_route: true,
            safety_timeout_ms: default_safety_timeout(),
            child_duration_ms: default_child_duration(),
            child_offset_px: default_child_offset(),
            child_easing: default_child_easing(),
        }
    }
}

impl StaggerSettings {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        settings_from_json(json, StaggerSettings::validate)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..1.0).contains(&self.viewport_amount) {
            return Err(invalid(format!(
                "viewport_amount {} is outside 0..1",
                self.viewport_amount
            )));
        }
        non_negative("delay_children_ms", self.delay_children_ms)?;
        non_negative("stagger_children_ms", self.stagger_children_ms)?;
        non_negative("safety_timeout_ms", self.safety_timeout_ms)?;
        non_negative("child_duration_ms", self.child_duration_ms)
    }
}

fn default_delay_children() -> f64 {
    100.0
}

fn default_stagger_children() -> f64 {
    120.0
}

fn default_viewport_amount() -> f64 {
    0.05
}

fn default_true() -> bool {
    true
}

fn default_safety_timeout() -> f64 {
    120.0
}

fn default_child_duration() -> f64 {
    800.0
}

fn default_child_offset() -> f64 {
    16.0
}

fn default_child_easing() -> Easing {
    Easing::EaseOut
}

/// Element box relative to the viewport, as reported by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ElementRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        ElementRect {
            left,
            top,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}
