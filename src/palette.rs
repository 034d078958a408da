// Keyword → shape source selection for morphing icons, and the two-shape toggle.

use wasm_bindgen::prelude::*;

use crate::types::ShapeSource;

/// Id used when nothing in the palette matches.
pub const FALLBACK_ID: &str = "circle";

/// Delay between mounting an icon and activating its shape.
pub const MOUNT_KICK_MS: f64 = 50.0;

/// Trim, lowercase, and map marketing keywords onto palette ids.
pub fn normalize_keyword(input: Option<&str>) -> Option<String> {
    let k = input?.trim().to_lowercase();
    let mapped = match k.as_str() {
        "" => return None,
        "design" => "design-1".to_string(),
        "marketing" => "marketing-2".to_string(),
        "strategy" => "strategy-3".to_string(),
        _ => k,
    };
    Some(mapped)
}

/// Pick the palette entry for a keyword: exact id, then loose substring match,
/// then the fallback id, then whatever comes first. An empty palette uses the stock one.
pub fn choose_source(palette: &[ShapeSource], keyword: Option<&str>) -> ShapeSource {
    let stock;
    let palette = if palette.is_empty() {
        stock = default_palette();
        stock.as_slice()
    } else {
        palette
    };
    let normalized = normalize_keyword(keyword);
    let needle = normalized.as_deref().unwrap_or("");

    palette
        .iter()
        .find(|p| normalized.as_deref() == Some(p.id.as_str()))
        .or_else(|| palette.iter().find(|p| p.id.contains(needle)))
        .or_else(|| palette.iter().find(|p| p.id == FALLBACK_ID))
        .unwrap_or(&palette[0])
        .clone()
}

/// Remount key for an icon: a new route or a different chosen shape restarts its animation.
/// Keywords that resolve to the same shape share a key.
pub fn icon_key(route: &str, palette: &[ShapeSource], keyword: Option<&str>) -> String {
    format!("{route}-{}", choose_source(palette, keyword).id)
}

/// The stock set of icon shapes.
pub fn default_palette() -> Vec<ShapeSource> {
    [
        "listen",
        "read",
        "watch",
        "speak",
        "design-1",
        "marketing-2",
        "strategy-3",
        "circle",
    ]
    .iter()
    .map(|id| ShapeSource::new(*id, format!("/svgs/{id}.svg")))
    .collect()
}

/// How a toggle icon switches shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleTrigger {
    Click,
    Hover,
}

/// Flips between two shape ids on click, or shows the other one while hovered.
#[derive(Debug, Clone)]
pub struct ToggleSelector {
    first_id: String,
    second_id: String,
    initial_first: bool,
    use_first: bool,
    trigger: ToggleTrigger,
}

impl ToggleSelector {
    pub fn new(first_id: &str, second_id: &str, start_on_first: bool, trigger: ToggleTrigger) -> Self {
        ToggleSelector {
            first_id: first_id.to_string(),
            second_id: second_id.to_string(),
            initial_first: start_on_first,
            use_first: start_on_first,
            trigger,
        }
    }

    pub fn active_id(&self) -> &str {
        if self.use_first {
            &self.first_id
        } else {
            &self.second_id
        }
    }

    /// Palette entries for both ids, deduplicated, in first/second order.
    pub fn sources(&self, palette: &[ShapeSource]) -> Vec<ShapeSource> {
        let mut ids = vec![self.first_id.as_str()];
        if self.second_id != self.first_id {
            ids.push(self.second_id.as_str());
        }
        ids.into_iter()
            .filter_map(|id| palette.iter().find(|p| p.id == id).cloned())
            .collect()
    }

    /// Click or Enter/Space activation. Returns true if the active id changed.
    pub fn activate(&mut self) -> bool {
        if self.trigger != ToggleTrigger::Click {
            return false;
        }
        self.use_first = !self.use_first;
        true
    }

    pub fn pointer_enter(&mut self) -> bool {
        self.set_hover(!self.initial_first)
    }

    pub fn pointer_leave(&mut self) -> bool {
        self.set_hover(self.initial_first)
    }

    fn set_hover(&mut self, use_first: bool) -> bool {
        if self.trigger != ToggleTrigger::Hover || self.use_first == use_first {
            return false;
        }
        self.use_first = use_first;
        true
    }
}

// =============================================================================
// WASM Bindings
// =============================================================================

fn parse_palette(palette_json: &str) -> Result<Vec<ShapeSource>, JsValue> {
    if palette_json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(palette_json).map_err(|e| JsValue::from_str(&format!("Invalid palette: {}", e)))
}

/// Returns the chosen `{ id, url }` as JSON. An empty `palette_json` or `[]`
/// uses the stock palette.
#[wasm_bindgen(js_name = chooseShapeSource)]
pub fn choose_source_json(palette_json: &str, keyword: Option<String>) -> Result<String, JsValue> {
    let palette = parse_palette(palette_json)?;
    serde_json::to_string(&choose_source(&palette, keyword.as_deref()))
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen(js_name = iconKey)]
pub fn icon_key_js(route: &str, palette_json: &str, keyword: Option<String>) -> Result<String, JsValue> {
    let palette = parse_palette(palette_json)?;
    Ok(icon_key(route, &palette, keyword.as_deref()))
}

/// WASM-exposed two-shape toggle.
#[wasm_bindgen]
pub struct WasmToggleSelector {
    inner: ToggleSelector,
}

#[wasm_bindgen]
impl WasmToggleSelector {
    #[wasm_bindgen(constructor)]
    pub fn new(first_id: &str, second_id: &str, start_on_first: bool, hover: bool) -> WasmToggleSelector {
        let trigger = if hover {
            ToggleTrigger::Hover
        } else {
            ToggleTrigger::Click
        };
        WasmToggleSelector {
            inner: ToggleSelector::new(first_id, second_id, start_on_first, trigger),
        }
    }

    pub fn active_id(&self) -> String {
        self.inner.active_id().to_string()
    }

    pub fn activate(&mut self) -> bool {
        self.inner.activate()
    }

    pub fn pointer_enter(&mut self) -> bool {
        self.inner.pointer_enter()
    }

    pub fn pointer_leave(&mut self) -> bool {
        self.inner.pointer_leave()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_normalize_to_palette_ids() {
        assert_eq!(normalize_keyword(Some("  Design ")), Some("design-1".to_string()));
        assert_eq!(normalize_keyword(Some("STRATEGY")), Some("strategy-3".to_string()));
        assert_eq!(normalize_keyword(Some("Read")), Some("read".to_string()));
        assert_eq!(normalize_keyword(Some("   ")), None);
        assert_eq!(normalize_keyword(None), None);
    }

    #[test]
    fn source_choice_falls_back_in_order() {
        let palette = default_palette();
        assert_eq!(choose_source(&palette, Some("marketing")).id, "marketing-2");
        assert_eq!(choose_source(&palette, Some("sten")).id, "listen");
        assert_eq!(choose_source(&palette, Some("unknown")).id, "circle");

        let no_circle = vec![ShapeSource::new("x", "/x.svg"), ShapeSource::new("y", "/y.svg")];
        assert_eq!(choose_source(&no_circle, Some("zzz")).id, "x");
    }

    #[test]
    fn empty_keyword_matches_the_first_entry_loosely() {
        let palette = default_palette();
        assert_eq!(choose_source(&palette, None).id, "listen");
    }

    #[test]
    fn empty_palette_falls_back_to_stock_shapes() {
        let chosen = choose_source(&[], Some("read"));
        assert_eq!(chosen.id, "read");
        assert_eq!(chosen.url, "/svgs/read.svg");
    }

    #[test]
    fn icon_key_follows_the_chosen_shape() {
        let palette = default_palette();
        assert_eq!(icon_key("/about", &palette, Some("Design")), "/about-design-1");
        assert_eq!(icon_key("/", &palette, None), "/-listen");
        // Unknown keywords both resolve to the fallback shape, so the key is stable.
        assert_eq!(
            icon_key("/work", &palette, Some("unknown")),
            icon_key("/work", &palette, Some("other"))
        );
        assert_eq!(icon_key("/work", &[], Some("zzz")), "/work-circle");
    }

    #[test]
    fn click_toggle_flips() {
        let mut toggle = ToggleSelector::new("circle", "read", true, ToggleTrigger::Click);
        assert_eq!(toggle.active_id(), "circle");
        assert!(!toggle.pointer_enter());
        assert!(toggle.activate());
        assert_eq!(toggle.active_id(), "read");
        assert!(toggle.activate());
        assert_eq!(toggle.active_id(), "circle");
    }

    #[test]
    fn hover_toggle_restores_on_leave() {
        let mut toggle = ToggleSelector::new("circle", "read", false, ToggleTrigger::Hover);
        assert_eq!(toggle.active_id(), "read");
        assert!(!toggle.activate());
        assert!(toggle.pointer_enter());
        assert_eq!(toggle.active_id(), "circle");
        assert!(!toggle.pointer_enter());
        assert!(toggle.pointer_leave());
        assert_eq!(toggle.active_id(), "read");
    }

    #[test]
    fn json_choice_uses_stock_palette() {
        let json = choose_source_json("", Some("watch".to_string())).unwrap();
        let chosen: ShapeSource = serde_json::from_str(&json).unwrap();
        assert_eq!(chosen.url, "/svgs/watch.svg");
        let json = choose_source_json("[]", None).unwrap();
        let chosen: ShapeSource = serde_json::from_str(&json).unwrap();
        assert_eq!(chosen.id, "listen");
    }

    #[test]
    fn toggle_sources_are_deduplicated() {
        let palette = default_palette();
        let same = ToggleSelector::new("read", "read", true, ToggleTrigger::Click);
        assert_eq!(same.sources(&palette).len(), 1);
        let pair = ToggleSelector::new("circle", "watch", true, ToggleTrigger::Click);
        let ids: Vec<String> = pair.sources(&palette).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["circle", "watch"]);
    }
}
