// SVG → Shape. Circles and ellipses become dots in percent-of-bounding-box space.
// Pure: same markup in, same Shape out.

use std::cmp::Ordering;

use roxmltree::{Document, Node, ParsingOptions};

use crate::error::ParseError;
use crate::types::{Dot, Shape};

/// Parse vector markup into a `Shape` keyed by `id`.
///
/// Dimensions come from the root's `width`/`height`, falling back to the `viewBox`
/// size when either is missing. Dots are sorted by `(y, x)` so that two shapes
/// parsed independently line up index-by-index on first activation.
pub fn parse_shape(id: &str, markup: &str) -> Result<Shape, ParseError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(markup, options)
        .map_err(|e| ParseError::InvalidDocument(e.to_string()))?;

    let svg = doc
        .descendants()
        .find(|n| n.has_tag_name("svg"))
        .ok_or(ParseError::MissingSvgRoot)?;
    let (width, height) = intrinsic_size(&svg).ok_or(ParseError::MissingDimensions)?;

    let ellipses = doc.descendants().filter(|n| n.has_tag_name("ellipse")).map(|n| {
        let r = (attr_number(&n, "rx") + attr_number(&n, "ry")) / 2.0;
        (attr_number(&n, "cx"), attr_number(&n, "cy"), r)
    });
    let circles = doc
        .descendants()
        .filter(|n| n.has_tag_name("circle"))
        .map(|n| (attr_number(&n, "cx"), attr_number(&n, "cy"), attr_number(&n, "r")));

    let mut dots: Vec<Dot> = ellipses
        .chain(circles)
        .map(|(cx, cy, r)| {
            Dot::new(
                cx / width * 100.0,
                cy / height * 100.0,
                r / width * 100.0,
                r,
            )
        })
        .collect();

    if dots.is_empty() {
        return Err(ParseError::NoDots);
    }

    dots.sort_by(reading_order);
    let median_radius_px = median(dots.iter().map(|d| d.r_px).collect());

    Ok(Shape {
        id: id.to_string(),
        dots,
        width,
        height,
        median_radius_px,
    })
}

/// Top-to-bottom, then left-to-right.
pub fn reading_order(a: &Dot, b: &Dot) -> Ordering {
    a.y_percent
        .total_cmp(&b.y_percent)
        .then(a.x_percent.total_cmp(&b.x_percent))
}

fn intrinsic_size(svg: &Node) -> Option<(f64, f64)> {
    let mut width = svg.attribute("width").and_then(leading_number);
    let mut height = svg.attribute("height").and_then(leading_number);

    let usable = |v: Option<f64>| v.filter(|x| *x > 0.0);
    if usable(width).is_none() || usable(height).is_none() {
        if let Some((w, h)) = svg.attribute("viewBox").and_then(view_box_size) {
            width = Some(w);
            height = Some(h);
        }
    }

    Some((usable(width)?, usable(height)?))
}

fn view_box_size(raw: &str) -> Option<(f64, f64)> {
    let parts: Vec<&str> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 4 {
        return None;
    }
    Some((leading_number(parts[2])?, leading_number(parts[3])?))
}

fn attr_number(node: &Node, name: &str) -> f64 {
    node.attribute(name).and_then(leading_number).unwrap_or(0.0)
}

/// Longest numeric prefix of `raw`, so `"120px"` reads as 120.
fn leading_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;

    while end < bytes.len() {
        let c = bytes[end];
        match c {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 || matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => {
                let next_is_digit = bytes
                    .get(end + 1)
                    .map(|n| n.is_ascii_digit() || *n == b'+' || *n == b'-')
                    .unwrap_or(false);
                if !next_is_digit {
                    break;
                }
                seen_exp = true;
            }
            _ => break,
        }
        end += 1;
    }

    // Peel off a dangling exponent or sign ("1e", "3-") that would not parse.
    let mut candidate = &s[..end];
    while !candidate.is_empty() {
        if let Ok(v) = candidate.parse::<f64>() {
            return v.is_finite().then_some(v);
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    None
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
