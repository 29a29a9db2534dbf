//! Visibility evaluation over rendered element geometry.
//!
//! An element counts as visible when its computed style does not hide it
//! and, if requested, its bounding box touches the *extended viewport*: the
//! real viewport grown on every side by `viewport_extension` of its own
//! size. Edges are inclusive, so a box whose top sits exactly on the
//! extended bottom edge is visible.
//!
//! The only-outside mode selects elements that miss the extended viewport.
//! With the outside limit it further requires a hit on an outer ring, grown
//! by `outside_limit_extension` of the viewport size but never less than
//! `outside_limit_floor_px`, which bounds preloading to elements just
//! offscreen.

mod style;

pub use style::{ComputedStyle, Display, Visibility};

use crate::config::GeometryConfig;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in viewport coordinates, like `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { top, left, bottom: top + height, right: left + width }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Grow the box by `dx` horizontally and `dy` vertically on each side.
    pub fn expand(&self, dx: f64, dy: f64) -> Self {
        Self { top: self.top - dy, left: self.left - dx, bottom: self.bottom + dy, right: self.right + dx }
    }

    /// Inclusive overlap test: touching edges count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.top <= other.bottom && self.bottom >= other.top && self.left <= other.right && self.right >= other.left
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// A rendered element: its computed style and bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    pub style: ComputedStyle,
    pub rect: Rect,
}

/// A node of the live page tree as seen by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Element(Element),
    Text { text: String },
    Comment { text: String },
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Node::Element(_) => "element",
            Node::Text { .. } => "text",
            Node::Comment { .. } => "comment",
        }
    }
}

/// Which visibility question to ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityQuery {
    pub check_viewport: bool,
    pub only_outside: bool,
    pub use_outside_limit: bool,
}

impl Default for VisibilityQuery {
    fn default() -> Self {
        Self { check_viewport: true, only_outside: false, use_outside_limit: false }
    }
}

impl VisibilityQuery {
    /// Style-only check, geometry ignored.
    pub fn style_only() -> Self {
        Self { check_viewport: false, ..Self::default() }
    }

    /// Elements entirely outside the extended viewport.
    pub fn outside() -> Self {
        Self { only_outside: true, ..Self::default() }
    }

    /// Elements outside the extended viewport but inside the outer limit.
    pub fn just_offscreen() -> Self {
        Self { only_outside: true, use_outside_limit: true, ..Self::default() }
    }
}

/// Visibility evaluator for one viewport.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    viewport: Viewport,
    config: GeometryConfig,
}

impl Evaluator {
    pub fn new(viewport: Viewport, config: GeometryConfig) -> Self {
        Self { viewport, config }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The viewport grown by the configured extension on all four sides.
    pub fn extended_viewport(&self) -> Rect {
        let fraction = self.config.viewport_extension;
        self.viewport
            .rect()
            .expand(self.viewport.width * fraction, self.viewport.height * fraction)
    }

    /// The outer limit ring used by [`VisibilityQuery::just_offscreen`].
    pub fn outside_limit(&self) -> Rect {
        let fraction = self.config.outside_limit_extension;
        let floor = self.config.outside_limit_floor_px;
        self.extended_viewport().expand(
            (self.viewport.width * fraction).max(floor),
            (self.viewport.height * fraction).max(floor),
        )
    }

    /// Whether `node` is visible under `query`.
    ///
    /// Non-element nodes are logged and reported as not visible.
    pub fn is_visible(&self, node: &Node, query: VisibilityQuery) -> bool {
        let Some(element) = node.as_element() else {
            tracing::error!(kind = node.kind(), "visibility check on a non-element node");
            return false;
        };

        if element.style.hides_element() {
            return false;
        }

        if !query.check_viewport {
            return true;
        }

        let inside = element.rect.intersects(&self.extended_viewport());
        if !query.only_outside {
            return inside;
        }
        if inside {
            return false;
        }

        !query.use_outside_limit || element.rect.intersects(&self.outside_limit())
    }

    /// First node of `nodes` that is visible under `query`.
    pub fn get_first_visible<'a>(&self, nodes: &'a [Node], query: VisibilityQuery) -> Option<&'a Node> {
        nodes.iter().find(|node| self.is_visible(node, query))
    }

    /// Visible nodes of `nodes`, stopping once `limit` have been found.
    pub fn get_all_visible<'a>(&self, nodes: &'a [Node], query: VisibilityQuery, limit: Option<usize>) -> Vec<&'a Node> {
        nodes
            .iter()
            .filter(|node| self.is_visible(node, query))
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }
}
