//! Document Engine collaborator interface
//!
//! The engine owns the element graph and performs the actual mutations;
//! this core only talks to it through the `DocumentEngine` trait. Elements
//! are handed out as point-in-time copies — the core stores identifiers,
//! never elements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Axis-aligned rectangle in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

/// A point in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

/// A snapshot of one element from the engine registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Stable identifier, unique within the document
    pub id: String,

    /// Current geometry
    pub bounds: Bounds,

    /// Containing element, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Element {
    /// Create an element snapshot
    #[must_use]
    pub fn new(id: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            id: id.into(),
            bounds,
            parent_id: None,
        }
    }

    /// Set the parent id
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Who originated an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationSource {
    /// Edit made by the local user
    Local,
    /// Edit replayed from a remote peer; never re-broadcast
    Remote,
}

/// One value inside a live operation context
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    /// A single element reference
    Element(Element),
    /// A homogeneous collection of element references
    Elements(Vec<Element>),
    /// Primitive data passed through verbatim (deltas, bounds, maps)
    Value(serde_json::Value),
}

impl ContextValue {
    /// The element, if this value holds a single reference
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(el) => Some(el),
            _ => None,
        }
    }

    /// The element list, if this value holds a collection
    #[must_use]
    pub fn as_elements(&self) -> Option<&[Element]> {
        match self {
            Self::Elements(els) => Some(els),
            _ => None,
        }
    }

    /// The raw JSON value, if this value holds primitive data
    #[must_use]
    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// A live operation context: named fields holding element references or
/// primitive data, tagged with the originating side.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationContext {
    /// Context fields by name
    pub values: HashMap<String, ContextValue>,

    /// Local edit or remote replay
    pub source: OperationSource,
}

impl OperationContext {
    /// Create an empty local context
    #[must_use]
    pub fn local() -> Self {
        Self {
            values: HashMap::new(),
            source: OperationSource::Local,
        }
    }

    /// Create an empty remote-tagged context
    #[must_use]
    pub fn remote() -> Self {
        Self {
            values: HashMap::new(),
            source: OperationSource::Remote,
        }
    }

    /// Insert a single element reference
    #[must_use]
    pub fn with_element(mut self, field: impl Into<String>, element: Element) -> Self {
        self.values
            .insert(field.into(), ContextValue::Element(element));
        self
    }

    /// Insert an element collection
    #[must_use]
    pub fn with_elements(mut self, field: impl Into<String>, elements: Vec<Element>) -> Self {
        self.values
            .insert(field.into(), ContextValue::Elements(elements));
        self
    }

    /// Insert a primitive value
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(field.into(), ContextValue::Value(value));
        self
    }

    /// Get a field by name
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&ContextValue> {
        self.values.get(field)
    }

    /// Whether this context was replayed from a peer
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.source == OperationSource::Remote
    }
}

/// Pan offset + zoom scale mapping document space to screen space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewTransform {
    /// Document-space x of the viewport origin
    pub offset_x: f64,
    /// Document-space y of the viewport origin
    pub offset_y: f64,
    /// Zoom scale (1.0 = no zoom)
    pub scale: f64,
    /// Screen-space x of the rendering container origin
    pub container_x: f64,
    /// Screen-space y of the rendering container origin
    pub container_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
            container_x: 0.0,
            container_y: 0.0,
        }
    }
}

impl ViewTransform {
    /// Convert a screen point to document space
    #[must_use]
    pub fn to_document(&self, screen: Point) -> Point {
        let scale = if self.scale == 0.0 { 1.0 } else { self.scale };
        Point {
            x: (screen.x - self.container_x) / scale + self.offset_x,
            y: (screen.y - self.container_y) / scale + self.offset_y,
        }
    }

    /// Convert a document point to screen space
    #[must_use]
    pub fn to_screen(&self, doc: Point) -> Point {
        Point {
            x: self.container_x + (doc.x - self.offset_x) * self.scale,
            y: self.container_y + (doc.y - self.offset_y) * self.scale,
        }
    }

    /// Map document-space bounds to a screen-space rectangle
    #[must_use]
    pub fn bounds_to_screen(&self, bounds: Bounds) -> Bounds {
        let origin = self.to_screen(Point {
            x: bounds.x,
            y: bounds.y,
        });
        Bounds {
            x: origin.x,
            y: origin.y,
            width: bounds.width * self.scale,
            height: bounds.height * self.scale,
        }
    }
}

/// Events emitted by the Document Engine and fed into the core
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// An operation was executed
    OperationExecuted {
        /// Command name, e.g. `shape.move`
        command: String,
        /// The executed context
        context: OperationContext,
    },

    /// An operation was reverted (undo)
    OperationReverted {
        /// Command name
        command: String,
        /// The reverted context
        context: OperationContext,
    },

    /// The local selection changed
    SelectionChanged {
        /// Ids of the newly selected elements, in selection order
        selection: Vec<String>,
    },

    /// The viewport was panned or zoomed
    ViewTransformChanged(ViewTransform),
}

/// The diagram engine consumed by the collaboration core.
///
/// `get_element` and `execute` are synchronous registry/command-stack
/// operations; snapshot export and import serialize asynchronously.
/// Exactly one extractor and one replayer attach to an engine at a time.
#[async_trait]
pub trait DocumentEngine: Send {
    /// Look up an element by id in the registry
    fn get_element(&self, id: &str) -> Option<Element>;

    /// Execute an operation through the normal command path, so undo/redo
    /// history and engine-internal invariants apply uniformly
    fn execute(&mut self, command: &str, context: OperationContext) -> anyhow::Result<()>;

    /// Export the canonical full-document snapshot
    async fn export_snapshot(&self) -> anyhow::Result<String>;

    /// Replace the document from a canonical snapshot
    async fn import_snapshot(&mut self, snapshot: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bounds(x: f64, y: f64) -> Bounds {
        Bounds {
            x,
            y,
            width: 100.0,
            height: 80.0,
        }
    }

    #[test]
    fn test_context_builder() {
        let ctx = OperationContext::local()
            .with_element("shape", Element::new("Shape_1", bounds(0.0, 0.0)))
            .with_value("delta", json!({"x": 10, "y": -5}));

        assert!(!ctx.is_remote());
        assert_eq!(ctx.get("shape").unwrap().as_element().unwrap().id, "Shape_1");
        assert!(ctx.get("delta").unwrap().as_value().is_some());
    }

    #[test]
    fn test_remote_marker() {
        let ctx = OperationContext::remote();
        assert!(ctx.is_remote());
        assert_eq!(ctx.source, OperationSource::Remote);
    }

    #[test]
    fn test_view_transform_round_trip() {
        let view = ViewTransform {
            offset_x: 200.0,
            offset_y: -50.0,
            scale: 1.5,
            container_x: 40.0,
            container_y: 120.0,
        };

        let doc = Point { x: 310.0, y: 75.0 };
        let screen = view.to_screen(doc);
        let back = view.to_document(screen);

        assert!((back.x - doc.x).abs() < 1e-9);
        assert!((back.y - doc.y).abs() < 1e-9);
    }

    #[test]
    fn test_view_transform_zero_scale_falls_back() {
        let view = ViewTransform {
            scale: 0.0,
            ..ViewTransform::default()
        };
        let doc = view.to_document(Point { x: 10.0, y: 20.0 });
        assert_eq!(doc.x, 10.0);
        assert_eq!(doc.y, 20.0);
    }

    #[test]
    fn test_bounds_to_screen_scales_extent() {
        let view = ViewTransform {
            offset_x: 100.0,
            offset_y: 100.0,
            scale: 2.0,
            container_x: 0.0,
            container_y: 0.0,
        };
        let rect = view.bounds_to_screen(Bounds {
            x: 150.0,
            y: 150.0,
            width: 50.0,
            height: 25.0,
        });
        assert_eq!(rect.x, 100.0);
        assert_eq!(rect.y, 100.0);
        assert_eq!(rect.width, 100.0);
        assert_eq!(rect.height, 50.0);
    }
}
