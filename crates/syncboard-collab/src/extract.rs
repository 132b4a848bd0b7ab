//! Operation Extractor
//!
//! Observes the Document Engine's operation log and turns locally
//! originated operations into portable command payloads: live element
//! references are stripped down to identifiers under the `…Id`/`…Ids`
//! naming convention, primitives pass through verbatim, derived output is
//! dropped. Also tracks the local selection to emit advisory lock/unlock
//! messages, and schedules trailing-debounced full snapshot exports.

use std::time::Instant;
use tracing::debug;

use crate::config::CollabConfig;
use crate::engine::{ContextValue, OperationContext};
use crate::protocol::MessagePayload;
use crate::timing::Debounce;

/// Context fields holding a single element reference
pub(crate) const SINGLE_REF_FIELDS: &[&str] = &[
    "shape",
    "element",
    "connection",
    "newShape",
    "parent",
    "newParent",
    "oldParent",
    "source",
    "target",
    "newSource",
    "newTarget",
    "newHost",
];

/// Context fields holding a homogeneous element collection
pub(crate) const COLLECTION_REF_FIELDS: &[&str] = &["shapes", "elements"];

/// Primitive fields forwarded verbatim; everything else is derived output
/// the peer recomputes on replay
const PRIMITIVE_FIELDS: &[&str] = &[
    "delta",
    "position",
    "newBounds",
    "oldBounds",
    "properties",
    "newWaypoints",
    "hints",
    "newParentIndex",
    "oldParentIndex",
    "parentIndex",
    "dockingOrPoints",
];

/// Extracts portable messages from local engine activity
pub struct OperationExtractor {
    config: CollabConfig,
    owned_lock: Option<String>,
    export_debounce: Debounce,
}

impl OperationExtractor {
    /// Create an extractor with the given tunables
    #[must_use]
    pub fn new(config: CollabConfig) -> Self {
        let export_debounce = Debounce::new(config.export_debounce());
        Self {
            config,
            owned_lock: None,
            export_debounce,
        }
    }

    /// Handle one executed or reverted operation from the engine log.
    ///
    /// Every call restarts the snapshot-export debounce window. A command
    /// payload is returned only for locally originated, non-housekeeping
    /// operations whose extracted context is non-empty.
    pub fn on_operation(
        &mut self,
        command: &str,
        context: &OperationContext,
        now: Instant,
    ) -> Option<MessagePayload> {
        self.export_debounce.trigger(now);

        if context.is_remote() {
            return None;
        }
        if self.config.is_housekeeping(command) {
            debug!(command, "skipping housekeeping command");
            return None;
        }

        let extracted = extract_context(context);
        if extracted.is_empty() {
            return None;
        }

        Some(MessagePayload::Command {
            command: command.to_string(),
            context: extracted,
        })
    }

    /// Handle a local selection change.
    ///
    /// When the first selected element differs from the currently owned
    /// lock, the old lock is released before the new one is taken; at most
    /// one element is locked by this client at a time.
    pub fn on_selection_changed(&mut self, selection: &[String]) -> Vec<MessagePayload> {
        let selected = selection.first().cloned();
        if selected == self.owned_lock {
            return Vec::new();
        }

        let mut out = Vec::new();
        if let Some(old) = self.owned_lock.take() {
            out.push(MessagePayload::Unlock { element_id: old });
        }
        if let Some(new) = selected {
            out.push(MessagePayload::Lock {
                element_id: new.clone(),
            });
            self.owned_lock = Some(new);
        }
        out
    }

    /// The element currently locked by this client, if any
    #[must_use]
    pub fn owned_lock(&self) -> Option<&str> {
        self.owned_lock.as_deref()
    }

    /// Check whether the export debounce window has elapsed; firing disarms
    /// it until the next operation-log event
    pub fn export_due(&mut self, now: Instant) -> bool {
        self.export_debounce.poll(now)
    }

    /// Drop pending timer and lock state (session teardown)
    pub fn reset(&mut self) {
        self.owned_lock = None;
        self.export_debounce.cancel();
    }
}

/// Strip a live context down to its portable form
fn extract_context(context: &OperationContext) -> serde_json::Map<String, serde_json::Value> {
    let mut out = serde_json::Map::new();

    for (name, value) in &context.values {
        if SINGLE_REF_FIELDS.contains(&name.as_str()) {
            if let Some(id) = ref_id(value) {
                out.insert(format!("{name}Id"), serde_json::Value::String(id));
            }
        } else if COLLECTION_REF_FIELDS.contains(&name.as_str()) {
            if let Some(elements) = value.as_elements() {
                let ids: Vec<serde_json::Value> = elements
                    .iter()
                    .map(|el| serde_json::Value::String(el.id.clone()))
                    .collect();
                out.insert(format!("{name}Ids"), serde_json::Value::Array(ids));
            }
        } else if PRIMITIVE_FIELDS.contains(&name.as_str()) {
            if let Some(v) = value.as_value() {
                out.insert(name.clone(), v.clone());
            }
        }
        // anything else is derived output, not needed for replay
    }

    out
}

/// Id of a single-reference field: a live element, or an already-portable
/// string id
fn ref_id(value: &ContextValue) -> Option<String> {
    match value {
        ContextValue::Element(el) => Some(el.id.clone()),
        ContextValue::Value(serde_json::Value::String(id)) => Some(id.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Bounds, Element};
    use serde_json::json;
    use std::time::Duration;

    fn element(id: &str) -> Element {
        Element::new(
            id,
            Bounds {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 80.0,
            },
        )
    }

    fn extractor() -> OperationExtractor {
        OperationExtractor::new(CollabConfig::default())
    }

    #[test]
    fn test_extracts_single_references_as_ids() {
        let mut ex = extractor();
        let ctx = OperationContext::local()
            .with_element("shape", element("Shape_1"))
            .with_element("newParent", element("Process_1"))
            .with_value("delta", json!({"x": 10, "y": -5}));

        let payload = ex.on_operation("shape.move", &ctx, Instant::now()).unwrap();
        match payload {
            MessagePayload::Command { command, context } => {
                assert_eq!(command, "shape.move");
                assert_eq!(context["shapeId"], json!("Shape_1"));
                assert_eq!(context["newParentId"], json!("Process_1"));
                assert_eq!(context["delta"], json!({"x": 10, "y": -5}));
                assert!(!context.contains_key("shape"));
            }
            other => unreachable!("expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_extracts_collections_as_id_arrays() {
        let mut ex = extractor();
        let ctx = OperationContext::local()
            .with_elements("shapes", vec![element("Shape_1"), element("Shape_2")])
            .with_value("delta", json!({"x": 10, "y": -5}));

        let payload = ex
            .on_operation("elements.move", &ctx, Instant::now())
            .unwrap();
        match payload {
            MessagePayload::Command { context, .. } => {
                assert_eq!(context["shapesIds"], json!(["Shape_1", "Shape_2"]));
            }
            other => unreachable!("expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_drops_derived_output_fields() {
        let mut ex = extractor();
        let ctx = OperationContext::local()
            .with_element("shape", element("Shape_1"))
            .with_value("updates", json!([{"computed": true}]));

        let payload = ex.on_operation("shape.move", &ctx, Instant::now()).unwrap();
        match payload {
            MessagePayload::Command { context, .. } => {
                assert!(!context.contains_key("updates"));
            }
            other => unreachable!("expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_operations_never_re_emitted() {
        let mut ex = extractor();
        let ctx = OperationContext::remote().with_element("shape", element("Shape_1"));
        assert!(ex.on_operation("shape.move", &ctx, Instant::now()).is_none());
    }

    #[test]
    fn test_housekeeping_commands_skipped() {
        let mut ex = extractor();
        let ctx = OperationContext::local().with_element("element", element("Lane_1"));
        assert!(ex.on_operation("refs.update", &ctx, Instant::now()).is_none());
    }

    #[test]
    fn test_empty_extraction_emits_nothing() {
        let mut ex = extractor();
        let ctx = OperationContext::local().with_value("internal", json!({"opaque": 1}));
        assert!(ex
            .on_operation("custom.command", &ctx, Instant::now())
            .is_none());
    }

    #[test]
    fn test_selection_unlocks_before_locking() {
        let mut ex = extractor();

        let msgs = ex.on_selection_changed(&["Task_1".to_string()]);
        assert_eq!(
            msgs,
            vec![MessagePayload::Lock {
                element_id: "Task_1".into()
            }]
        );

        let msgs = ex.on_selection_changed(&["Task_2".to_string()]);
        assert_eq!(
            msgs,
            vec![
                MessagePayload::Unlock {
                    element_id: "Task_1".into()
                },
                MessagePayload::Lock {
                    element_id: "Task_2".into()
                },
            ]
        );
        assert_eq!(ex.owned_lock(), Some("Task_2"));
    }

    #[test]
    fn test_reselecting_same_element_is_silent() {
        let mut ex = extractor();
        ex.on_selection_changed(&["Task_1".to_string()]);
        assert!(ex.on_selection_changed(&["Task_1".to_string()]).is_empty());
    }

    #[test]
    fn test_deselect_releases_lock() {
        let mut ex = extractor();
        ex.on_selection_changed(&["Task_1".to_string()]);
        let msgs = ex.on_selection_changed(&[]);
        assert_eq!(
            msgs,
            vec![MessagePayload::Unlock {
                element_id: "Task_1".into()
            }]
        );
        assert_eq!(ex.owned_lock(), None);
    }

    #[test]
    fn test_export_debounce_restarts_per_event() {
        let start = Instant::now();
        let mut ex = extractor();
        let ctx = OperationContext::local().with_element("shape", element("Shape_1"));

        ex.on_operation("shape.move", &ctx, start);
        ex.on_operation("shape.move", &ctx, start + Duration::from_millis(400));

        assert!(!ex.export_due(start + Duration::from_millis(500)));
        assert!(ex.export_due(start + Duration::from_millis(900)));
        // disarmed until the next event
        assert!(!ex.export_due(start + Duration::from_millis(2000)));
    }

    #[test]
    fn test_remote_operations_still_schedule_export() {
        let start = Instant::now();
        let mut ex = extractor();
        let ctx = OperationContext::remote().with_element("shape", element("Shape_1"));

        assert!(ex.on_operation("shape.move", &ctx, start).is_none());
        assert!(ex.export_due(start + Duration::from_millis(500)));
    }
}
