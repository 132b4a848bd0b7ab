//! Operation Replayer
//!
//! Consumes inbound command payloads, resolves `…Id`/`…Ids` fields back
//! into live references through the engine registry, validates
//! resolvability per command kind, and executes the reconstructed context
//! tagged `OperationSource::Remote` through the normal execution path.
//! A malformed or unresolvable remote operation is dropped, never fatal.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::engine::{DocumentEngine, Element, OperationContext};
use crate::error::Error;
use crate::extract::{COLLECTION_REF_FIELDS, SINGLE_REF_FIELDS};

/// Result of replaying one remote command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The reconstructed operation was executed
    Applied,
    /// The operation was dropped (unresolvable references, validation
    /// failure, or engine rejection)
    Dropped,
}

/// Portable context for `shape.move`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeMoveContext {
    /// Moved shape
    pub shape_id: Option<String>,
    /// Move delta
    pub delta: Option<Value>,
    /// Target parent after the move
    pub new_parent_id: Option<String>,
    /// Ordering index in the new parent
    pub new_parent_index: Option<i64>,
    /// Layout hints
    pub hints: Option<Value>,
}

/// Portable context for `elements.move`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementsMoveContext {
    /// Moved shapes
    pub shapes_ids: Option<Vec<String>>,
    /// Move delta
    pub delta: Option<Value>,
    /// Target parent after the move
    pub new_parent_id: Option<String>,
    /// Target host after the move
    pub new_host_id: Option<String>,
    /// Layout hints
    pub hints: Option<Value>,
}

/// Portable context for `shape.resize`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeResizeContext {
    /// Resized shape
    pub shape_id: Option<String>,
    /// Geometry after the resize
    pub new_bounds: Option<Value>,
    /// Layout hints
    pub hints: Option<Value>,
}

/// Portable context for `elements.delete`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementsDeleteContext {
    /// Deleted elements
    pub elements_ids: Option<Vec<String>>,
}

/// Portable context for `shape.create` / `element.create`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeCreateContext {
    /// Id assigned to the created shape at the origin
    pub new_shape_id: Option<String>,
    /// Alternate id field used by some create handlers
    pub shape_id: Option<String>,
    /// Containing element
    pub parent_id: Option<String>,
    /// Placement position or bounds
    pub position: Option<Value>,
    /// Placement bounds when position is absent
    pub new_bounds: Option<Value>,
    /// Ordering index in the parent
    pub parent_index: Option<i64>,
}

/// Portable context for `connection.create`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCreateContext {
    /// The connection
    pub connection_id: Option<String>,
    /// Connection source
    pub source_id: Option<String>,
    /// Connection target
    pub target_id: Option<String>,
    /// Containing element
    pub parent_id: Option<String>,
    /// Ordering index in the parent
    pub parent_index: Option<i64>,
    /// Layout hints
    pub hints: Option<Value>,
}

/// Portable context for `connection.reconnect`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReconnectContext {
    /// The connection
    pub connection_id: Option<String>,
    /// New source after the reconnect
    pub new_source_id: Option<String>,
    /// New target after the reconnect
    pub new_target_id: Option<String>,
    /// Docking point data
    pub docking_or_points: Option<Value>,
    /// Waypoints after the reconnect
    pub new_waypoints: Option<Value>,
    /// Layout hints
    pub hints: Option<Value>,
}

/// Closed tagged union of portable contexts, keyed by command name
#[derive(Debug, Clone)]
pub enum RemoteCommand {
    /// `shape.move`
    ShapeMove(ShapeMoveContext),
    /// `elements.move`
    ElementsMove(ElementsMoveContext),
    /// `shape.resize`
    ShapeResize(ShapeResizeContext),
    /// `elements.delete`
    ElementsDelete(ElementsDeleteContext),
    /// `shape.create` or `element.create` (same context shape)
    Create {
        /// The concrete command name
        command: String,
        /// Parsed context
        context: ShapeCreateContext,
    },
    /// `connection.create`
    ConnectionCreate(ConnectionCreateContext),
    /// `connection.reconnect`
    ConnectionReconnect(ConnectionReconnectContext),
    /// Any unrecognized command, replayed best-effort
    Generic {
        /// Command name
        command: String,
        /// Raw portable context
        context: Map<String, Value>,
    },
}

impl RemoteCommand {
    /// Parse a wire command into its typed context.
    ///
    /// Unknown commands fall back to the generic variant; a context that
    /// fails to parse for a known command also falls back rather than
    /// erroring, since generic reconstruction is still well defined.
    #[must_use]
    pub fn parse(command: &str, context: Map<String, Value>) -> Self {
        let value = Value::Object(context.clone());
        let parsed = match command {
            "shape.move" => serde_json::from_value(value).ok().map(Self::ShapeMove),
            "elements.move" => serde_json::from_value(value).ok().map(Self::ElementsMove),
            "shape.resize" => serde_json::from_value(value).ok().map(Self::ShapeResize),
            "elements.delete" => serde_json::from_value(value).ok().map(Self::ElementsDelete),
            "shape.create" | "element.create" => {
                serde_json::from_value(value).ok().map(|ctx| Self::Create {
                    command: command.to_string(),
                    context: ctx,
                })
            }
            "connection.create" => serde_json::from_value(value).ok().map(Self::ConnectionCreate),
            "connection.reconnect" => serde_json::from_value(value)
                .ok()
                .map(Self::ConnectionReconnect),
            _ => None,
        };

        parsed.unwrap_or_else(|| Self::Generic {
            command: command.to_string(),
            context,
        })
    }
}

/// Replays remote operations against the local engine
pub struct OperationReplayer;

impl OperationReplayer {
    /// Create a replayer
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reconstruct and execute one remote command.
    ///
    /// All failures are absorbed here: the outcome reports whether the
    /// operation was applied, and drops are logged at `debug`/`warn`.
    pub fn replay<E: DocumentEngine + ?Sized>(
        &self,
        engine: &mut E,
        command: &str,
        context: Map<String, Value>,
    ) -> ReplayOutcome {
        let parsed = RemoteCommand::parse(command, context);
        let reconstructed = match self.reconstruct(engine, &parsed) {
            Ok(ctx) => ctx,
            Err(err) => {
                debug!(command, code = err.code(), error = %err, "dropping remote command");
                return ReplayOutcome::Dropped;
            }
        };

        match engine.execute(command, reconstructed) {
            Ok(()) => ReplayOutcome::Applied,
            Err(source) => {
                let err = Error::ReplayFailed {
                    command: command.to_string(),
                    source,
                };
                warn!(code = err.code(), error = %err, "engine rejected replayed command");
                ReplayOutcome::Dropped
            }
        }
    }

    /// Build the live, remote-tagged context; an error means drop
    fn reconstruct<E: DocumentEngine + ?Sized>(
        &self,
        engine: &E,
        parsed: &RemoteCommand,
    ) -> Result<OperationContext, Error> {
        match parsed {
            RemoteCommand::ShapeMove(ctx) => {
                let shape = resolve(engine, ctx.shape_id.as_deref())
                    .ok_or_else(|| Error::unresolvable("shape.move", "shapeId"))?;
                let mut out = OperationContext::remote().with_element("shape", shape);
                if let Some(delta) = &ctx.delta {
                    out = out.with_value("delta", delta.clone());
                }
                if let Some(parent) = resolve_opt(engine, ctx.new_parent_id.as_deref()) {
                    out = out.with_element("newParent", parent);
                }
                if let Some(index) = ctx.new_parent_index {
                    out = out.with_value("newParentIndex", index.into());
                }
                Ok(with_hints(out, ctx.hints.clone()))
            }

            RemoteCommand::ElementsMove(ctx) => {
                // Partial policy: move the members that still resolve
                let shapes = resolve_all(engine, ctx.shapes_ids.as_deref());
                if shapes.is_empty() {
                    return Err(Error::unresolvable("elements.move", "shapesIds"));
                }
                let mut out = OperationContext::remote().with_elements("shapes", shapes);
                if let Some(delta) = &ctx.delta {
                    out = out.with_value("delta", delta.clone());
                }
                if let Some(parent) = resolve_opt(engine, ctx.new_parent_id.as_deref()) {
                    out = out.with_element("newParent", parent);
                }
                if let Some(host) = resolve_opt(engine, ctx.new_host_id.as_deref()) {
                    out = out.with_element("newHost", host);
                }
                Ok(with_hints(out, ctx.hints.clone()))
            }

            RemoteCommand::ShapeResize(ctx) => {
                let shape = resolve(engine, ctx.shape_id.as_deref())
                    .ok_or_else(|| Error::unresolvable("shape.resize", "shapeId"))?;
                let mut out = OperationContext::remote().with_element("shape", shape);
                if let Some(bounds) = &ctx.new_bounds {
                    out = out.with_value("newBounds", bounds.clone());
                }
                Ok(with_hints(out, ctx.hints.clone()))
            }

            RemoteCommand::ElementsDelete(ctx) => {
                // Partial policy: delete the members that still resolve
                let elements = resolve_all(engine, ctx.elements_ids.as_deref());
                if elements.is_empty() {
                    return Err(Error::unresolvable("elements.delete", "elementsIds"));
                }
                Ok(OperationContext::remote().with_elements("elements", elements))
            }

            RemoteCommand::Create { command, context: ctx } => {
                let shape_id = ctx.new_shape_id.as_deref().or(ctx.shape_id.as_deref());
                let mut out = OperationContext::remote();

                // The shape usually does not exist here yet: hand the engine
                // a live reference when it does (undo/redo replays), or the
                // origin-assigned id so the created element keeps it
                match resolve_opt(engine, shape_id) {
                    Some(shape) => out = out.with_element("shape", shape),
                    None => {
                        if let Some(id) = shape_id {
                            out = out.with_value("shapeId", Value::String(id.to_string()));
                        }
                    }
                }

                if let Some(parent_id) = ctx.parent_id.as_deref() {
                    // parent resolvable if parentId given
                    let parent = resolve(engine, Some(parent_id))
                        .ok_or_else(|| Error::unresolvable(command.clone(), "parentId"))?;
                    out = out.with_element("parent", parent);
                }
                if let Some(position) = ctx.position.as_ref().or(ctx.new_bounds.as_ref()) {
                    out = out.with_value("position", position.clone());
                }
                if let Some(index) = ctx.parent_index {
                    out = out.with_value("parentIndex", index.into());
                }
                Ok(out)
            }

            RemoteCommand::ConnectionCreate(ctx) => {
                let connection = resolve(engine, ctx.connection_id.as_deref())
                    .ok_or_else(|| Error::unresolvable("connection.create", "connectionId"))?;
                let source = resolve(engine, ctx.source_id.as_deref())
                    .ok_or_else(|| Error::unresolvable("connection.create", "sourceId"))?;
                let target = resolve(engine, ctx.target_id.as_deref())
                    .ok_or_else(|| Error::unresolvable("connection.create", "targetId"))?;

                let mut out = OperationContext::remote()
                    .with_element("connection", connection)
                    .with_element("source", source)
                    .with_element("target", target);
                if let Some(parent) = resolve_opt(engine, ctx.parent_id.as_deref()) {
                    out = out.with_element("parent", parent);
                }
                if let Some(index) = ctx.parent_index {
                    out = out.with_value("parentIndex", index.into());
                }
                if let Some(hints) = &ctx.hints {
                    out = out.with_value("hints", hints.clone());
                }
                Ok(out)
            }

            RemoteCommand::ConnectionReconnect(ctx) => {
                let connection = resolve(engine, ctx.connection_id.as_deref())
                    .ok_or_else(|| Error::unresolvable("connection.reconnect", "connectionId"))?;
                let mut out = OperationContext::remote().with_element("connection", connection);
                if let Some(source) = resolve_opt(engine, ctx.new_source_id.as_deref()) {
                    out = out.with_element("newSource", source);
                }
                if let Some(target) = resolve_opt(engine, ctx.new_target_id.as_deref()) {
                    out = out.with_element("newTarget", target);
                }
                if let Some(docking) = &ctx.docking_or_points {
                    out = out.with_value("dockingOrPoints", docking.clone());
                }
                if let Some(waypoints) = &ctx.new_waypoints {
                    out = out.with_value("newWaypoints", waypoints.clone());
                }
                Ok(with_hints(out, ctx.hints.clone()))
            }

            RemoteCommand::Generic { command, context } => {
                self.reconstruct_generic(engine, command, context)
            }
        }
    }

    /// Best-effort reconstruction for unrecognized commands: resolve every
    /// reference field by naming convention, pass the rest through.
    /// A present-but-unresolvable `shapeId`/`connectionId` drops the
    /// operation; other unresolved references are dropped as fields.
    fn reconstruct_generic<E: DocumentEngine + ?Sized>(
        &self,
        engine: &E,
        command: &str,
        context: &Map<String, Value>,
    ) -> Result<OperationContext, Error> {
        let mut out = OperationContext::remote();

        for (key, value) in context {
            if let Some(base) = collection_base(key) {
                let ids: Vec<String> = serde_json::from_value(value.clone())
                    .map_err(|_| Error::malformed(format!("{key} is not an id array")))?;
                let elements = resolve_all(engine, Some(&ids));
                out = out.with_elements(base, elements);
            } else if let Some(base) = single_base(key) {
                let id = value
                    .as_str()
                    .ok_or_else(|| Error::malformed(format!("{key} is not an id")))?;
                match engine.get_element(id) {
                    Some(el) => out = out.with_element(base, el),
                    None => {
                        if base == "shape" || base == "connection" {
                            return Err(Error::unresolvable(command, key.clone()));
                        }
                        // optional reference: drop the field
                    }
                }
            } else {
                out = out.with_value(key.clone(), value.clone());
            }
        }

        Ok(out)
    }
}

impl Default for OperationReplayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a required reference; `None` id or missing element both fail
fn resolve<E: DocumentEngine + ?Sized>(engine: &E, id: Option<&str>) -> Option<Element> {
    engine.get_element(id?)
}

/// Resolve an optional reference; absence is not an error
fn resolve_opt<E: DocumentEngine + ?Sized>(engine: &E, id: Option<&str>) -> Option<Element> {
    id.and_then(|id| engine.get_element(id))
}

/// Resolve a collection, keeping the members that still exist
fn resolve_all<E: DocumentEngine + ?Sized>(engine: &E, ids: Option<&[String]>) -> Vec<Element> {
    ids.unwrap_or_default()
        .iter()
        .filter_map(|id| engine.get_element(id))
        .collect()
}

/// Hints default to an empty map when absent
fn with_hints(ctx: OperationContext, hints: Option<Value>) -> OperationContext {
    ctx.with_value("hints", hints.unwrap_or_else(|| Value::Object(Map::new())))
}

/// Base field name for `…Ids` collection keys
fn collection_base(key: &str) -> Option<&'static str> {
    let base = key.strip_suffix("Ids")?;
    COLLECTION_REF_FIELDS.iter().copied().find(|f| *f == base)
}

/// Base field name for `…Id` single-reference keys
fn single_base(key: &str) -> Option<&'static str> {
    let base = key.strip_suffix("Id")?;
    SINGLE_REF_FIELDS.iter().copied().find(|f| *f == base)
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
