//! Test doubles shared by the crate's test modules.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::engine::{Bounds, ContextValue, DocumentEngine, Element, OperationContext};

/// In-memory engine double: a registry plus a recorded command log.
///
/// Enough real behavior is implemented for end-to-end assertions: creates
/// insert into the registry, deletes remove, moves apply the delta.
pub(crate) struct FakeEngine {
    pub elements: HashMap<String, Element>,
    pub executed: Vec<(String, OperationContext)>,
    pub snapshot: String,
    pub imported: Vec<String>,
    pub execute_fails: bool,
    pub export_fails: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
            executed: Vec::new(),
            snapshot: String::new(),
            imported: Vec::new(),
            execute_fails: false,
            export_fails: false,
        }
    }

    pub fn with_element(mut self, id: &str, x: f64, y: f64) -> Self {
        self.elements.insert(
            id.to_string(),
            Element::new(
                id,
                Bounds {
                    x,
                    y,
                    width: 100.0,
                    height: 80.0,
                },
            ),
        );
        self
    }

    pub fn last_executed(&self) -> Option<&(String, OperationContext)> {
        self.executed.last()
    }

    fn apply(&mut self, command: &str, context: &OperationContext) {
        match command {
            "shape.create" | "element.create" => {
                let id = context
                    .get("shape")
                    .and_then(ContextValue::as_element)
                    .map(|el| el.id.clone())
                    .or_else(|| {
                        context
                            .get("shapeId")
                            .and_then(ContextValue::as_value)
                            .and_then(|v| v.as_str())
                            .map(str::to_string)
                    });
                let position = context.get("position").and_then(ContextValue::as_value);
                if let Some(id) = id {
                    let x = position
                        .and_then(|p| p.get("x"))
                        .and_then(serde_json::Value::as_f64)
                        .unwrap_or(0.0);
                    let y = position
                        .and_then(|p| p.get("y"))
                        .and_then(serde_json::Value::as_f64)
                        .unwrap_or(0.0);
                    self.elements.insert(
                        id.clone(),
                        Element::new(
                            id,
                            Bounds {
                                x,
                                y,
                                width: 100.0,
                                height: 80.0,
                            },
                        ),
                    );
                }
            }
            "elements.delete" => {
                if let Some(elements) = context.get("elements").and_then(ContextValue::as_elements)
                {
                    for el in elements {
                        self.elements.remove(&el.id);
                    }
                }
            }
            "shape.move" | "elements.move" => {
                let delta = context.get("delta").and_then(ContextValue::as_value);
                let dx = delta
                    .and_then(|d| d.get("x"))
                    .and_then(serde_json::Value::as_f64)
                    .unwrap_or(0.0);
                let dy = delta
                    .and_then(|d| d.get("y"))
                    .and_then(serde_json::Value::as_f64)
                    .unwrap_or(0.0);

                let mut moved: Vec<String> = Vec::new();
                if let Some(el) = context.get("shape").and_then(ContextValue::as_element) {
                    moved.push(el.id.clone());
                }
                if let Some(els) = context.get("shapes").and_then(ContextValue::as_elements) {
                    moved.extend(els.iter().map(|el| el.id.clone()));
                }
                for id in moved {
                    if let Some(el) = self.elements.get_mut(&id) {
                        el.bounds.x += dx;
                        el.bounds.y += dy;
                    }
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl DocumentEngine for FakeEngine {
    fn get_element(&self, id: &str) -> Option<Element> {
        self.elements.get(id).cloned()
    }

    fn execute(&mut self, command: &str, context: OperationContext) -> anyhow::Result<()> {
        if self.execute_fails {
            anyhow::bail!("engine rejected {command}");
        }
        self.apply(command, &context);
        self.executed.push((command.to_string(), context));
        Ok(())
    }

    async fn export_snapshot(&self) -> anyhow::Result<String> {
        if self.export_fails {
            anyhow::bail!("export failed");
        }
        Ok(self.snapshot.clone())
    }

    async fn import_snapshot(&mut self, snapshot: &str) -> anyhow::Result<()> {
        self.imported.push(snapshot.to_string());
        self.snapshot = snapshot.to_string();
        Ok(())
    }
}
