// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Hook Registry
//!
//! A named extension point that runs its handlers as an ordered waterfall:
//! each handler receives the prior handler's output as input, lower
//! `priority` runs first, and a handler may abort the chain by returning an
//! error. Generic over `serde_json::Value` so arbitrary plugins can exchange
//! structured payloads without the registry needing a per-hook generic type
//! parameter, the same shape a `ChunkProcessor` registry uses for
//! trait-object handler dispatch.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use upload_engine_domain::UploadError;

#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn call(&self, input: Value) -> Result<Value, UploadError>;
}

#[async_trait]
impl<F, Fut> HookHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, UploadError>> + Send,
{
    async fn call(&self, input: Value) -> Result<Value, UploadError> {
        (self)(input).await
    }
}

struct RegisteredHandler {
    plugin: String,
    priority: i32,
    handler: Arc<dyn HookHandler>,
}

/// The outcome of running one hook's handler chain.
#[derive(Debug, Clone)]
pub struct HookRunResult {
    pub handled: bool,
    pub result: Value,
    pub modified: bool,
    pub errors: Vec<String>,
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Vec<RegisteredHandler>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        HookRegistry { hooks: HashMap::new() }
    }

    /// Registers `handler` under `hook_name` for `plugin`, sorted ascending
    /// by `priority` (lower runs earlier) among the hook's existing
    /// handlers.
    pub fn register(&mut self, hook_name: impl Into<String>, plugin: impl Into<String>, priority: i32, handler: Arc<dyn HookHandler>) {
        let entry = self.hooks.entry(hook_name.into()).or_default();
        entry.push(RegisteredHandler {
            plugin: plugin.into(),
            priority,
            handler,
        });
        entry.sort_by_key(|h| h.priority);
    }

    /// Detaches every handler `plugin` registered, across every hook name.
    /// This is the only code path that removes plugin handlers so uninstall
    /// can never leave a dangling name→handler entry.
    pub fn remove_plugin_hooks(&mut self, plugin: &str) {
        for handlers in self.hooks.values_mut() {
            handlers.retain(|h| h.plugin != plugin);
        }
        self.hooks.retain(|_, handlers| !handlers.is_empty());
    }

    /// Runs every handler registered for `hook_name` in priority order, each
    /// receiving the previous handler's output. A handler error aborts the
    /// remaining chain; the error is recorded in `errors` and the result
    /// reflects whatever the last successful handler produced.
    pub async fn run(&self, hook_name: &str, input: Value) -> HookRunResult {
        let Some(handlers) = self.hooks.get(hook_name) else {
            return HookRunResult {
                handled: false,
                result: input,
                modified: false,
                errors: Vec::new(),
            };
        };
        let mut current = input.clone();
        let mut modified = false;
        let mut errors = Vec::new();
        for registered in handlers {
            match registered.handler.call(current.clone()).await {
                Ok(output) => {
                    if output != current {
                        modified = true;
                    }
                    current = output;
                }
                Err(err) => {
                    errors.push(format!("{}: {err}", registered.plugin));
                    break;
                }
            }
        }
        HookRunResult {
            handled: !handlers.is_empty(),
            result: current,
            modified,
            errors,
        }
    }

    pub fn handler_count(&self, hook_name: &str) -> usize {
        self.hooks.get(hook_name).map(|h| h.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handler_fn<F, Fut>(f: F) -> Arc<dyn HookHandler>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, UploadError>> + Send + 'static,
    {
        Arc::new(f)
    }

    #[tokio::test]
    async fn handlers_run_in_priority_order() {
        let mut registry = HookRegistry::new();
        registry.register(
            "pre-process-file",
            "b",
            10,
            handler_fn(|v: Value| async move { Ok(json!({ "order": format!("{}b", v["order"].as_str().unwrap_or("")) })) }),
        );
        registry.register(
            "pre-process-file",
            "a",
            1,
            handler_fn(|v: Value| async move { Ok(json!({ "order": format!("{}a", v["order"].as_str().unwrap_or("")) })) }),
        );
        let result = registry.run("pre-process-file", json!({ "order": "" })).await;
        assert_eq!(result.result["order"], "ab");
        assert!(result.modified);
    }

    #[tokio::test]
    async fn unknown_hook_name_is_unhandled_passthrough() {
        let registry = HookRegistry::new();
        let result = registry.run("nonexistent", json!({ "x": 1 })).await;
        assert!(!result.handled);
        assert_eq!(result.result, json!({ "x": 1 }));
    }

    #[tokio::test]
    async fn handler_error_aborts_chain_and_is_recorded() {
        let mut registry = HookRegistry::new();
        registry.register("h", "fails", 1, handler_fn(|_| async { Err(UploadError::validation("bad input")) }));
        registry.register("h", "never-runs", 2, handler_fn(|v: Value| async move { Ok(v) }));
        let result = registry.run("h", json!(null)).await;
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn remove_plugin_hooks_detaches_only_that_plugin() {
        let mut registry = HookRegistry::new();
        registry.register("h", "keep", 1, handler_fn(|v: Value| async move { Ok(v) }));
        registry.register("h", "drop", 2, handler_fn(|v: Value| async move { Ok(v) }));
        registry.remove_plugin_hooks("drop");
        assert_eq!(registry.handler_count("h"), 1);
    }
}
