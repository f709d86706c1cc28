// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Pipeline
//!
//! Three named stages, each a `HookRegistry` chain: `pre-process-file`
//! (transforms the file before chunking begins), `per-chunk-process`
//! (transforms one chunk's bytes before upload), and `post-process-file`
//! (runs after every chunk has succeeded, given the aggregated server
//! responses). Plugins attach handlers to any stage at install time; the
//! pipeline tracks only plugin *names* so `uninstall` can detach everything
//! a plugin registered through one call to `HookRegistry::remove_plugin_hooks`.

use crate::application::services::hook_registry::{HookHandler, HookRegistry};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use upload_engine_domain::UploadError;

pub const PRE_PROCESS_FILE: &str = "pre-process-file";
pub const PER_CHUNK_PROCESS: &str = "per-chunk-process";
pub const POST_PROCESS_FILE: &str = "post-process-file";

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub abort_on_pre_process_fail: bool,
    pub abort_on_process_fail: bool,
    pub abort_on_post_process_fail: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            abort_on_pre_process_fail: true,
            abort_on_process_fail: true,
            abort_on_post_process_fail: false,
        }
    }
}

pub struct Pipeline {
    registry: HookRegistry,
    config: PipelineConfig,
    installed_plugins: HashSet<String>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline {
            registry: HookRegistry::new(),
            config,
            installed_plugins: HashSet::new(),
        }
    }

    /// Registers `handler` for `plugin` at `stage`, recording the plugin
    /// name so `uninstall_plugin` can find it again without the pipeline
    /// ever holding a direct handle to the plugin itself.
    pub fn attach(&mut self, stage: &str, plugin: impl Into<String>, priority: i32, handler: Arc<dyn HookHandler>) {
        let plugin = plugin.into();
        self.installed_plugins.insert(plugin.clone());
        self.registry.register(stage, plugin, priority, handler);
    }

    /// The single path that removes both the name→plugin record and every
    /// name→hook-handler entry the plugin owns, together.
    pub fn uninstall_plugin(&mut self, plugin: &str) {
        self.registry.remove_plugin_hooks(plugin);
        self.installed_plugins.remove(plugin);
    }

    pub fn installed_plugins(&self) -> impl Iterator<Item = &str> {
        self.installed_plugins.iter().map(|s| s.as_str())
    }

    pub async fn run_pre_process(&self, file: Value) -> Result<Value, UploadError> {
        self.run_stage(PRE_PROCESS_FILE, file, self.config.abort_on_pre_process_fail).await
    }

    pub async fn run_per_chunk(&self, chunk: Value) -> Result<Value, UploadError> {
        self.run_stage(PER_CHUNK_PROCESS, chunk, self.config.abort_on_process_fail).await
    }

    pub async fn run_post_process(&self, payload: Value) -> Result<Value, UploadError> {
        self.run_stage(POST_PROCESS_FILE, payload, self.config.abort_on_post_process_fail).await
    }

    async fn run_stage(&self, stage: &str, input: Value, abort_on_fail: bool) -> Result<Value, UploadError> {
        let outcome = self.registry.run(stage, input).await;
        if !outcome.errors.is_empty() && abort_on_fail {
            return Err(UploadError::Plugin(format!("{stage} stage failed: {}", outcome.errors.join("; "))));
        }
        Ok(outcome.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passthrough() -> Arc<dyn HookHandler> {
        Arc::new(|v: Value| async move { Ok(v) })
    }

    #[tokio::test]
    async fn pre_process_abort_surfaces_as_plugin_error() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline.attach(PRE_PROCESS_FILE, "broken", 1, Arc::new(|_: Value| async { Err(UploadError::validation("nope")) }));
        let result = pipeline.run_pre_process(json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn post_process_failure_is_non_fatal_by_default() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline.attach(POST_PROCESS_FILE, "warns", 1, Arc::new(|_: Value| async { Err(UploadError::internal("warn only")) }));
        let result = pipeline.run_post_process(json!({})).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn uninstall_plugin_detaches_from_every_stage() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline.attach(PRE_PROCESS_FILE, "p", 1, passthrough());
        pipeline.attach(PER_CHUNK_PROCESS, "p", 1, passthrough());
        pipeline.uninstall_plugin("p");
        assert!(pipeline.installed_plugins().next().is_none());
        let result = pipeline.run_pre_process(json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }
}
