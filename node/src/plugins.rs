// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Post-generation hook chain.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Rewrite generated content. `Ok(None)` keeps it unchanged.
    async fn after_generation(&self, task_id: &str, content: &str) -> Result<Option<String>, String>;
}

/// Registered plugins, run in registration order.
#[derive(Default)]
pub struct PluginManager {
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. A second plugin with the same name is ignored.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> bool {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        if plugins.iter().any(|p| p.name() == plugin.name()) {
            debug!(name = plugin.name(), "Plugin already registered");
            return false;
        }
        info!(name = plugin.name(), "Plugin registered");
        plugins.push(plugin);
        true
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Thread `content` through every plugin. A failing plugin is skipped.
    pub async fn after_generation(&self, task_id: &str, content: String) -> String {
        let plugins: Vec<Arc<dyn Plugin>> = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut current = content;
        for plugin in plugins {
            match plugin.after_generation(task_id, &current).await {
                Ok(Some(rewritten)) => current = rewritten,
                Ok(None) => {}
                Err(e) => warn!(plugin = plugin.name(), error = %e, "Plugin afterGeneration failed"),
            }
        }
        current
    }
}

/// Recognizes JSONFlow documents (objects with `function` and `steps`).
/// Content is passed through unchanged either way.
#[derive(Debug, Default)]
pub struct JsonFlowPlugin;

impl JsonFlowPlugin {
    pub fn is_json_flow(content: &str) -> bool {
        serde_json::from_str::<serde_json::Value>(content)
            .map(|v| v.get("function").is_some() && v.get("steps").is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Plugin for JsonFlowPlugin {
    fn name(&self) -> &str {
        "JSONFlowConverter"
    }

    async fn after_generation(&self, task_id: &str, content: &str) -> Result<Option<String>, String> {
        if Self::is_json_flow(content) {
            info!(task_id, "Already JSONFlow compliant");
        } else {
            debug!(task_id, "Not JSONFlow, passing through");
        }
        Ok(None)
    }
}
