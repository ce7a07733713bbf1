// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Multi-agent file refinement.
//!
//! Each file is cut into chunks. Every chunk goes through `cycles` rounds of
//! manager guidance, expansion and (in dual mode) optimization, each step
//! a separate compute call on the endpoint configured for that role. The
//! manager then consolidates the refined chunks into the final text.
//!
//! All calls go through `PulseEngine::compute`, so each one is scheduled
//! and recorded in the integrity ledger.

use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RefineConfig;
use crate::engine::PulseEngine;
use crate::errors::EngineError;
use crate::events::EngineEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineRequest {
    /// Goal handed to the manager with every chunk.
    pub task: String,
    pub files: Vec<SourceFile>,
    #[serde(default = "default_cycles")]
    pub cycles: u32,
    #[serde(default)]
    pub dual_mode: bool,
}

fn default_cycles() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinedFile {
    pub path: String,
    pub content: String,
    pub refined_content: String,
}

/// Split `text` into pieces of at most `kb` KiB, never inside a UTF-8
/// sequence.
pub fn chunk_text(text: &str, kb: usize) -> Vec<&str> {
    let size = kb.max(1) * 1024;
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = size.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

impl PulseEngine {
    /// Refine every file in `request`. Files are processed concurrently.
    pub async fn refine(&self, request: RefineRequest) -> Result<Vec<RefinedFile>, EngineError> {
        if request.files.is_empty() {
            return Err(EngineError::InvalidInput("no files to refine".into()));
        }

        let routes = self.config().refine.clone();
        let available = self.endpoints().len();
        let mut roles = vec![routes.manager, routes.expander];
        if request.dual_mode {
            roles.push(routes.optimizer);
        }
        if let Some(&index) = roles.iter().find(|&&i| i >= available) {
            return Err(EngineError::UnknownEndpoint { index, available });
        }

        info!(files = request.files.len(), cycles = request.cycles, dual = request.dual_mode, "Refinement started");

        let results = join_all(
            request
                .files
                .iter()
                .map(|file| self.refine_file(file, &request, &routes)),
        )
        .await;

        results.into_iter().collect()
    }

    async fn refine_file(
        &self,
        file: &SourceFile,
        request: &RefineRequest,
        routes: &RefineConfig,
    ) -> Result<RefinedFile, EngineError> {
        let chunks = chunk_text(&file.content, routes.chunk_kb);
        let pause = Duration::from_millis(routes.cycle_pause_ms);
        self.events()
            .emit(&EngineEvent::log(format!("[RefineStart] {} ({} chunks)", file.path, chunks.len())));

        let mut refined_chunks = Vec::with_capacity(chunks.len());
        for (c, chunk) in chunks.iter().enumerate() {
            let mut current = chunk.to_string();
            for cycle in 0..request.cycles {
                match self.refine_round(&current, c, cycle, request, routes).await {
                    Ok(refined) => {
                        if !refined.trim().is_empty() {
                            current = refined;
                        }
                        debug!(path = %file.path, chunk = c + 1, cycle = cycle + 1, "Refine round done");
                    }
                    Err(e) if e.is_aborted() => return Err(e),
                    Err(e) => {
                        warn!(path = %file.path, chunk = c + 1, cycle = cycle + 1, error = %e, "Refine round failed");
                        self.events()
                            .emit(&EngineEvent::log(format!("[RefineError][{}] {}", file.path, e)));
                    }
                }
                tokio::time::sleep(pause).await;
            }
            refined_chunks.push(current);
        }

        let joined = refined_chunks.join("\n\n");
        let prompt = format!(
            "Consolidate {} refined chunks for file {}:\n{}",
            refined_chunks.len(),
            file.path,
            joined
        );
        let refined_content = match self.compute(&prompt, routes.manager).await {
            Ok(result) if !result.text.trim().is_empty() => result.text.trim().to_string(),
            Ok(_) => joined,
            Err(e) if e.is_aborted() => return Err(e),
            Err(e) => {
                warn!(path = %file.path, error = %e, "Consolidation failed, keeping joined chunks");
                joined
            }
        };

        Ok(RefinedFile {
            path: file.path.clone(),
            content: file.content.clone(),
            refined_content,
        })
    }

    async fn refine_round(
        &self,
        current: &str,
        chunk: usize,
        cycle: u32,
        request: &RefineRequest,
        routes: &RefineConfig,
    ) -> Result<String, EngineError> {
        let guidance = format!(
            "Task goal: {}\nRefine chunk {} cycle {}:\n{}",
            request.task,
            chunk + 1,
            cycle + 1,
            current
        );
        let mut refined = self.compute(&guidance, routes.manager).await?.text;
        refined = self.compute(&format!("Expand this:\n{}", refined), routes.expander).await?.text;
        if request.dual_mode {
            refined = self
                .compute(&format!("Improve and optimize:\n{}", refined), routes.optimizer)
                .await?
                .text;
        }
        Ok(refined)
    }
}
