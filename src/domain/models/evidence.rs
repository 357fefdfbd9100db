//! Evidence Bundle — the durable artifacts a phase produces (spec §3, §4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::phase::Phase;

/// A single content-addressed artifact written by a phase.
///
/// `append_evidence` is idempotent by `(task_id, phase, name, content_hash)`:
/// writing the same content twice is a no-op, writing different content
/// supersedes the prior artifact rather than appending a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    pub task_id: Uuid,
    pub phase: Phase,
    pub name: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Monotonically increasing per `(task_id, phase, name)`; bumped only
    /// when `content_hash` changes.
    pub version: u32,
}

impl EvidenceArtifact {
    pub fn new(task_id: Uuid, phase: Phase, name: impl Into<String>, content: &[u8]) -> Self {
        Self {
            task_id,
            phase,
            name: name.into(),
            content_hash: hash_content(content),
            size_bytes: content.len() as u64,
            created_at: Utc::now(),
            version: 1,
        }
    }

    /// Relative path under `STATE_ROOT/evidence/...` this artifact is stored
    /// at (spec §3).
    pub fn relative_path(&self) -> String {
        format!(
            "evidence/{}/{}/{}",
            self.task_id,
            self.phase.as_str(),
            self.name
        )
    }
}

/// A read-only bundle of all artifacts produced for one task/phase pair,
/// handed to critics and to the human-facing `autopilot status` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub artifacts: Vec<EvidenceArtifact>,
}

impl EvidenceBundle {
    pub fn find(&self, name: &str) -> Option<&EvidenceArtifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    pub fn has_all(&self, required: &[&str]) -> bool {
        required.iter().all(|name| self.find(name).is_some())
    }

    pub fn missing<'a>(&self, required: &'a [&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| self.find(name).is_none())
            .collect()
    }
}

fn hash_content(content: &[u8]) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
