//! Evidence and audit halves of C1, kept separate from `TaskRepository`
//! since they're append-only/content-addressed rather than CRUD.

use async_trait::async_trait;
use uuid::Uuid;

use super::errors::StoreResult;
use crate::domain::models::{AuditEvent, EvidenceArtifact, EvidenceBundle, Phase};

/// Filter for `query_audit`.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub task_id: Option<Uuid>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Idempotent by `(task_id, phase, name, content_hash)` — see
    /// `EvidenceArtifact` doc comment.
    async fn append_evidence(
        &self,
        task_id: Uuid,
        phase: Phase,
        name: &str,
        content: &[u8],
    ) -> StoreResult<EvidenceArtifact>;

    async fn read_evidence(&self, task_id: Uuid, phase: Option<Phase>) -> StoreResult<EvidenceBundle>;

    /// Raw bytes of one artifact, for critics that parse evidence content
    /// (spec §4.5) rather than just checking presence.
    async fn read_artifact(&self, task_id: Uuid, phase: Phase, name: &str) -> StoreResult<Vec<u8>>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append_audit(&self, event: &AuditEvent) -> StoreResult<()>;

    async fn query_audit(&self, filter: AuditFilter) -> StoreResult<Vec<AuditEvent>>;
}
