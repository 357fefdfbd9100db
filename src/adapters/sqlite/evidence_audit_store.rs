//! SQLite implementation of `EvidenceStore` and `AuditSink` (C1's
//! append-only, content-addressed half).

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::models::{AuditEvent, EvidenceArtifact, EvidenceBundle, Phase};
use crate::domain::ports::{AuditFilter, AuditSink, EvidenceStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct SqliteEvidenceAuditStore {
    pool: SqlitePool,
}

impl SqliteEvidenceAuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvidenceStore for SqliteEvidenceAuditStore {
    async fn append_evidence(
        &self,
        task_id: Uuid,
        phase: Phase,
        name: &str,
        content: &[u8],
    ) -> StoreResult<EvidenceArtifact> {
        let artifact = EvidenceArtifact::new(task_id, phase, name, content);

        let existing: Option<(String, i64)> = sqlx::query_as(
            "SELECT content_hash, version FROM evidence_artifacts WHERE task_id = ? AND phase = ? AND name = ?",
        )
        .bind(task_id.to_string())
        .bind(phase.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let version = match &existing {
            Some((hash, version)) if *hash == artifact.content_hash => {
                // Identical content already recorded; append_evidence is a no-op.
                return Ok(EvidenceArtifact {
                    version: *version as u32,
                    ..artifact
                });
            }
            Some((_, version)) => *version as u32 + 1,
            None => 1,
        };
        let artifact = EvidenceArtifact { version, ..artifact };

        sqlx::query("INSERT OR IGNORE INTO evidence_blobs (content_hash, content) VALUES (?, ?)")
            .bind(&artifact.content_hash)
            .bind(content)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"INSERT INTO evidence_artifacts (task_id, phase, name, content_hash, size_bytes, version, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(task_id, phase, name) DO UPDATE SET
                   content_hash = excluded.content_hash,
                   size_bytes = excluded.size_bytes,
                   version = excluded.version,
                   created_at = excluded.created_at"#,
        )
        .bind(task_id.to_string())
        .bind(phase.as_str())
        .bind(name)
        .bind(&artifact.content_hash)
        .bind(artifact.size_bytes as i64)
        .bind(artifact.version as i64)
        .bind(artifact.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(artifact)
    }

    async fn read_evidence(&self, task_id: Uuid, phase: Option<Phase>) -> StoreResult<EvidenceBundle> {
        let rows: Vec<ArtifactRow> = match phase {
            Some(phase) => {
                sqlx::query_as("SELECT * FROM evidence_artifacts WHERE task_id = ? AND phase = ? ORDER BY name")
                    .bind(task_id.to_string())
                    .bind(phase.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM evidence_artifacts WHERE task_id = ? ORDER BY phase, name")
                    .bind(task_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let artifacts = rows.into_iter().map(|r| r.try_into()).collect::<StoreResult<Vec<_>>>()?;
        Ok(EvidenceBundle { artifacts })
    }

    async fn read_artifact(&self, task_id: Uuid, phase: Phase, name: &str) -> StoreResult<Vec<u8>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT content_hash FROM evidence_artifacts WHERE task_id = ? AND phase = ? AND name = ?",
        )
        .bind(task_id.to_string())
        .bind(phase.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let (content_hash,) = row.ok_or_else(|| {
            StoreError::ConstraintViolation(format!("no artifact '{name}' for task {task_id} phase {phase}"))
        })?;

        let blob: Option<(Vec<u8>,)> = sqlx::query_as("SELECT content FROM evidence_blobs WHERE content_hash = ?")
            .bind(&content_hash)
            .fetch_optional(&self.pool)
            .await?;

        blob.map(|(content,)| content)
            .ok_or_else(|| StoreError::ConstraintViolation(format!("missing blob for content_hash {content_hash}")))
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    task_id: String,
    phase: String,
    name: String,
    content_hash: String,
    size_bytes: i64,
    version: i64,
    created_at: String,
}

impl TryFrom<ArtifactRow> for EvidenceArtifact {
    type Error = StoreError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        let task_id = super::parse_uuid(&row.task_id)?;
        let phase = Phase::from_str(&row.phase)
            .ok_or_else(|| StoreError::ConstraintViolation(format!("invalid phase: {}", row.phase)))?;
        let created_at = super::parse_datetime(&row.created_at)?;

        Ok(EvidenceArtifact {
            task_id,
            phase,
            name: row.name,
            content_hash: row.content_hash,
            size_bytes: row.size_bytes as u64,
            created_at,
            version: row.version as u32,
        })
    }
}

#[async_trait]
impl AuditSink for SqliteEvidenceAuditStore {
    async fn append_audit(&self, event: &AuditEvent) -> StoreResult<()> {
        let kind_json = serde_json::to_string(&event.kind)?;
        let actor_json = serde_json::to_string(&event.actor)?;

        sqlx::query(
            r#"INSERT INTO audit_events (id, at, kind, actor, task_id, message, context)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(event.id.to_string())
        .bind(event.at.to_rfc3339())
        .bind(&kind_json)
        .bind(&actor_json)
        .bind(event.task_id.map(|id| id.to_string()))
        .bind(&event.message)
        .bind(serde_json::to_string(&event.context)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_audit(&self, filter: AuditFilter) -> StoreResult<Vec<AuditEvent>> {
        let mut sql = String::from("SELECT * FROM audit_events WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(task_id) = &filter.task_id {
            sql.push_str(" AND task_id = ?");
            bindings.push(task_id.to_string());
        }
        if let Some(since) = &filter.since {
            sql.push_str(" AND at >= ?");
            bindings.push(since.to_rfc3339());
        }

        sql.push_str(" ORDER BY at ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut q = sqlx::query_as::<_, AuditRow>(&sql);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<AuditRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    at: String,
    kind: String,
    actor: String,
    task_id: Option<String>,
    message: String,
    context: String,
}

impl TryFrom<AuditRow> for AuditEvent {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let id = super::parse_uuid(&row.id)?;
        let at = super::parse_datetime(&row.at)?;
        let task_id = super::parse_optional_uuid(row.task_id)?;
        let kind = serde_json::from_str(&row.kind)?;
        let actor = serde_json::from_str(&row.actor)?;
        let context = serde_json::from_str(&row.context)?;

        Ok(AuditEvent {
            id,
            at,
            kind,
            actor,
            task_id,
            message: row.message,
            context,
        })
    }
}
