use crate::error::BugError;
use crate::models::bug::{BugFilter, BugPatch, BugPayload, BugRecord, BugStatus, StatusAction};
use crate::rules::lifecycle::Workflow;
use crate::rules::validate::{format_errors, validate_submission};
use crate::store::{BugRepository, StoreError};
use std::sync::Arc;

const DEFAULT_SEVERITY: &str = "medium";

/// Validation, workflow and persistence for bug records.
///
/// Validation runs inline; repository calls run on the blocking pool and are
/// the only awaited work. A failed check never reaches the repository.
#[derive(Clone)]
pub struct BugService {
    repo: Arc<dyn BugRepository>,
    workflow: Workflow,
}

impl BugService {
    pub fn new(repo: Arc<dyn BugRepository>, workflow: Workflow) -> Self {
        Self { repo, workflow }
    }

    pub async fn list(&self, filter: BugFilter) -> Result<Vec<BugRecord>, BugError> {
        self.blocking(move |repo| repo.list(&filter)).await
    }

    pub async fn get(&self, id: &str) -> Result<BugRecord, BugError> {
        let key = id.to_string();
        self.blocking(move |repo| repo.get(&key))
            .await?
            .ok_or_else(|| BugError::NotFound(id.to_string()))
    }

    pub async fn create(&self, mut payload: BugPayload) -> Result<BugRecord, BugError> {
        if payload.severity.as_deref().map_or(true, |s| s.trim().is_empty()) {
            payload.severity = Some(DEFAULT_SEVERITY.to_string());
        }
        // New bugs always start open.
        payload.status = None;
        payload.malformed.retain(|e| e.field != "status");

        ensure_valid(&payload)?;

        let now = chrono::Utc::now().timestamp_millis();
        let record = build_record(
            uuid::Uuid::new_v4().to_string(),
            payload,
            BugStatus::Open,
            now,
            now,
        )?;

        let stored = record.clone();
        self.blocking(move |repo| repo.create(&stored)).await?;
        log::info!("created bug {} ({})", record.id, record.title);
        Ok(record)
    }

    /// Merge `patch` into the stored record, re-validate the result and
    /// check the status move against the workflow.
    pub async fn update(&self, id: &str, patch: BugPatch) -> Result<BugRecord, BugError> {
        let existing = self.get(id).await?;
        let merged = BugPayload::from_record(&existing).merge(patch);
        ensure_valid(&merged)?;

        let status = parse_field::<BugStatus>(merged.status.as_deref(), "status", "Invalid status value")?;
        if !self.workflow.permits(existing.status, status) {
            return Err(BugError::field(
                "status",
                format!("Cannot move a bug from {} to {}", existing.status, status),
            ));
        }

        let record = build_record(
            existing.id.clone(),
            merged,
            status,
            existing.created_at,
            next_timestamp(existing.updated_at),
        )?;
        self.replace(record).await
    }

    pub async fn transition(&self, id: &str, action: StatusAction) -> Result<BugRecord, BugError> {
        let existing = self.get(id).await?;
        let Some(status) = action.apply(existing.status) else {
            return Err(BugError::field(
                "status",
                format!("Cannot {} a bug that is {}", action.label(), existing.status),
            ));
        };

        let record = BugRecord {
            status,
            updated_at: next_timestamp(existing.updated_at),
            ..existing
        };
        self.replace(record).await
    }

    /// Workflow actions an operator can take on the bug right now.
    pub async fn available_actions(&self, id: &str) -> Result<(BugRecord, Vec<StatusAction>), BugError> {
        let bug = self.get(id).await?;
        let actions = StatusAction::available(bug.status);
        Ok((bug, actions))
    }

    pub async fn delete(&self, id: &str) -> Result<(), BugError> {
        let key = id.to_string();
        if !self.blocking(move |repo| repo.delete(&key)).await? {
            return Err(BugError::NotFound(id.to_string()));
        }
        log::info!("deleted bug {id}");
        Ok(())
    }

    async fn replace(&self, record: BugRecord) -> Result<BugRecord, BugError> {
        let stored = record.clone();
        if !self.blocking(move |repo| repo.update(&stored)).await? {
            // Deleted between read and write.
            return Err(BugError::NotFound(record.id));
        }
        log::info!("updated bug {} (status {})", record.id, record.status);
        Ok(record)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, BugError>
    where
        F: FnOnce(&dyn BugRepository) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        let outcome = tokio::task::spawn_blocking(move || op(&*repo))
            .await
            .map_err(|e| BugError::Storage(format!("storage task failed: {e}")))?;

        outcome.map_err(|e| {
            log::error!("bug store error: {e}");
            BugError::from(e)
        })
    }
}

fn ensure_valid(payload: &BugPayload) -> Result<(), BugError> {
    let result = validate_submission(payload);
    if result.is_valid {
        return Ok(());
    }
    log::debug!("rejected bug payload: {}", format_errors(&result.errors));
    Err(BugError::Validation(result.errors))
}

/// Updates must strictly advance `updated_at`, even within one millisecond.
fn next_timestamp(previous: i64) -> i64 {
    chrono::Utc::now().timestamp_millis().max(previous + 1)
}

fn parse_field<T: std::str::FromStr>(value: Option<&str>, field: &str, message: &str) -> Result<T, BugError> {
    value
        .map(str::trim)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| BugError::field(field, message))
}

fn build_record(
    id: String,
    payload: BugPayload,
    status: BugStatus,
    created_at: i64,
    updated_at: i64,
) -> Result<BugRecord, BugError> {
    Ok(BugRecord {
        id,
        title: payload.title.unwrap_or_default().trim().to_string(),
        description: payload.description.unwrap_or_default().trim().to_string(),
        severity: parse_field(payload.severity.as_deref(), "severity", "Invalid severity value")?,
        priority: parse_field(payload.priority.as_deref(), "priority", "Invalid priority value")?,
        status,
        reported_by: payload.reported_by.unwrap_or_default().trim().to_string(),
        assigned_to: payload
            .assigned_to
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
        tags: payload.tags.iter().map(|t| t.trim().to_string()).collect(),
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bug::{Priority, Severity};
    use crate::store::memory::MemoryBugRepository;

    fn service() -> BugService {
        BugService::new(Arc::new(MemoryBugRepository::new()), Workflow::default())
    }

    fn payload() -> BugPayload {
        BugPayload {
            title: Some("  Valid bug title ".to_string()),
            description: Some("This is a valid bug description that is long enough".to_string()),
            severity: None,
            priority: Some("medium".to_string()),
            status: Some("resolved".to_string()),
            reported_by: Some("test@example.com".to_string()),
            assigned_to: Some("".to_string()),
            tags: vec![" bug ".to_string(), "frontend".to_string()],
            malformed: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_fills_defaults_and_normalizes() {
        let svc = service();
        let bug = svc.create(payload()).await.expect("create");

        assert_eq!(bug.title, "Valid bug title");
        assert_eq!(bug.severity, Severity::Medium);
        assert_eq!(bug.priority, Priority::Medium);
        assert_eq!(bug.status, BugStatus::Open);
        assert_eq!(bug.assigned_to, None);
        assert_eq!(bug.tags, vec!["bug", "frontend"]);
        assert_eq!(bug.created_at, bug.updated_at);
        assert_eq!(svc.get(&bug.id).await.expect("get"), bug);
    }

    #[tokio::test]
    async fn invalid_create_writes_nothing() {
        let svc = service();
        let err = svc
            .create(BugPayload { title: Some("bad".to_string()), ..payload() })
            .await
            .expect_err("invalid");
        assert!(matches!(err, BugError::Validation(ref errors) if errors[0].field == "title"));
        assert!(svc.list(BugFilter::default()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn update_advances_updated_at_and_keeps_identity() {
        let svc = service();
        let bug = svc.create(payload()).await.expect("create");
        let updated = svc
            .update(&bug.id, BugPatch { status: Some("in-progress".to_string()), ..Default::default() })
            .await
            .expect("update");

        assert_eq!(updated.id, bug.id);
        assert_eq!(updated.created_at, bug.created_at);
        assert_eq!(updated.status, BugStatus::InProgress);
        assert!(updated.updated_at > bug.updated_at);
    }

    #[tokio::test]
    async fn update_rejects_bad_status_without_writing() {
        let svc = service();
        let bug = svc.create(payload()).await.expect("create");

        let err = svc
            .update(&bug.id, BugPatch { status: Some("closed".to_string()), ..Default::default() })
            .await
            .expect_err("bad status");
        match err {
            BugError::Validation(errors) => assert_eq!(errors[0].message, "Invalid status value"),
            other => panic!("unexpected {other:?}"),
        }

        let err = svc
            .update(&bug.id, BugPatch { status: Some("resolved".to_string()), ..Default::default() })
            .await
            .expect_err("skipped workflow step");
        assert!(matches!(err, BugError::Validation(_)));
        assert_eq!(svc.get(&bug.id).await.expect("get"), bug);
    }

    #[tokio::test]
    async fn direct_resolve_follows_workflow_setting() {
        let svc = BugService::new(
            Arc::new(MemoryBugRepository::new()),
            Workflow { allow_direct_resolve: true },
        );
        let bug = svc.create(payload()).await.expect("create");
        let resolved = svc
            .update(&bug.id, BugPatch { status: Some("resolved".to_string()), ..Default::default() })
            .await
            .expect("direct resolve");
        assert_eq!(resolved.status, BugStatus::Resolved);
    }

    #[tokio::test]
    async fn transitions_walk_the_full_cycle() {
        let svc = service();
        let bug = svc.create(payload()).await.expect("create");

        let started = svc.transition(&bug.id, StatusAction::StartProgress).await.expect("start");
        let resolved = svc.transition(&bug.id, StatusAction::Resolve).await.expect("resolve");
        let reopened = svc.transition(&bug.id, StatusAction::Reopen).await.expect("reopen");

        assert_eq!(started.status, BugStatus::InProgress);
        assert_eq!(resolved.status, BugStatus::Resolved);
        assert_eq!(reopened.status, BugStatus::Open);
        assert!(started.updated_at < resolved.updated_at);
        assert!(resolved.updated_at < reopened.updated_at);

        let err = svc.transition(&bug.id, StatusAction::Resolve).await.expect_err("not started");
        assert!(matches!(err, BugError::Validation(_)));
    }

    #[tokio::test]
    async fn available_actions_track_the_current_status() {
        let svc = service();
        let bug = svc.create(payload()).await.expect("create");

        let (_, actions) = svc.available_actions(&bug.id).await.expect("actions");
        assert_eq!(actions, vec![StatusAction::StartProgress]);

        svc.transition(&bug.id, StatusAction::StartProgress).await.expect("start");
        let (current, actions) = svc.available_actions(&bug.id).await.expect("actions");
        assert_eq!(current.status, BugStatus::InProgress);
        assert_eq!(actions, vec![StatusAction::Resolve]);
    }

    #[tokio::test]
    async fn wrong_typed_fields_are_reported_with_rule_errors() {
        let svc = service();
        let payload: BugPayload = serde_json::from_str(
            r#"{"title":"ok","description":"This is long enough","severity":3,"priority":"medium","status":false,"reportedBy":"qa","tags":null}"#,
        )
        .expect("lenient parse");

        let err = svc.create(payload).await.expect_err("invalid");
        let BugError::Validation(errors) = err else {
            panic!("expected validation failure");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["severity", "title"]);
        assert!(svc.list(BugFilter::default()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let svc = service();
        svc.create(payload()).await.expect("create");

        assert!(matches!(svc.get("nope").await, Err(BugError::NotFound(_))));
        assert!(matches!(svc.delete("nope").await, Err(BugError::NotFound(_))));
        assert!(matches!(
            svc.update("nope", BugPatch::default()).await,
            Err(BugError::NotFound(_))
        ));
        assert_eq!(svc.list(BugFilter::default()).await.expect("list").len(), 1);
    }
}
