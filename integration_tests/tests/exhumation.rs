mod common;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use cemetery_core::{
    load_config_from_env, ExhumationDraft, ExhumationError, ExhumationService, ExhumationStore,
    LocalRequestStore, LogNotifier,
};
use plot_proto::{decode_requests_json, ExhumationRequest, ExhumationStatus, RequestOrigin};

struct Offline;

#[async_trait]
impl ExhumationStore for Offline {
    async fn create(&self, _request: ExhumationRequest) -> Result<ExhumationRequest, ExhumationError> {
        Err(ExhumationError::Unavailable("503 service unavailable".to_string()))
    }

    async fn list(&self) -> Result<Vec<ExhumationRequest>, ExhumationError> {
        Err(ExhumationError::Unavailable("503 service unavailable".to_string()))
    }

    async fn set_status(
        &self,
        id: &str,
        _to: ExhumationStatus,
    ) -> Result<ExhumationRequest, ExhumationError> {
        Err(ExhumationError::NotFound(id.to_string()))
    }
}

fn draft(plot_id: &str) -> ExhumationDraft {
    ExhumationDraft {
        plot_id: plot_id.to_string(),
        requester_name: "Pedro Cruz".to_string(),
        requester_email: "pedro.cruz@example.org".to_string(),
        requester_phone: Some("0917 555 0142".to_string()),
        relationship: Some("Son".to_string()),
        reason: "Transfer to family mausoleum".to_string(),
        destination_plot: Some("eternal-tomb".to_string()),
        documents: vec!["death-certificate.pdf".to_string()],
    }
}

#[tokio::test]
async fn remote_outage_keeps_the_request_locally() -> Result<()> {
    common::ensure_test_config();
    let (config, metadata) = load_config_from_env();
    assert!(metadata.path().is_some());

    let dir = tempfile::tempdir()?;
    let local_path = dir.path().join("requests.json");
    let service = ExhumationService::new(
        Arc::new(Offline),
        Arc::new(LocalRequestStore::new(&local_path)),
    )
    .with_notifier(
        Arc::new(LogNotifier),
        config.office_notice().expect("office recipient configured"),
    );

    let first = service.submit(draft("lb-10a")).await?;
    let second = service.submit(draft("apartment-5-3h")).await?;
    for request in [&first, &second] {
        assert!(request.id.starts_with("local-"));
        assert_eq!(request.origin, RequestOrigin::LocalFallback);
        assert_eq!(request.status, ExhumationStatus::Pending);
    }
    assert_ne!(first.id, second.id);

    let on_disk = decode_requests_json(&std::fs::read_to_string(&local_path)?)?;
    assert_eq!(on_disk.len(), 2);
    assert_eq!(on_disk[0].documents, vec!["death-certificate.pdf".to_string()]);

    let listed = service.list().await?;
    assert_eq!(listed.len(), 2);
    Ok(())
}

#[tokio::test]
async fn review_walks_the_workflow() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = ExhumationService::new(
        Arc::new(LocalRequestStore::new(dir.path().join("remote.json"))),
        Arc::new(LocalRequestStore::new(dir.path().join("local.json"))),
    );
    let request = service.submit(draft("rb-2c")).await?;
    assert_eq!(request.origin, RequestOrigin::Remote);

    let approved = service.review(&request.id, ExhumationStatus::Approved).await?;
    assert_eq!(approved.status, ExhumationStatus::Approved);
    assert!(matches!(
        service.review(&request.id, ExhumationStatus::Rejected).await,
        Err(ExhumationError::InvalidTransition { .. })
    ));
    let completed = service.review(&request.id, ExhumationStatus::Completed).await?;
    assert_eq!(completed.status, ExhumationStatus::Completed);
    assert!(matches!(
        service.review("missing", ExhumationStatus::Approved).await,
        Err(ExhumationError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn invalid_forms_report_each_field() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = ExhumationService::new(
        Arc::new(Offline),
        Arc::new(LocalRequestStore::new(dir.path().join("local.json"))),
    );
    let bad = ExhumationDraft {
        requester_email: "not-an-email".to_string(),
        requester_phone: Some("123".to_string()),
        ..draft("lb-10a")
    };
    match service.submit(bad).await {
        Err(ExhumationError::Validation(errors)) => {
            assert!(errors.has("requester_email"));
            assert!(errors.has("requester_phone"));
            assert_eq!(errors.errors.len(), 2);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert!(!dir.path().join("local.json").exists());
    Ok(())
}
