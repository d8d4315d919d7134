//! Batch processing against staged uploads, archives and persistence.

mod common;

use assert_matches::assert_matches;
use common::{config_in, write_corrupt, write_png, TestHarness};
use mediaconv::conversion::batch::NO_OUTPUTS_ERROR;
use mediaconv::conversion::{BatchRequest, BatchSource, ConversionOptions};
use mediaconv::events::ConversionEvent;
use mediaconv::persistence::PersistenceGateway;
use mediaconv::Context;
use mediaconv_common::{BatchId, BatchStatus, FolderStructure, OutputFormat, TaskStatus};
use std::fs::File;
use std::path::Path;

fn entry_names(archive: &Path) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

async fn stage(h: &TestHarness, batch_id: &BatchId, files: &[&Path]) -> Vec<BatchSource> {
    let mut sources = Vec::new();
    for file in files {
        sources.push(h.ctx.stage_upload(file, batch_id).await.unwrap());
    }
    sources
}

fn png_and_webp() -> ConversionOptions {
    ConversionOptions {
        formats: vec![OutputFormat::Png, OutputFormat::Webp],
        ..Default::default()
    }
}

#[tokio::test]
async fn staged_batch_zips_by_file_and_keeps_originals() {
    let h = TestHarness::new();
    let dir = h.sources();
    let cat = write_png(&dir, "cat.png", 40, 30);
    let dog = write_png(&dir, "dog.png", 30, 40);

    let batch_id = BatchId::new();
    let sources = stage(&h, &batch_id, &[&cat, &dog]).await;
    let staged: Vec<_> = sources.iter().map(|s| s.path.clone()).collect();

    let job = h
        .ctx
        .batches
        .run(
            BatchRequest::new(sources, png_and_webp())
                .with_batch_id(batch_id)
                .with_layout(FolderStructure::ByFile),
        )
        .await;

    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(job.task_ids.len(), 2);
    assert_eq!(job.zip_filename, Some(batch_id.archive_name()));
    assert!(job.error.is_none());

    let archive = h.ctx.batches.archive_path(&batch_id).unwrap();
    let names = entry_names(&archive);
    assert_eq!(names.len(), 4);
    assert_eq!(names.iter().filter(|n| n.starts_with("cat.png/")).count(), 2);
    assert_eq!(names.iter().filter(|n| n.starts_with("dog.png/")).count(), 2);

    assert!(cat.exists() && dog.exists());
    for path in staged {
        assert!(!path.exists(), "staged copy {:?} should be gone", path);
    }
}

#[tokio::test]
async fn by_format_layout_groups_extensions() {
    let h = TestHarness::new();
    let dir = h.sources();
    let a = write_png(&dir, "a.png", 20, 20);
    let b = write_png(&dir, "b.png", 20, 20);

    let batch_id = BatchId::new();
    let sources = stage(&h, &batch_id, &[&a, &b]).await;
    let job = h
        .ctx
        .batches
        .run(
            BatchRequest::new(sources, png_and_webp())
                .with_batch_id(batch_id)
                .with_layout(FolderStructure::ByFormat),
        )
        .await;

    let names = entry_names(&h.ctx.batches.archive_path(&job.batch_id).unwrap());
    assert_eq!(names.iter().filter(|n| n.starts_with("png/")).count(), 2);
    assert_eq!(names.iter().filter(|n| n.starts_with("webp/")).count(), 2);
}

#[tokio::test]
async fn partial_failure_still_completes() {
    let h = TestHarness::new();
    let dir = h.sources();
    let good = write_png(&dir, "good.png", 20, 20);
    let bad = write_corrupt(&dir, "bad.png");

    let batch_id = BatchId::new();
    let sources = stage(&h, &batch_id, &[&good, &bad]).await;
    let job = h
        .ctx
        .batches
        .run(BatchRequest::new(sources, ConversionOptions::default()).with_batch_id(batch_id))
        .await;

    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(job.task_ids.len(), 1, "only contributing tasks are recorded");
    let contributor = h.ctx.registry.get(&job.task_ids[0]).unwrap();
    assert_eq!(contributor.status, TaskStatus::Completed);
    assert!(contributor.filename.ends_with("good.png"));

    let failed: Vec<_> = h
        .ctx
        .registry
        .list()
        .into_iter()
        .filter(|t| t.status == TaskStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error.is_some());

    let names = entry_names(&h.ctx.batches.archive_path(&batch_id).unwrap());
    assert_eq!(names.len(), 1);
}

#[tokio::test]
async fn all_failures_fail_the_batch() {
    let h = TestHarness::new();
    let bad = write_corrupt(&h.sources(), "bad.jpg");

    let batch_id = BatchId::new();
    let sources = stage(&h, &batch_id, &[&bad]).await;
    let job = h
        .ctx
        .batches
        .run(BatchRequest::new(sources, ConversionOptions::default()).with_batch_id(batch_id))
        .await;

    assert_eq!(job.status, BatchStatus::Failed);
    assert_eq!(job.error.as_deref(), Some(NO_OUTPUTS_ERROR));
    assert!(job.zip_filename.is_none());
    assert!(h.ctx.batches.archive_path(&batch_id).is_none());
    assert_eq!(std::fs::read_dir(h.upload_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn submitted_batch_publishes_completion() {
    let h = TestHarness::new();
    let mut rx = h.ctx.events.subscribe();
    let src = write_png(&h.sources(), "bg.png", 16, 16);

    let batch_id = BatchId::new();
    let sources = stage(&h, &batch_id, &[&src]).await;
    let submitted = h.ctx.batches.submit(
        BatchRequest::new(sources, ConversionOptions::default())
            .with_batch_id(batch_id)
            .with_session("session-42"),
    );
    assert_eq!(submitted, batch_id);
    assert_matches!(
        h.ctx.batches.get(&batch_id).map(|j| j.status),
        Some(BatchStatus::Processing) | Some(BatchStatus::Completed)
    );

    h.ctx.shutdown().await;

    let mut archive = None;
    while let Ok(event) = rx.try_recv() {
        if let ConversionEvent::BatchCompleted { batch_id: id, archive: name } = event {
            assert_eq!(id, batch_id);
            archive = Some(name);
        }
    }
    assert_eq!(archive, Some(batch_id.archive_name()));

    let record = h.ctx.gateway.read(batch_id).unwrap().unwrap();
    assert_eq!(record.status, BatchStatus::Completed);
    assert_eq!(record.session_id.as_deref(), Some("session-42"));
}

#[tokio::test]
async fn batch_status_survives_a_new_context() {
    let dir = tempfile::tempdir().unwrap();
    let batch_id = BatchId::new();

    {
        let ctx = Context::new(config_in(dir.path())).unwrap();
        let src = write_png(dir.path(), "persist.png", 16, 16);
        let source = ctx.stage_upload(&src, &batch_id).await.unwrap();
        let job = ctx
            .batches
            .run(BatchRequest::new(vec![source], ConversionOptions::default()).with_batch_id(batch_id))
            .await;
        assert_eq!(job.status, BatchStatus::Completed);
        ctx.shutdown().await;
    }

    let ctx = Context::new(config_in(dir.path())).unwrap();
    let job = ctx.batches.get(&batch_id).unwrap();
    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(job.task_ids.len(), 1);
    assert!(ctx.batches.archive_path(&batch_id).is_some());
    assert!(ctx.batches.get(&BatchId::new()).is_none());
}

#[tokio::test]
async fn zip_tasks_bundles_existing_results() {
    let h = TestHarness::new();
    let dir = h.sources();
    let one = write_png(&dir, "one.png", 16, 16);
    let two = write_png(&dir, "two.png", 16, 16);

    let opts = ConversionOptions::default();
    let first = h.ctx.engine.convert(&one, &opts).await.unwrap();
    let second = h.ctx.engine.convert(&two, &opts).await.unwrap();

    let archive = h
        .ctx
        .batches
        .zip_tasks(&[first.id, second.id], FolderStructure::Flat)
        .await
        .unwrap();
    let names = entry_names(&h.ctx.config.paths.archive_dir.join(&archive));
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n.starts_with(&format!("{}_", first.id.short()))));

    let missing = h
        .ctx
        .batches
        .zip_tasks(&[mediaconv_common::TaskId::new()], FolderStructure::Flat)
        .await;
    assert!(missing.is_err());
}
