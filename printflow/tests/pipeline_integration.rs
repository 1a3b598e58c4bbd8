//! End-to-end orchestrator tests over mock backends.

use std::sync::Arc;

use printflow::config::PipelineConfig;
use printflow::errors::{ErrorKind, ValidationError};
use printflow::pipeline::Pipeline;
use printflow::progress::CollectingProgress;
use printflow::request::{ImageRef, ImageStyle, PipelineRequest};
use printflow::result::PipelineStage;
use printflow::testing::fixtures::{cube_stl_bytes, open_box_stl_bytes, write_fixture};
use printflow::testing::mocks::{
    MockImageBackend, MockMeshBackend, MockPrintBackend, PanickingObserver,
};

struct Harness {
    image: Arc<MockImageBackend>,
    mesh: Arc<MockMeshBackend>,
    print: Arc<MockPrintBackend>,
    pipeline: Pipeline,
    _dir: tempfile::TempDir,
}

fn harness(
    make: impl FnOnce(&std::path::Path) -> (MockImageBackend, MockMeshBackend, MockPrintBackend),
) -> Harness {
    printflow::observability::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (image, mesh, print) = make(dir.path());
    let image = Arc::new(image);
    let mesh = Arc::new(mesh);
    let print = Arc::new(print);
    let pipeline = Pipeline::new(
        PipelineConfig::default().with_output_dir(dir.path()),
        image.clone(),
        mesh.clone(),
        print.clone(),
    );
    Harness {
        image,
        mesh,
        print,
        pipeline,
        _dir: dir,
    }
}

fn all_succeeding() -> Harness {
    harness(|dir| {
        (
            MockImageBackend::succeeding(dir),
            MockMeshBackend::succeeding(dir),
            MockPrintBackend::succeeding(),
        )
    })
}

fn stages_of(result: &printflow::result::PipelineResult) -> Vec<PipelineStage> {
    result.stages.iter().map(|s| s.stage).collect()
}

#[tokio::test]
async fn full_run_produces_five_ordered_stages() {
    let harness = all_succeeding();
    let request = PipelineRequest::from_prompt("a cute robot")
        .with_style(ImageStyle::Figurine)
        .with_size_mm(50.0);

    let result = harness.pipeline.run(&request).await.unwrap();

    assert!(result.is_complete());
    assert!(result.error.is_none());
    assert_eq!(
        stages_of(&result),
        vec![
            PipelineStage::ImageGeneration,
            PipelineStage::MeshConversion,
            PipelineStage::MeshValidation,
            PipelineStage::PrintUpload,
            PipelineStage::Pricing,
        ]
    );

    // The quote has at least one material with a positive price.
    let cheapest = result.cheapest_material().unwrap();
    assert!(cheapest.price > 0.0);

    // Artifact references are populated for resumability.
    assert!(result.image_path.is_some());
    assert!(result.mesh_path.is_some());

    // The mesh backend saw the requested physical size.
    assert_eq!(harness.mesh.received_sizes(), vec![50.0]);
}

#[tokio::test]
async fn out_of_range_size_rejected_before_any_backend_call() {
    let harness = all_succeeding();
    let request = PipelineRequest::from_prompt("x").with_size_mm(600.0);

    let err = harness.pipeline.run(&request).await.unwrap_err();

    assert!(matches!(err, ValidationError::SizeOutOfRange { .. }));
    assert_eq!(harness.image.calls(), 0);
    assert_eq!(harness.mesh.calls(), 0);
    assert_eq!(harness.print.upload_calls(), 0);
    assert_eq!(harness.print.pricing_calls(), 0);
}

#[tokio::test]
async fn mesh_failure_leaves_exactly_one_stage_and_terminal_error() {
    let harness = harness(|dir| {
        (
            MockImageBackend::succeeding(dir),
            MockMeshBackend::failing("provider rejected the task"),
            MockPrintBackend::succeeding(),
        )
    });

    let request = PipelineRequest::from_prompt("a cute robot");
    let result = harness.pipeline.run(&request).await.unwrap();

    assert!(!result.is_complete());
    assert_eq!(stages_of(&result), vec![PipelineStage::ImageGeneration]);
    assert!(result.stages[0].is_success());

    let failure = result.error.as_ref().unwrap();
    assert_eq!(failure.stage, PipelineStage::MeshConversion);
    assert_eq!(failure.kind, ErrorKind::Backend);
    assert!(failure.message.contains("provider rejected the task"));

    // Later stages never ran.
    assert_eq!(harness.print.upload_calls(), 0);
    assert_eq!(harness.print.pricing_calls(), 0);
}

#[tokio::test]
async fn validation_issues_do_not_block_upload_and_pricing() {
    let harness = harness(|dir| {
        (
            MockImageBackend::succeeding(dir),
            MockMeshBackend::succeeding_with_mesh(dir, open_box_stl_bytes(10.0)),
            MockPrintBackend::succeeding(),
        )
    });

    let request = PipelineRequest::from_prompt("a cute robot");
    let result = harness.pipeline.run(&request).await.unwrap();

    assert!(result.is_complete());

    let validation = result.stage(PipelineStage::MeshValidation).unwrap();
    assert!(validation.is_success());
    let report = result.validation().unwrap();
    assert!(!report.is_valid);
    assert!(report.issues.iter().any(|i| i.contains("not watertight")));

    assert_eq!(harness.print.upload_calls(), 1);
    assert_eq!(harness.print.pricing_calls(), 1);
}

#[tokio::test]
async fn run_from_mesh_starts_at_validation() {
    let harness = all_succeeding();
    let dir = tempfile::tempdir().unwrap();
    let mesh_path = write_fixture(dir.path(), "existing.stl", &cube_stl_bytes(15.0));

    let result = harness.pipeline.run_from_mesh(&mesh_path).await.unwrap();

    assert!(result.is_complete());
    assert_eq!(
        stages_of(&result),
        vec![
            PipelineStage::MeshValidation,
            PipelineStage::PrintUpload,
            PipelineStage::Pricing,
        ]
    );
    assert_eq!(harness.image.calls(), 0);
    assert_eq!(harness.mesh.calls(), 0);
    assert_eq!(result.mesh_path.as_deref(), Some(mesh_path.as_path()));
}

#[tokio::test]
async fn run_from_image_skips_generation() {
    let harness = all_succeeding();

    let result = harness
        .pipeline
        .run_from_image(ImageRef::from("https://example.com/robot.png"), 80.0)
        .await
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(
        stages_of(&result),
        vec![
            PipelineStage::MeshConversion,
            PipelineStage::MeshValidation,
            PipelineStage::PrintUpload,
            PipelineStage::Pricing,
        ]
    );
    assert_eq!(harness.image.calls(), 0);
    assert_eq!(harness.mesh.received_sizes(), vec![80.0]);
}

#[tokio::test]
async fn mesh_wins_when_request_supplies_mesh_and_prompt() {
    let harness = all_succeeding();
    let dir = tempfile::tempdir().unwrap();
    let mesh_path = write_fixture(dir.path(), "existing.stl", &cube_stl_bytes(15.0));

    let mut request = PipelineRequest::from_prompt("a cute robot");
    request.mesh = Some(mesh_path);

    let result = harness.pipeline.run(&request).await.unwrap();

    assert!(result.is_complete());
    assert_eq!(result.stages[0].stage, PipelineStage::MeshValidation);
    assert_eq!(harness.image.calls(), 0);
}

#[tokio::test]
async fn panicking_observer_does_not_abort_the_run() {
    let harness = all_succeeding();
    let request = PipelineRequest::from_prompt("a cute robot");

    let result = harness
        .pipeline
        .run_with_progress(&request, &PanickingObserver)
        .await
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(result.stages.len(), 5);
}

#[tokio::test]
async fn image_timeout_leaves_zero_stages_with_timeout_kind() {
    let harness = harness(|_dir| {
        (
            MockImageBackend::timing_out(120),
            MockMeshBackend::failing("unreachable"),
            MockPrintBackend::succeeding(),
        )
    });

    let request = PipelineRequest::from_prompt("a cute robot");
    let result = harness.pipeline.run(&request).await.unwrap();

    assert!(!result.is_complete());
    assert!(result.stages.is_empty());

    let failure = result.error.as_ref().unwrap();
    assert_eq!(failure.stage, PipelineStage::ImageGeneration);
    assert_eq!(failure.kind, ErrorKind::Timeout);
    assert_eq!(harness.mesh.calls(), 0);
}

#[tokio::test]
async fn progress_covers_every_stage_and_ends_complete() {
    let harness = all_succeeding();
    let observer = CollectingProgress::new();
    let request = PipelineRequest::from_prompt("a cute robot");

    let result = harness
        .pipeline
        .run_with_progress(&request, &observer)
        .await
        .unwrap();
    assert!(result.is_complete());

    let events = observer.events();
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| (0.0..=1.0).contains(&e.fraction)));

    // Every stage reported at least start and end.
    for stage in [
        PipelineStage::ImageGeneration,
        PipelineStage::MeshConversion,
        PipelineStage::MeshValidation,
        PipelineStage::PrintUpload,
        PipelineStage::Pricing,
    ] {
        assert!(
            observer.events_for(stage).len() >= 2,
            "expected start and end events for {stage}"
        );
    }

    // The mock mesh backend forwards provider polling progress.
    assert!(events.iter().any(|e| e.message.contains("3D conversion: 50%")));

    let last = events.last().unwrap();
    assert_eq!(last.fraction, 1.0);
    assert_eq!(last.message, "Pipeline complete");
}

#[tokio::test]
async fn upload_failure_keeps_validation_data() {
    let harness = harness(|dir| {
        (
            MockImageBackend::succeeding(dir),
            MockMeshBackend::succeeding(dir),
            MockPrintBackend::failing_upload("file rejected"),
        )
    });

    let request = PipelineRequest::from_prompt("a cute robot");
    let result = harness.pipeline.run(&request).await.unwrap();

    assert!(!result.is_complete());
    assert_eq!(
        stages_of(&result),
        vec![
            PipelineStage::ImageGeneration,
            PipelineStage::MeshConversion,
            PipelineStage::MeshValidation,
        ]
    );
    assert_eq!(result.error.as_ref().unwrap().stage, PipelineStage::PrintUpload);
    assert_eq!(harness.print.pricing_calls(), 0);
}

#[tokio::test]
async fn concurrent_runs_share_one_pipeline() {
    let harness = all_succeeding();
    let pipeline = Arc::new(harness.pipeline);

    let a = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            pipeline
                .run(&PipelineRequest::from_prompt("a cute robot"))
                .await
                .unwrap()
        })
    };
    let b = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            pipeline
                .run(&PipelineRequest::from_prompt("a brass compass"))
                .await
                .unwrap()
        })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a.is_complete());
    assert!(b.is_complete());
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(harness.image.calls(), 2);
}

#[tokio::test]
async fn serialized_result_uses_stable_stage_identifiers() {
    let harness = all_succeeding();
    let request = PipelineRequest::from_prompt("a cute robot");

    let result = harness.pipeline.run(&request).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&result.to_json().unwrap()).unwrap();

    let identifiers: Vec<&str> = json["stages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["stage"].as_str().unwrap())
        .collect();
    assert_eq!(
        identifiers,
        vec![
            "image_generation",
            "mesh_conversion",
            "mesh_validation",
            "print_upload",
            "pricing"
        ]
    );
    assert_eq!(json["complete"], true);
}
