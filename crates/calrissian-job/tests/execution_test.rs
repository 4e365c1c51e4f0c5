//! Lifecycle tests against the in-memory cluster.

use std::sync::Arc;
use std::time::Duration;

use calrissian_job::{
    CalrissianContext, CalrissianExecution, CalrissianJob, CwlDocument, JobError, JobParams,
    JobStatus,
};
use calrissian_kube::types::{ConfigMap, Job, JobCondition, JobStatus as K8sJobStatus, ObjectMeta};
use calrissian_kube::{ClusterApi, MockCluster};
use chrono::{TimeZone, Utc};

const WORKFLOW: &str = r#"
cwlVersion: v1.0
class: CommandLineTool
baseCommand: echo
inputs:
  message:
    type: string
    inputBinding: {position: 1}
outputs: []
"#;

fn setup() -> (Arc<MockCluster>, CalrissianContext) {
    let cluster = Arc::new(MockCluster::new());
    cluster.add_namespace("ades");
    let context = CalrissianContext::new(cluster.clone(), "ades");
    (cluster, context)
}

fn job(context: &CalrissianContext, sidecars: bool) -> CalrissianJob {
    CalrissianJob::builder(
        CwlDocument::from_str(WORKFLOW).unwrap(),
        JobParams::from_str("message: hello\n").unwrap(),
        context.clone(),
        "ws-alice",
        "ws-alice",
        "run-1",
    )
    .job_name("job-run-1")
    .output_sidecars(sidecars)
    .build()
    .unwrap()
}

fn active() -> K8sJobStatus {
    K8sJobStatus {
        active: Some(1),
        start_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
        ..Default::default()
    }
}

fn succeeded() -> K8sJobStatus {
    K8sJobStatus {
        succeeded: Some(1),
        start_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
        completion_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 7, 30).unwrap()),
        ..Default::default()
    }
}

fn failed() -> K8sJobStatus {
    K8sJobStatus {
        failed: Some(3),
        start_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
        conditions: Some(vec![JobCondition {
            type_: "Failed".to_string(),
            status: "True".to_string(),
            last_transition_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 3, 0).unwrap()),
            reason: Some("BackoffLimitExceeded".to_string()),
            message: None,
        }]),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_submit_creates_config_maps_then_job() {
    let (cluster, context) = setup();
    cluster.add_config_map(
        "ades",
        ConfigMap::single(
            "workspace-config",
            "ades",
            "pvcs",
            r#"[{"pvcName": "ws-alice-data", "pvName": "pv-alice-data"}]"#,
        ),
    );
    cluster.add_claim("ades", "ws-alice-data");

    let mut execution = CalrissianExecution::new(job(&context, false), context);
    assert!(matches!(
        execution.status().await,
        Err(JobError::NotSubmitted)
    ));

    execution.submit().await.unwrap();
    assert!(execution.is_submitted());

    let calls = cluster.calls();
    let create_job = calls.iter().position(|c| c == "create_job ades/job-run-1").unwrap();
    let params = calls
        .iter()
        .position(|c| c == "create_config_map ades/params-run-1")
        .unwrap();
    assert!(params < create_job);

    let manifest = cluster.job("ades", "job-run-1").unwrap();
    let spec = manifest.spec.unwrap().template.spec;
    let last = spec.volumes.last().unwrap();
    assert_eq!(last.name, "workspace-efs-ws-alice-data");

    let err = execution.submit().await.unwrap_err();
    assert!(matches!(err, JobError::AlreadySubmitted(name) if name == "job-run-1"));
}

#[tokio::test]
async fn test_failed_submit_removes_config_maps() {
    let (cluster, context) = setup();
    let existing = Job {
        metadata: ObjectMeta::named("job-run-1"),
        ..Default::default()
    };
    cluster.create_job("ades", &existing).await.unwrap();

    let mut execution = CalrissianExecution::new(job(&context, false), context);
    let err = execution.submit().await.unwrap_err();
    assert!(matches!(err, JobError::Cluster(ref e) if e.is_conflict()));
    assert!(!execution.is_submitted());

    assert_eq!(cluster.call_count("create_config_map"), 2);
    assert!(cluster.config_map_names("ades").is_empty());
    assert_eq!(cluster.job_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_until_success() {
    let (cluster, context) = setup();
    let mut execution = CalrissianExecution::new(job(&context, false), context);
    execution.submit().await.unwrap();
    cluster.script_job_status(
        "ades",
        "job-run-1",
        vec![K8sJobStatus::default(), active(), active(), succeeded()],
    );

    let status = execution.monitor(Duration::from_secs(5)).await.unwrap();
    assert_eq!(status, JobStatus::Succeeded);
    assert_eq!(cluster.call_count("read_job_status"), 4);

    assert!(execution.is_complete().await.unwrap());
    assert!(execution.is_succeeded().await.unwrap());
    assert_eq!(
        execution.completion_time().await.unwrap(),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 7, 30).unwrap())
    );
    assert_eq!(
        execution.start_time().await.unwrap(),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_monitor_returns_immediately_when_not_active() {
    let (cluster, context) = setup();
    let mut execution = CalrissianExecution::new(job(&context, false), context);
    execution.submit().await.unwrap();
    cluster.script_job_status("ades", "job-run-1", vec![failed()]);

    let status = execution.monitor(Duration::from_secs(3600)).await.unwrap();
    assert_eq!(status, JobStatus::Failed);
    assert_eq!(cluster.call_count("read_job_status"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_timeout() {
    let (cluster, context) = setup();
    let mut execution = CalrissianExecution::new(job(&context, false), context);
    execution.submit().await.unwrap();
    cluster.script_job_status("ades", "job-run-1", vec![active()]);

    let err = execution
        .monitor_with_timeout(Duration::from_secs(5), Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Timeout { secs: 60, .. }));
}

#[tokio::test]
async fn test_completion_time_falls_back_to_condition() {
    let (cluster, context) = setup();
    let mut execution = CalrissianExecution::new(job(&context, false), context);
    execution.submit().await.unwrap();
    cluster.script_job_status("ades", "job-run-1", vec![failed()]);

    assert_eq!(
        execution.completion_time().await.unwrap(),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 3, 0).unwrap())
    );
    assert!(!execution.is_succeeded().await.unwrap());
}

#[tokio::test]
async fn test_log_reads_runner_container_of_first_pod() {
    let (cluster, context) = setup();
    let execution = CalrissianExecution::attach("job-run-1", context);

    let err = execution.log().await.unwrap_err();
    assert!(matches!(err, JobError::PodNotFound(name) if name == "job-run-1"));

    cluster.add_pod("ades", "job-run-1-abcde", &[("job-name", "job-run-1")]);
    cluster.add_pod("ades", "other-pod", &[("job-name", "job-other")]);
    cluster.set_pod_log("job-run-1-abcde", "calrissian", "INFO [workflow] completed success\n");

    let log = execution.log().await.unwrap();
    assert!(log.contains("completed success"));
    assert!(
        cluster
            .calls()
            .contains(&"list_pods ades job-name=job-run-1".to_string())
    );
}

#[tokio::test]
async fn test_output_requires_sidecars() {
    let (cluster, context) = setup();
    let mut execution = CalrissianExecution::new(job(&context, false), context);
    execution.submit().await.unwrap();
    cluster.script_job_status("ades", "job-run-1", vec![succeeded()]);

    assert!(matches!(
        execution.output().await,
        Err(JobError::OutputUnavailable(_))
    ));
}

#[tokio::test]
async fn test_attached_output_without_sidecar_container() {
    let (cluster, context) = setup();
    let mut submitted = CalrissianExecution::new(job(&context, false), context.clone());
    submitted.submit().await.unwrap();
    cluster.add_pod("ades", "job-run-1-abcde", &[("job-name", "job-run-1")]);
    cluster.set_pod_log("job-run-1-abcde", "calrissian", "done\n");
    cluster.script_job_status("ades", "job-run-1", vec![succeeded()]);

    // Attached executions cannot tell the job had no sidecars until the log read.
    let attached = CalrissianExecution::attach("job-run-1", context);
    let err = attached.output().await.unwrap_err();
    assert!(matches!(err, JobError::OutputUnavailable(ref msg) if msg.contains("sidecar-container-output")));
    assert!(matches!(
        attached.usage_report().await,
        Err(JobError::OutputUnavailable(_))
    ));
}

#[tokio::test]
async fn test_output_and_usage_from_sidecars() {
    let (cluster, context) = setup();
    let mut execution = CalrissianExecution::new(job(&context, true), context);
    execution.submit().await.unwrap();
    cluster.add_pod("ades", "job-run-1-xyz", &[("job-name", "job-run-1")]);
    cluster.set_pod_log(
        "job-run-1-xyz",
        "sidecar-container-output",
        r#"{"result": {"class": "Directory", "path": "/calrissian/out"}}"#,
    );
    cluster.set_pod_log(
        "job-run-1-xyz",
        "sidecar-container-usage",
        r#"{"cores_allowed": 16, "children": []}"#,
    );

    cluster.script_job_status("ades", "job-run-1", vec![active()]);
    assert!(matches!(
        execution.usage_report().await,
        Err(JobError::NotComplete { .. })
    ));

    cluster.script_job_status("ades", "job-run-1", vec![succeeded()]);
    let output = execution.output().await.unwrap();
    assert_eq!(output["result"]["class"], "Directory");
    let usage = execution.usage_report().await.unwrap();
    assert_eq!(usage["cores_allowed"], 16);
}

#[tokio::test]
async fn test_dispose_removes_job_and_config_maps() {
    let (cluster, context) = setup();
    let job = CalrissianJob::builder(
        CwlDocument::from_str(WORKFLOW).unwrap(),
        JobParams::new(),
        context.clone(),
        "ws-alice",
        "ws-alice",
        "run-2",
    )
    .job_name("job-run-2")
    .pod_env_vars([("AWS_REGION".to_string(), "eu-west-2".to_string())].into())
    .build()
    .unwrap();

    let mut execution = CalrissianExecution::new(job, context.clone());
    execution.submit().await.unwrap();
    assert_eq!(cluster.config_map_names("ades").len(), 3);

    execution.dispose().await.unwrap();
    assert!(cluster.config_map_names("ades").is_empty());
    assert_eq!(cluster.job_count(), 0);

    // Attached executions without an id only touch the job.
    let attached = CalrissianExecution::attach("job-gone", context);
    attached.dispose().await.unwrap();
    assert_eq!(cluster.call_count("delete_job ades/job-gone"), 1);
    assert_eq!(cluster.call_count("delete_config_map"), 4);
}
