//! Scan worker pool
//!
//! A fixed number of tokio tasks drain a shared job queue. Each job lists one
//! resource type and evaluates every object; the per-job result travels back
//! over a channel to the cycle function, the only place counters are merged.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use check_conditions_core::{
    ConditionFilter, ConditionPaths, Disagreement, ReportLine, ResourceTypeDescriptor,
    evaluate_object,
};

use crate::access::ClusterAccess;
use crate::aggregate::CycleReport;
use crate::enumerator::{ScanJob, enumerate};
use crate::error::Result;
use crate::sink::ReportSink;

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 10;

/// Result of scanning one resource type
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub descriptor: ResourceTypeDescriptor,
    pub worker_id: usize,
    pub objects_scanned: u64,
    pub conditions_scanned: u64,
    pub lines: Vec<ReportLine>,
    pub disagreements: Vec<Disagreement>,
    /// Set when listing failed; the job is abandoned, the cycle is not
    pub error: Option<String>,
}

impl JobOutput {
    pub fn new(descriptor: ResourceTypeDescriptor, worker_id: usize) -> Self {
        Self {
            descriptor,
            worker_id,
            objects_scanned: 0,
            conditions_scanned: 0,
            lines: Vec::new(),
            disagreements: Vec::new(),
            error: None,
        }
    }
}

/// What every worker needs, shared for the duration of one cycle
#[derive(Clone)]
pub struct ScanContext {
    pub access: Arc<dyn ClusterAccess>,
    pub filter: ConditionFilter,
    pub paths: Arc<ConditionPaths>,
    pub namespace: Option<String>,
}

/// List one resource type and evaluate its objects
pub async fn scan_job(ctx: &ScanContext, job: ScanJob, worker_id: usize) -> JobOutput {
    let descriptor = job.descriptor;
    let mut output = JobOutput::new(descriptor.clone(), worker_id);

    let objects = match ctx
        .access
        .list_objects(&descriptor, ctx.namespace.as_deref())
        .await
    {
        Ok(objects) => objects,
        Err(e) => {
            tracing::warn!(
                group = %descriptor.group,
                version = %descriptor.version,
                resource = %descriptor.name,
                error = %e,
                "failed to list resource type"
            );
            output.error = Some(format!("listing {}: {}", descriptor, e));
            return output;
        }
    };

    for object in &objects {
        output.objects_scanned += 1;
        let report = evaluate_object(&descriptor, object, &ctx.filter, &ctx.paths);
        for malformed in &report.malformed {
            tracing::warn!(
                resource = %descriptor.name,
                namespace = %object.namespace,
                name = %object.name,
                "skipping malformed condition: {}",
                malformed
            );
        }
        output.conditions_scanned += report.conditions_scanned;
        output.lines.extend(report.lines);
        output.disagreements.extend(report.disagreements);
    }

    tracing::debug!(
        worker_id,
        resource = %descriptor.name,
        group = %descriptor.group,
        version = %descriptor.version,
        objects = output.objects_scanned,
        "checked resource type"
    );
    output
}

/// Spawn `workers` tasks over `jobs`; results arrive on the returned receiver
pub fn spawn_workers(
    ctx: Arc<ScanContext>,
    jobs: Vec<ScanJob>,
    workers: usize,
) -> (JoinSet<()>, mpsc::Receiver<JobOutput>) {
    let workers = workers.max(1);

    let (job_tx, job_rx) = mpsc::channel(jobs.len().max(1));
    for job in jobs {
        // Capacity equals the job count, so this never waits.
        if job_tx.try_send(job).is_err() {
            break;
        }
    }
    drop(job_tx);

    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, result_rx) = mpsc::channel(workers * 2);

    let mut set = JoinSet::new();
    for worker_id in 0..workers {
        let ctx = ctx.clone();
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        set.spawn(async move {
            loop {
                let job = job_rx.lock().await.recv().await;
                let Some(job) = job else { break };
                let output = scan_job(&ctx, job, worker_id).await;
                if result_tx.send(output).await.is_err() {
                    break;
                }
            }
        });
    }
    (set, result_rx)
}

/// Runs scan cycles against one cluster
#[derive(Clone)]
pub struct Scanner {
    access: Arc<dyn ClusterAccess>,
    workers: usize,
    namespace: Option<String>,
    timeout: Option<Duration>,
}

impl Scanner {
    pub fn new(access: Arc<dyn ClusterAccess>) -> Self {
        Self {
            access,
            workers: DEFAULT_WORKERS,
            namespace: None,
            timeout: None,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Bound each cycle; outstanding list calls are aborted when it expires
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Scan every resource type once.
    ///
    /// Lines and diagnostics are written to `sink` as they arrive; the summary
    /// line is written last. The reported duration is measured from `started`.
    pub async fn run_cycle(
        &self,
        filter: &ConditionFilter,
        paths: &Arc<ConditionPaths>,
        started: Instant,
        sink: &mut dyn ReportSink,
    ) -> Result<CycleReport> {
        let deadline = self.timeout.map(|t| tokio::time::Instant::now() + t);
        let mut report = CycleReport::default();

        let enumeration = enumerate(self.access.as_ref(), self.namespace.as_deref());
        let jobs = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, enumeration).await {
                Ok(jobs) => jobs?,
                Err(_) => {
                    tracing::warn!("cycle timed out during resource discovery");
                    report.timed_out = true;
                    Vec::new()
                }
            },
            None => enumeration.await?,
        };

        let ctx = Arc::new(ScanContext {
            access: self.access.clone(),
            filter: filter.clone(),
            paths: paths.clone(),
            namespace: self.namespace.clone(),
        });
        let (mut workers, mut results) = spawn_workers(ctx, jobs, self.workers);

        loop {
            let next = match deadline {
                Some(deadline) => tokio::select! {
                    output = results.recv() => output,
                    _ = tokio::time::sleep_until(deadline) => {
                        tracing::warn!(
                            completed = report.counters.resource_types_scanned,
                            "cycle timed out, aborting outstanding list calls"
                        );
                        report.timed_out = true;
                        None
                    }
                },
                None => results.recv().await,
            };
            let Some(output) = next else { break };
            report.absorb(output, sink)?;
        }

        if report.timed_out {
            workers.shutdown().await;
        } else {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "scan worker failed");
                }
            }
        }

        report.duration = started.elapsed();
        sink.line(&report.summary())?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClusterAccess;
    use crate::sink::MemorySink;
    use check_conditions_core::{LegacyRuleSet, Mode, RuleSet};
    use serde_json::{Value, json};

    fn pods() -> ResourceTypeDescriptor {
        ResourceTypeDescriptor::new("", "v1", "pods", "Pod", true)
    }

    fn pod(name: &str, conditions: Value) -> Value {
        json!({
            "metadata": {"name": name, "namespace": "default"},
            "status": {"conditions": conditions}
        })
    }

    fn filter() -> ConditionFilter {
        ConditionFilter::new(
            Mode::OnlyLegacy,
            Arc::new(LegacyRuleSet::builtin().unwrap()),
            Arc::new(RuleSet::new()),
        )
    }

    fn paths() -> Arc<ConditionPaths> {
        Arc::new(ConditionPaths::builtin().unwrap())
    }

    fn three_pods() -> MockClusterAccess {
        MockClusterAccess::new().with_type(
            pods(),
            vec![
                pod("a", json!([{"type": "Ready", "status": "True"}])),
                pod(
                    "b",
                    json!([{"type": "Ready", "status": "False", "reason": "PodCompleted"}]),
                ),
                pod(
                    "c",
                    json!([{"type": "Ready", "status": "False", "reason": "CrashLoop", "message": "boom"}]),
                ),
            ],
        )
    }

    #[tokio::test]
    async fn test_end_to_end_cycle() {
        let scanner = Scanner::new(Arc::new(three_pods()));
        let mut sink = MemorySink::new();

        let report = scanner
            .run_cycle(&filter(), &paths(), Instant::now(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.lines.len(), 1);
        assert!(report.lines[0].starts_with(
            r#"  default pods c Condition Ready=False CrashLoop "boom" ("#
        ));
        assert_eq!(report.counters.objects_scanned, 3);
        assert_eq!(report.counters.conditions_scanned, 3);
        assert_eq!(report.counters.resource_types_scanned, 1);
        assert!(report.counters.reported_any);
        assert!(!report.timed_out);

        assert_eq!(sink.lines.len(), 2);
        assert!(sink.lines[1].starts_with("Checked 3 conditions of 3 resources of 1 types. Duration: "));
    }

    #[tokio::test]
    async fn test_list_error_abandons_only_that_job() {
        let secrets = ResourceTypeDescriptor::new("", "v1", "secrets", "Secret", true);
        let mock = three_pods().with_failing_type(secrets);
        let scanner = Scanner::new(Arc::new(mock)).workers(3);

        let report = scanner
            .run_cycle(&filter(), &paths(), Instant::now(), &mut MemorySink::new())
            .await
            .unwrap();

        assert_eq!(report.counters.resource_types_scanned, 2);
        assert_eq!(report.counters.objects_scanned, 3);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("secrets"));
        assert_eq!(report.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_many_types_with_few_workers() {
        let mut mock = MockClusterAccess::new();
        for i in 0..25 {
            mock = mock.with_type(
                ResourceTypeDescriptor::new("example.com", "v1", &format!("widgets{i}"), "Widget", true),
                vec![pod("w", json!([{"type": "Degraded", "status": "True"}]))],
            );
        }
        let access = Arc::new(mock);
        let scanner = Scanner::new(access.clone()).workers(4);

        let report = scanner
            .run_cycle(&filter(), &paths(), Instant::now(), &mut MemorySink::new())
            .await
            .unwrap();

        assert_eq!(report.counters.resource_types_scanned, 25);
        assert_eq!(report.counters.conditions_scanned, 25);
        assert_eq!(report.lines.len(), 25);
        assert_eq!(access.operation_counts().lists, 25);
    }

    #[tokio::test]
    async fn test_timeout_summarizes_completed_jobs() {
        let mock = three_pods().with_list_delay(Duration::from_secs(5));
        let scanner = Scanner::new(Arc::new(mock)).timeout(Some(Duration::from_millis(50)));
        let mut sink = MemorySink::new();

        let report = scanner
            .run_cycle(&filter(), &paths(), Instant::now(), &mut sink)
            .await
            .unwrap();

        assert!(report.timed_out);
        assert_eq!(report.counters.resource_types_scanned, 0);
        assert_eq!(sink.lines.len(), 1);
        assert!(sink.lines[0].starts_with("Checked 0 conditions"));
    }

    #[tokio::test]
    async fn test_namespace_filter() {
        let nodes = ResourceTypeDescriptor::new("", "v1", "nodes", "Node", false);
        let mock = three_pods().with_type(
            nodes,
            vec![json!({"metadata": {"name": "n1"}, "status": {"conditions": [
                {"type": "KernelDeadlock", "status": "True"}
            ]}})],
        );
        let scanner = Scanner::new(Arc::new(mock)).namespace(Some("default".to_string()));

        let report = scanner
            .run_cycle(&filter(), &paths(), Instant::now(), &mut MemorySink::new())
            .await
            .unwrap();

        assert_eq!(report.counters.resource_types_scanned, 1);
        assert_eq!(report.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_discovery_failure_is_an_error() {
        let mock = MockClusterAccess::new();
        mock.set_discovery_error(Some("unreachable"));
        let scanner = Scanner::new(Arc::new(mock));

        let result = scanner
            .run_cycle(&filter(), &paths(), Instant::now(), &mut MemorySink::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_disagreements_go_to_diagnostics() {
        let filter = ConditionFilter::new(
            Mode::LegacyDecidesCompareConfig,
            Arc::new(LegacyRuleSet::builtin().unwrap()),
            Arc::new(RuleSet::new()),
        );
        let mock = MockClusterAccess::new().with_type(
            pods(),
            vec![pod("a", json!([{"type": "PodScheduled", "status": "True"}]))],
        );
        let mut sink = MemorySink::new();

        let report = Scanner::new(Arc::new(mock))
            .run_cycle(&filter, &paths(), Instant::now(), &mut sink)
            .await
            .unwrap();

        assert!(report.lines.is_empty());
        assert_eq!(sink.diagnostics.len(), 1);
        assert!(sink.diagnostics[0].starts_with("WARNING: legacy and config disagree on group= resource=pods type=PodScheduled status=True"));
    }
}
