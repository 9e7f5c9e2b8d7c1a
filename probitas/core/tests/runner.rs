use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::future;
use probitas_core::{
    Cleanup, DynError, Reporter, ResourceKey, RetryPolicy, Runner, RunnerConfig,
    ScenarioDefinition, ScenarioError, StepContext, StepFailure, StepOptions, StepReport,
    StepStatus, logging::init_test_tracing, resource_key, scenario,
    scenario::{BoxFuture, ResourceSet, ResultChain},
};
use tokio::time::sleep;

type Events = Arc<Mutex<Vec<&'static str>>>;
type ReadyCleanup = future::Ready<Result<Cleanup, DynError>>;

resource_key!(Base: u32 = "base");

/// Resource whose disposal is observable.
struct Connection;

impl ResourceKey for Connection {
    type Value = Events;

    const NAME: &'static str = "connection";

    fn dispose(value: Arc<Self::Value>) -> BoxFuture<'static, Result<(), DynError>> {
        Box::pin(async move {
            value.lock().unwrap().push("connection");
            Ok(())
        })
    }
}

#[derive(Clone, Default)]
struct Recorder {
    steps: Arc<Mutex<Vec<StepReport>>>,
}

impl Recorder {
    fn statuses(&self) -> Vec<StepStatus> {
        self.steps
            .lock()
            .unwrap()
            .iter()
            .map(|step| step.status.clone())
            .collect()
    }
}

#[async_trait]
impl Reporter for Recorder {
    async fn step_finished(&self, _scenario: &ScenarioDefinition, step: &StepReport) {
        self.steps.lock().unwrap().push(step.clone());
    }
}

fn quick_retries() -> RunnerConfig {
    RunnerConfig {
        retry_base_delay: Duration::from_millis(100),
        retry_max_delay: Duration::from_secs(1),
        ..RunnerConfig::default()
    }
}

/// Pushes its label when dropped.
struct DropRecorder {
    events: Events,
    label: &'static str,
}

impl Drop for DropRecorder {
    fn drop(&mut self) {
        self.events.lock().unwrap().push(self.label);
    }
}

/// Setup function whose cleanup appends `label` to `events`.
fn cleanup_recorder<P, A, R>(
    events: &Events,
    label: &'static str,
) -> impl Fn(StepContext<P, A, R>) -> ReadyCleanup + Send + Sync + 'static
where
    P: Send + Sync + 'static,
    A: ResultChain,
    R: ResourceSet,
{
    let events = Arc::clone(events);
    move |_| {
        let events = Arc::clone(&events);
        future::ready(Ok(Cleanup::from_fn(move || {
            events.lock().unwrap().push(label);
        })))
    }
}

#[tokio::test]
async fn threads_results_resources_and_store() {
    init_test_tracing();
    let seen = Arc::new(Mutex::new(None));

    let definition = scenario("threading")
        .resource(Base, |_| async { Ok(10_u32) })
        .step("double", |ctx| async move { Ok(*ctx.resource(Base) * 2) })
        .anonymous_setup(|ctx| async move {
            ctx.store().insert("doubled", *ctx.previous());
            Ok(())
        })
        .step("sum", |ctx| async move {
            let ((), doubled) = ctx.results();
            let stored = ctx.store().get::<u32>("doubled").map_or(0, |value| *value);
            Ok(**doubled + stored)
        })
        .step("inspect", {
            let seen = Arc::clone(&seen);
            move |ctx| {
                let seen = Arc::clone(&seen);
                async move {
                    let first = ctx.result::<u32>(0).map(|value| *value).ok();
                    *seen.lock().unwrap() = Some((
                        ctx.index(),
                        *ctx.previous(),
                        first,
                        ctx.resources().contains("base"),
                    ));
                    Ok(())
                }
            }
        })
        .build();

    let report = Runner::default().run(&definition).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.steps().len(), 5);
    assert_eq!(*seen.lock().unwrap(), Some((4, 40, Some(20), true)));
}

#[tokio::test(start_paused = true)]
async fn retries_until_an_attempt_succeeds() {
    let calls = Arc::new(AtomicU32::new(0));

    let definition = scenario("flaky")
        .step_with("eventually", StepOptions::new().with_retry(RetryPolicy::linear(3)), {
            let calls = Arc::clone(&calls);
            move |_| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err::<u32, DynError>(format!("attempt {attempt} refused").into())
                    } else {
                        Ok(attempt)
                    }
                }
            }
        })
        .build();

    let report = Runner::new(quick_retries()).run(&definition).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.steps()[0].attempts, 3);
    assert!(report.steps()[0].duration >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_the_last_error() {
    let definition = scenario("hopeless")
        .step_with(
            "never",
            StepOptions::new().with_retry(RetryPolicy::exponential(2)),
            |_| async { Err::<(), DynError>("still down".into()) },
        )
        .build();

    let error = Runner::new(quick_retries())
        .run(&definition)
        .await
        .unwrap_err();

    match error {
        ScenarioError::Step {
            name,
            index,
            attempts,
            source: StepFailure::Error(source),
            ..
        } => {
            assert_eq!((name.as_str(), index, attempts), ("never", 0, 2));
            assert_eq!(source.to_string(), "still down");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn slow_attempts_time_out() {
    let definition = scenario("slow")
        .step_with(
            "sleeps",
            StepOptions::new().with_timeout(Duration::from_millis(50)),
            |_| async {
                sleep(Duration::from_secs(10)).await;
                Ok(())
            },
        )
        .build();

    let error = Runner::default().run(&definition).await.unwrap_err();

    assert!(matches!(
        error.step_failure(),
        Some(StepFailure::Timeout(limit)) if *limit >= Duration::from_millis(50)
    ));
}

#[tokio::test]
async fn panics_become_failures() {
    let definition = scenario("panics")
        .step("explodes", |_| async { Ok(Option::<u8>::None.expect("boom")) })
        .build();

    let error = Runner::default().run(&definition).await.unwrap_err();

    assert!(matches!(
        error.step_failure(),
        Some(StepFailure::Panic(message)) if message == "boom"
    ));
    assert!(error.to_string().contains("`explodes`"));
}

#[tokio::test]
async fn cleanups_unwind_in_reverse_order() {
    let events = Events::default();

    let definition = scenario("teardown")
        .setup("first", cleanup_recorder(&events, "first"))
        .resource(Connection, {
            let events = Arc::clone(&events);
            move |_| future::ready(Ok(Arc::clone(&events)))
        })
        .step("work", |ctx| async move {
            ctx.resource(Connection).lock().unwrap().push("work");
            Ok(())
        })
        .setup("lock", {
            let events = Arc::clone(&events);
            move |_| {
                future::ready(Ok(Cleanup::guard(DropRecorder {
                    events: Arc::clone(&events),
                    label: "lock",
                })))
            }
        })
        .setup("last", cleanup_recorder(&events, "last"))
        .build();

    Runner::default().run(&definition).await.unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        ["work", "last", "lock", "connection", "first"]
    );
}

#[tokio::test]
async fn unbounded_timeouts_survive_slow_environments() {
    let events = Events::default();
    let config = RunnerConfig {
        slow_env: true,
        ..RunnerConfig::default()
    };

    let definition = scenario("unbounded")
        .setup("first", cleanup_recorder(&events, "first"))
        .step_with(
            "patient",
            StepOptions::new().with_timeout(Duration::MAX),
            |_| async { Ok(()) },
        )
        .build();

    let report = Runner::new(config).run(&definition).await.unwrap();

    assert!(report.is_success());
    assert_eq!(*events.lock().unwrap(), ["first"]);
}

#[tokio::test]
async fn failure_skips_the_rest_and_still_cleans_up() {
    let events = Events::default();
    let recorder = Recorder::default();

    let definition = scenario("broken")
        .setup("first", cleanup_recorder(&events, "first"))
        .step("fails", |_| async { Err::<(), DynError>("bad response".into()) })
        .setup("never", cleanup_recorder(&events, "never"))
        .anonymous_step(|_| async { Ok(()) })
        .build();

    let error = Runner::default()
        .with_reporter(recorder.clone())
        .run(&definition)
        .await
        .unwrap_err();

    assert!(matches!(error, ScenarioError::Step { index: 1, .. }));
    assert_eq!(*events.lock().unwrap(), ["first"]);
    assert_eq!(
        recorder.statuses(),
        [
            StepStatus::Passed,
            StepStatus::Failed {
                message: "bad response".to_owned()
            },
            StepStatus::Skipped,
            StepStatus::Skipped,
        ]
    );
}

#[tokio::test]
async fn cleanup_failures_are_aggregated() {
    let events = Events::default();

    let definition = scenario("leaky")
        .setup("first", cleanup_recorder(&events, "first"))
        .setup("socket", |_| async {
            Ok(Cleanup::try_from_fn(|| Err("port still bound".into())))
        })
        .setup("tempdir", |_| async {
            Ok(Cleanup::from_future(|| async { Err::<(), DynError>("directory busy".into()) }))
        })
        .build();

    let error = Runner::default().run(&definition).await.unwrap_err();

    match error {
        ScenarioError::Cleanup(summary) => assert_eq!(
            summary.to_string(),
            "tempdir: directory busy\nsocket: port still bound"
        ),
        other => panic!("expected a cleanup error, got {other}"),
    }
    assert_eq!(*events.lock().unwrap(), ["first"]);
}

#[tokio::test]
async fn step_failure_wins_over_cleanup_failure() {
    let definition = scenario("both")
        .setup("socket", |_| async {
            Ok(Cleanup::try_from_fn(|| Err("port still bound".into())))
        })
        .step("fails", |_| async { Err::<(), DynError>("bad response".into()) })
        .build();

    let error = Runner::default().run(&definition).await.unwrap_err();

    assert!(matches!(error, ScenarioError::Step { ref name, .. } if name == "fails"));
}

#[tokio::test]
async fn cancellation_stops_before_the_next_record() {
    let recorder = Recorder::default();
    let runner = Runner::default().with_reporter(recorder.clone());
    let handle = runner.cancel_handle();

    let definition = scenario("cancelled")
        .step("cancels", move |_| {
            let handle = handle.clone();
            async move {
                handle.cancel();
                Ok(())
            }
        })
        .anonymous_step(|_| async { Ok(()) })
        .build();

    let error = runner.run(&definition).await.unwrap_err();

    assert!(matches!(
        error,
        ScenarioError::Cancelled { ref name, index: 1 } if name == "Execution step 2"
    ));
    assert_eq!(
        recorder.statuses(),
        [StepStatus::Passed, StepStatus::Skipped]
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_abandons_a_running_record() {
    let events = Events::default();
    let runner = Runner::default();
    let handle = runner.cancel_handle();

    let definition = scenario("abandoned")
        .setup("first", cleanup_recorder(&events, "first"))
        .step("waits", |ctx| async move {
            sleep(Duration::from_secs(60)).await;
            Ok(ctx.signal().is_cancelled())
        })
        .build();

    tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        handle.cancel();
    });
    let error = runner.run(&definition).await.unwrap_err();

    assert!(matches!(error, ScenarioError::Cancelled { index: 1, .. }));
    assert_eq!(*events.lock().unwrap(), ["first"]);
}

#[tokio::test]
async fn cancellation_outlives_the_run() {
    let runner = Runner::default();
    runner.cancel_handle().cancel();

    let definition = scenario("after cancel")
        .step("never", |_| async { Ok(()) })
        .build();

    for _ in 0..2 {
        let error = runner.run(&definition).await.unwrap_err();
        assert!(matches!(error, ScenarioError::Cancelled { index: 0, .. }));
    }
}
