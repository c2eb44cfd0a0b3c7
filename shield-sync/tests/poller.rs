mod support;

use std::time::Duration;

use shield_sync::model::{ScanJob, ScanStatus};
use shield_sync::poller::{PollEvent, PollUpdates, PollerError, PollerSettings, ScanPoller};
use support::{ScriptedScanApi, completed_with, job, sqli, unavailable};
use tokio::time::sleep;

const INTERVAL: Duration = Duration::from_millis(2_000);

fn settings() -> PollerSettings {
    PollerSettings { interval: INTERVAL }
}

async fn drain(updates: &mut PollUpdates) -> Vec<PollEvent> {
    let mut events = Vec::new();
    while let Some(event) = updates.next().await {
        events.push(event);
    }
    events
}

fn describe(events: &[PollEvent]) -> Vec<(u64, &'static str)> {
    events
        .iter()
        .map(|event| {
            let label = match event {
                PollEvent::Snapshot { job, .. } => job.status.as_str(),
                PollEvent::FetchFailed { .. } => "error",
            };
            (event.seq(), label)
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn tracks_job_until_completed() {
    let api = ScriptedScanApi::new();
    api.respond(Ok(job("abc123", ScanStatus::Queued)))
        .respond(Ok(job("abc123", ScanStatus::Running)))
        .respond(Ok(completed_with("abc123", vec![sqli()])));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let mut updates = poller.start("abc123").unwrap();

    let events = drain(&mut updates).await;
    assert_eq!(
        describe(&events),
        vec![(1, "queued"), (2, "running"), (3, "completed")]
    );

    sleep(INTERVAL * 5).await;
    assert_eq!(api.fetches(), 3);
    assert!(!poller.is_running());

    let latest = poller.latest().expect("latest snapshot");
    assert_eq!(latest.status, ScanStatus::Completed);
    assert_eq!(latest.findings.len(), 1);
    assert_eq!(latest.findings[0].title, "SQLi");
}

#[tokio::test(start_paused = true)]
async fn failed_status_is_terminal_too() {
    let api = ScriptedScanApi::new();
    api.respond(Ok(job("j1", ScanStatus::Running)))
        .respond(Ok(job("j1", ScanStatus::Failed)));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let mut updates = poller.start("j1").unwrap();

    let events = drain(&mut updates).await;
    assert_eq!(describe(&events), vec![(1, "running"), (2, "failed")]);

    sleep(INTERVAL * 5).await;
    assert_eq!(api.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn keeps_polling_across_failures() {
    let api = ScriptedScanApi::new();
    api.respond(Err(unavailable()))
        .respond(Ok(job("j1", ScanStatus::Running)))
        .respond(Err(unavailable()))
        .respond(Err(unavailable()))
        .respond(Ok(completed_with("j1", Vec::new())));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let mut updates = poller.start("j1").unwrap();

    let events = drain(&mut updates).await;
    assert_eq!(
        describe(&events),
        vec![
            (1, "error"),
            (2, "running"),
            (3, "error"),
            (4, "error"),
            (5, "completed"),
        ]
    );
    assert_eq!(api.fetches(), 5);
    assert_eq!(poller.latest().map(|j| j.status), Some(ScanStatus::Completed));
}

#[tokio::test(start_paused = true)]
async fn failures_do_not_replace_the_latest_snapshot() {
    let api = ScriptedScanApi::new();
    api.respond(Ok(job("j1", ScanStatus::Running)))
        .respond(Err(unavailable()));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let _updates = poller.start("j1").unwrap();

    sleep(INTERVAL + Duration::from_millis(500)).await;
    assert_eq!(api.fetches(), 2);
    assert_eq!(poller.latest().map(|j| j.status), Some(ScanStatus::Running));
    assert!(poller.is_running());
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_leaves_no_timer() {
    let api = ScriptedScanApi::new();
    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();

    poller.stop();
    poller.stop();

    let mut updates = poller.start("j1").unwrap();
    sleep(INTERVAL * 2 + Duration::from_millis(500)).await;
    assert_eq!(api.fetches(), 3);

    poller.stop();
    poller.stop();
    poller.stop();
    assert!(!poller.is_running());

    sleep(INTERVAL * 10).await;
    assert_eq!(api.fetches(), 3);

    let events = drain(&mut updates).await;
    assert_eq!(events.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn late_response_after_stop_is_discarded() {
    let api = ScriptedScanApi::new();
    api.respond_after(
        Duration::from_secs(5),
        Ok(completed_with("j1", vec![sqli()])),
    );

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let mut updates = poller.start("j1").unwrap();

    sleep(Duration::from_secs(1)).await;
    poller.stop();

    let mut watcher = poller.watch();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(api.fetches(), 1);
    assert!(poller.latest().is_none());
    assert!(!watcher.has_changed().unwrap());
    assert!(drain(&mut updates).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn out_of_order_responses_keep_the_newest_snapshot() {
    let api = ScriptedScanApi::new();
    // Tick 1 answers after tick 2.
    api.respond_after(Duration::from_secs(3), Ok(job("j1", ScanStatus::Queued)))
        .respond(Ok(job("j1", ScanStatus::Running)));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let mut updates = poller.start("j1").unwrap();

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(api.fetches(), 2);
    assert_eq!(poller.latest().map(|j| j.status), Some(ScanStatus::Running));

    poller.stop();
    let events = drain(&mut updates).await;
    assert_eq!(describe(&events), vec![(2, "running")]);
}

#[tokio::test(start_paused = true)]
async fn slow_fetches_do_not_delay_the_cadence() {
    let api = ScriptedScanApi::new();
    api.respond_after(Duration::from_secs(7), Ok(job("j1", ScanStatus::Running)));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let _updates = poller.start("j1").unwrap();

    sleep(Duration::from_millis(4_500)).await;
    assert_eq!(api.fetches(), 3);
    assert_eq!(poller.fetches_issued(), 3);
}

#[tokio::test(start_paused = true)]
async fn restarting_switches_jobs() {
    let api = ScriptedScanApi::new();
    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();

    let mut first = poller.start("job-a").unwrap();
    sleep(Duration::from_millis(500)).await;

    let _second = poller.start("job-b").unwrap();
    assert_eq!(poller.job_id(), Some("job-b"));
    assert_eq!(drain(&mut first).await.len(), 1);

    sleep(INTERVAL + Duration::from_millis(500)).await;
    assert_eq!(api.requested_ids(), vec!["job-a", "job-b", "job-b"]);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_poller_stops_polling() {
    let api = ScriptedScanApi::new();
    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let mut updates = poller.start("j1").unwrap();

    sleep(Duration::from_millis(500)).await;
    drop(poller);

    sleep(INTERVAL * 5).await;
    assert_eq!(api.fetches(), 1);
    assert_eq!(drain(&mut updates).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejects_invalid_input() {
    let api = ScriptedScanApi::new();

    let zero = ScanPoller::new(
        api.clone(),
        PollerSettings {
            interval: Duration::ZERO,
        },
    );
    assert!(matches!(zero, Err(PollerError::ZeroInterval)));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    assert!(matches!(poller.start(""), Err(PollerError::EmptyJobId)));
    assert!(matches!(poller.start("   "), Err(PollerError::EmptyJobId)));
    assert!(!poller.is_running());
    assert_eq!(api.fetches(), 0);
}

fn without_target(id: &str, status: ScanStatus) -> ScanJob {
    ScanJob::new(id, "", status, Vec::new())
}

#[tokio::test(start_paused = true)]
async fn snapshots_keep_the_target_given_at_start() {
    let api = ScriptedScanApi::new();
    api.respond(Ok(without_target("j1", ScanStatus::Running)))
        .respond(Ok(without_target("j1", ScanStatus::Completed)));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let mut updates = poller.start_with_target("j1", "shop.example.com").unwrap();

    let events = drain(&mut updates).await;
    let targets: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            PollEvent::Snapshot { job, .. } => Some(job.target.as_str()),
            PollEvent::FetchFailed { .. } => None,
        })
        .collect();
    assert_eq!(targets, vec!["shop.example.com", "shop.example.com"]);
    assert_eq!(poller.latest().unwrap().target, "shop.example.com");
}

#[tokio::test(start_paused = true)]
async fn target_learned_from_a_snapshot_is_carried_forward() {
    let api = ScriptedScanApi::new();
    api.respond(Ok(job("j1", ScanStatus::Queued)))
        .respond(Ok(without_target("j1", ScanStatus::Running)))
        .respond(Ok(without_target("j1", ScanStatus::Completed)));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    let mut updates = poller.start("j1").unwrap();
    drain(&mut updates).await;

    let latest = poller.latest().unwrap();
    assert_eq!(latest.status, ScanStatus::Completed);
    assert_eq!(latest.target, "example.com");
}

#[tokio::test(start_paused = true)]
async fn restart_forgets_the_previous_target() {
    let api = ScriptedScanApi::new();
    api.respond(Ok(job("j1", ScanStatus::Completed)))
        .respond(Ok(without_target("j2", ScanStatus::Completed)));

    let mut poller = ScanPoller::new(api.clone(), settings()).unwrap();
    drain(&mut poller.start("j1").unwrap()).await;
    drain(&mut poller.start("j2").unwrap()).await;

    assert_eq!(poller.latest().unwrap().target, "");
}
