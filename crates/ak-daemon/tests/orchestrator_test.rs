use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ak_core::clock::ManualClock;
use ak_core::config::{Cadence, Config, TimingConfig};
use ak_core::tracker::DailyTaskTracker;
use ak_core::types::{CycleResult, Point, Region, RetryConfig, ScreenState};
use ak_daemon::automation::{Automation, AutomationContext};
use ak_daemon::orchestrator::{Capabilities, CycleOrchestrator, OrchestratorSettings};
use ak_harness::{CancelToken, Classify, InputDevice, Recover, Screenshot, TextDetector};
use chrono::{TimeZone, Utc};

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

/// Records inputs; clicks on any point in `fail_at` are not delivered.
#[derive(Default)]
struct ScriptDevice {
    clicks: Mutex<Vec<Point>>,
    swipes: AtomicU32,
    dismisses: AtomicU32,
    fail_at: Vec<Point>,
}

impl ScriptDevice {
    fn failing_at(points: &[Point]) -> Self {
        Self {
            fail_at: points.to_vec(),
            ..Default::default()
        }
    }

    fn clicks(&self) -> Vec<Point> {
        self.clicks.lock().unwrap().clone()
    }
}

impl InputDevice for ScriptDevice {
    fn click(&self, x: i32, y: i32, _post_delay: Duration) -> bool {
        let p = Point::new(x, y);
        self.clicks.lock().unwrap().push(p);
        !self.fail_at.contains(&p)
    }
    fn swipe(&self, _from: Point, _to: Point, _duration: Duration) -> bool {
        self.swipes.fetch_add(1, Ordering::SeqCst);
        true
    }
    fn send_dismiss(&self) -> bool {
        self.dismisses.fetch_add(1, Ordering::SeqCst);
        true
    }
    fn capture(&self) -> Option<Screenshot> {
        None
    }
}

/// Shows the login prompt when `prompt` is set; the loading banner never.
struct PromptDetector {
    prompt: bool,
}

impl TextDetector for PromptDetector {
    fn detect_position(&self, keywords: &[String], _region: Region) -> Option<Point> {
        (self.prompt && keywords.iter().any(|k| k == "Character Login")).then(|| Point::new(640, 240))
    }
}

struct AlwaysHome;

impl Classify for AlwaysHome {
    fn classify(&self) -> ScreenState {
        ScreenState::HomeVillage
    }
}

#[derive(Default)]
struct CountingRecovery {
    calls: AtomicU32,
}

impl Recover for CountingRecovery {
    fn return_to_target(&self, _max_attempts: u32) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

enum Behaviour {
    Succeed,
    FailFor(u32),
    PanicFor(u32),
    StopDuring(u32),
}

/// Logs `(name, entity)` for every run into a shared journal.
struct FakeTask {
    name: &'static str,
    cadence: Cadence,
    behaviour: Behaviour,
    journal: Arc<Mutex<Vec<(String, u32)>>>,
}

impl Automation for FakeTask {
    fn name(&self) -> &str {
        self.name
    }
    fn cadence(&self) -> Cadence {
        self.cadence
    }
    fn run(&self, ctx: &AutomationContext<'_>) -> bool {
        self.journal.lock().unwrap().push((self.name.to_string(), ctx.entity));
        match self.behaviour {
            Behaviour::Succeed => true,
            Behaviour::FailFor(e) => ctx.entity != e,
            Behaviour::PanicFor(e) if ctx.entity == e => panic!("automation blew up"),
            Behaviour::PanicFor(_) => true,
            Behaviour::StopDuring(e) => {
                if ctx.entity == e {
                    ctx.cancel.request_stop();
                    false
                } else {
                    true
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Rig {
    device: Arc<ScriptDevice>,
    recovery: Arc<CountingRecovery>,
    journal: Arc<Mutex<Vec<(String, u32)>>>,
    cancel: CancelToken,
    orchestrator: CycleOrchestrator,
    _dir: tempfile::TempDir,
}

impl Rig {
    fn recoveries(&self) -> u32 {
        self.recovery.calls.load(Ordering::SeqCst)
    }

    fn runs_of(&self, name: &str) -> Vec<u32> {
        self.journal
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, e)| *e)
            .collect()
    }
}

fn settings(max_retries: u32) -> OrchestratorSettings {
    let mut settings = OrchestratorSettings::from_config(&Config::default());
    settings.timing = TimingConfig::instant();
    settings.retry = RetryConfig::new(max_retries, true, Duration::ZERO);
    settings
}

fn rig(device: ScriptDevice, prompt: bool, tasks: Vec<(&'static str, Cadence, Behaviour)>) -> Rig {
    let dir = tempfile::tempdir().expect("temp dir");
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 4, 10, 12, 0, 0).unwrap()));
    let tracker = DailyTaskTracker::with_clock(dir.path().join("main_daily_tasks.json"), clock);

    let device = Arc::new(device);
    let recovery = Arc::new(CountingRecovery::default());
    let journal = Arc::new(Mutex::new(Vec::new()));
    let cancel = CancelToken::new();

    let automations: Vec<Box<dyn Automation>> = tasks
        .into_iter()
        .map(|(name, cadence, behaviour)| {
            Box::new(FakeTask {
                name,
                cadence,
                behaviour,
                journal: journal.clone(),
            }) as Box<dyn Automation>
        })
        .collect();

    let caps = Capabilities {
        device: device.clone(),
        detector: Arc::new(PromptDetector { prompt }),
        classifier: Arc::new(AlwaysHome),
        recovery: recovery.clone(),
    };
    let orchestrator = CycleOrchestrator::new(caps, settings(2), tracker, automations, cancel.clone());

    Rig {
        device,
        recovery,
        journal,
        cancel,
        orchestrator,
        _dir: dir,
    }
}

fn standard_tasks() -> Vec<(&'static str, Cadence, Behaviour)> {
    vec![
        ("donation", Cadence::EveryCycle, Behaviour::Succeed),
        ("build", Cadence::Daily, Behaviour::Succeed),
        ("expedition", Cadence::Daily, Behaviour::Succeed),
    ]
}

/// Slot of entity 1 on the default character grid.
fn slot_of(entity: u32) -> Point {
    Config::default().character_grid.locate(entity).1
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn failing_entity_is_isolated_and_recovered_three_times() {
    let mut rig = rig(ScriptDevice::failing_at(&[slot_of(1)]), false, standard_tasks());
    let result = rig.orchestrator.run_all(3, 0, false);
    assert_eq!(
        result,
        CycleResult {
            successful_count: 2,
            failed_entities: vec![1],
            stopped_early: false,
        }
    );
    // two retries plus one bulkhead call, all from entity 1
    assert_eq!(rig.recoveries(), 3);
    assert_eq!(rig.runs_of("build"), [0, 2]);
}

#[test]
fn stop_before_start_processes_nothing() {
    let mut rig = rig(ScriptDevice::default(), false, standard_tasks());
    rig.orchestrator.request_stop();
    let result = rig.orchestrator.run_all(4, 0, false);
    assert_eq!(
        result,
        CycleResult {
            successful_count: 0,
            failed_entities: vec![],
            stopped_early: true,
        }
    );
    assert!(rig.device.clicks().is_empty());
    assert_eq!(rig.recoveries(), 0);
}

#[test]
fn entities_are_visited_in_increasing_order_from_start_index() {
    let mut rig = rig(ScriptDevice::default(), false, standard_tasks());
    let result = rig.orchestrator.run_all(5, 2, false);
    assert_eq!(result.successful_count, 3);
    assert!(result.is_clean());
    assert_eq!(rig.runs_of("donation"), [2, 3, 4]);
}

#[test]
fn start_index_at_count_is_an_empty_run() {
    let mut rig = rig(ScriptDevice::default(), false, standard_tasks());
    let result = rig.orchestrator.run_all(3, 3, false);
    assert_eq!(result, CycleResult::default());
    assert!(rig.device.clicks().is_empty());
}

#[test]
fn daily_tasks_run_before_every_cycle_tasks() {
    let mut rig = rig(ScriptDevice::default(), false, standard_tasks());
    rig.orchestrator.run_all(1, 0, false);
    let order: Vec<String> = rig.journal.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
    assert_eq!(order, ["build", "expedition", "donation"]);
}

#[test]
fn daily_tasks_are_skipped_once_done_today() {
    let mut rig = rig(ScriptDevice::default(), false, standard_tasks());
    rig.orchestrator.run_all(2, 0, false);
    assert!(rig.orchestrator.tracker().is_task_completed_today(1, "build"));

    rig.orchestrator.run_all(2, 0, false);
    assert_eq!(rig.runs_of("build"), [0, 1]);
    assert_eq!(rig.runs_of("donation"), [0, 1, 0, 1]);
}

#[test]
fn force_bypasses_the_tracker_for_every_entity() {
    let mut rig = rig(ScriptDevice::default(), false, standard_tasks());
    rig.orchestrator.run_all(3, 0, false);
    let result = rig.orchestrator.run_all(3, 0, true);
    assert_eq!(result.successful_count, 3);
    assert_eq!(rig.runs_of("build"), [0, 1, 2, 0, 1, 2]);
    assert_eq!(rig.runs_of("expedition"), [0, 1, 2, 0, 1, 2]);
}

#[test]
fn failed_daily_task_is_left_unmarked_and_donation_still_runs() {
    let tasks = vec![
        ("build", Cadence::Daily, Behaviour::FailFor(0)),
        ("expedition", Cadence::Daily, Behaviour::Succeed),
        ("donation", Cadence::EveryCycle, Behaviour::Succeed),
    ];
    let mut rig = rig(ScriptDevice::default(), false, tasks);
    let result = rig.orchestrator.run_all(2, 0, false);
    assert_eq!(
        result,
        CycleResult {
            successful_count: 2,
            failed_entities: vec![],
            stopped_early: false,
        }
    );
    assert!(!rig.orchestrator.tracker().is_task_completed_today(0, "build"));
    assert!(rig.orchestrator.tracker().is_task_completed_today(0, "expedition"));
    assert!(rig.orchestrator.tracker().is_task_completed_today(1, "build"));
    assert_eq!(rig.runs_of("build"), [0, 1]);
    assert_eq!(rig.runs_of("donation"), [0, 1]);
    assert_eq!(rig.recoveries(), 0);

    // The unmarked build is attempted again on the next cycle.
    rig.orchestrator.run_all(2, 0, false);
    assert_eq!(rig.runs_of("build"), [0, 1, 0]);
    assert_eq!(rig.runs_of("expedition"), [0, 1]);
}

#[test]
fn failed_every_cycle_task_fails_the_entity() {
    let tasks = vec![
        ("build", Cadence::Daily, Behaviour::Succeed),
        ("donation", Cadence::EveryCycle, Behaviour::FailFor(0)),
    ];
    let mut rig = rig(ScriptDevice::default(), false, tasks);
    let result = rig.orchestrator.run_all(2, 0, false);
    assert_eq!(result.failed_entities, [0]);
    assert_eq!(result.successful_count, 1);
    // build was marked on the first attempt, so the retries skip it
    assert_eq!(rig.runs_of("build"), [0, 1]);
    assert_eq!(rig.runs_of("donation"), [0, 0, 0, 1]);
    assert_eq!(rig.recoveries(), 3);
}

#[test]
fn stop_mid_entity_counts_neither_success_nor_failure() {
    let tasks = vec![("build", Cadence::Daily, Behaviour::StopDuring(1))];
    let mut rig = rig(ScriptDevice::default(), false, tasks);
    let result = rig.orchestrator.run_all(3, 0, false);
    assert_eq!(
        result,
        CycleResult {
            successful_count: 1,
            failed_entities: vec![],
            stopped_early: true,
        }
    );
    assert_eq!(rig.recoveries(), 0);
    assert!(rig.cancel.is_cancelled());
}

#[test]
fn panicking_entity_does_not_abort_the_run() {
    let tasks = vec![("build", Cadence::Daily, Behaviour::PanicFor(0))];
    let mut rig = rig(ScriptDevice::default(), false, tasks);
    let result = rig.orchestrator.run_all(2, 0, false);
    assert_eq!(result.failed_entities, [0]);
    assert_eq!(result.successful_count, 1);
    assert_eq!(rig.recoveries(), 1);
}

#[test]
fn prompt_is_confirmed_with_the_yes_button() {
    let mut rig = rig(ScriptDevice::default(), true, vec![]);
    rig.orchestrator.run_all(1, 0, false);
    let nav = Config::default().navigation;
    assert_eq!(
        rig.device.clicks(),
        [nav.avatar_icon, nav.settings_icon, nav.characters_icon, slot_of(0), nav.yes_button]
    );
    assert_eq!(rig.device.dismisses.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_prompt_dismisses_three_times() {
    let mut rig = rig(ScriptDevice::default(), false, vec![]);
    rig.orchestrator.run_all(1, 0, false);
    assert_eq!(rig.device.dismisses.load(Ordering::SeqCst), 3);
}

#[test]
fn later_pages_are_scrolled_to() {
    let mut rig = rig(ScriptDevice::default(), false, vec![]);
    let result = rig.orchestrator.run_all(14, 13, false);
    assert_eq!(result.successful_count, 1);
    assert_eq!(rig.device.swipes.load(Ordering::SeqCst), 2);
    assert_eq!(rig.device.clicks().last().copied(), Some(slot_of(13)));
}
