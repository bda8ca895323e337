mod support;

use abele_core::{AbeleConfig, Entity, Log, Task, VaultHost};
use support::{memory_context, ymd};

const SHIP_V1: &str = "---\ntype: task\ndue: 2024-01-10\n---\nShip it\n";
const SHIP_V2: &str = "---\ntype: task\ndue: 2024-01-11\n---\nShip it\n";
const SHIP_V3: &str = "---\ntype: task\ndue: 2024-01-12\n---\nShip it today\n";

#[test]
fn task_reload_is_debounced_and_follows_renames() {
    let (ctx, vault, clock) = memory_context(AbeleConfig::default(), ymd(2024, 1, 1));
    vault.seed("Tasks/Ship.md", SHIP_V1);
    let task = Task::from_path(&ctx, "Tasks/Ship.md");

    task.borrow_mut().load(false);
    task.borrow_mut().load(false);
    assert_eq!(task.borrow().load_count(), 1);
    assert_eq!(task.borrow().due, Some(ymd(2024, 1, 10)));

    vault.modify("Tasks/Ship.md", SHIP_V2).expect("modify should succeed");
    assert_eq!(task.borrow().load_count(), 2);
    assert_eq!(task.borrow().due, Some(ymd(2024, 1, 11)));

    clock.advance(100);
    vault.modify("Tasks/Ship.md", SHIP_V3).expect("modify should succeed");
    assert_eq!(task.borrow().load_count(), 2);
    assert_eq!(task.borrow().due, Some(ymd(2024, 1, 11)));

    clock.advance(300);
    assert_eq!(ctx.run_due_timers(), 1);
    assert_eq!(task.borrow().load_count(), 3);
    assert_eq!(task.borrow().due, Some(ymd(2024, 1, 12)));
    assert_eq!(task.borrow().title, "Ship it today");

    vault
        .rename("Tasks/Ship.md", "Done/Ship.md")
        .expect("rename should succeed");
    assert_eq!(task.borrow().path(), "Done/Ship.md");
    assert_eq!(task.borrow().folder(), "Done");
    assert_eq!(task.borrow().load_count(), 4);
    assert!(!task.borrow().is_not_found());
}

#[test]
fn cleaned_up_task_ignores_changes_and_loads() {
    let (ctx, vault, clock) = memory_context(AbeleConfig::default(), ymd(2024, 1, 1));
    vault.seed("Tasks/Ship.md", SHIP_V1);
    let task = Task::from_path(&ctx, "Tasks/Ship.md");
    task.borrow_mut().load(false);

    vault.modify("Tasks/Ship.md", SHIP_V2).expect("modify should succeed");
    clock.advance(50);
    vault.modify("Tasks/Ship.md", SHIP_V3).expect("modify should succeed");
    assert_eq!(ctx.events.pending_timers(), 1);

    task.borrow_mut().cleanup();
    task.borrow_mut().cleanup();
    assert_eq!(ctx.events.pending_timers(), 0);
    assert!(!task.borrow().is_watching());

    vault.modify("Tasks/Ship.md", SHIP_V1).expect("modify should succeed");
    task.borrow_mut().load(true);
    clock.advance(1_000);
    assert_eq!(ctx.run_due_timers(), 0);

    let task = task.borrow();
    assert!(task.is_cleaned_up());
    assert_eq!(task.load_count(), 2);
    assert_eq!(task.due, None);
}

#[test]
fn task_dates_span_from_date_through_due() {
    let (ctx, vault, _clock) = memory_context(AbeleConfig::default(), ymd(2024, 1, 1));
    vault.seed(
        "Tasks/Trip.md",
        "---\ntype: task\ndate: 2024-02-27\ndateTime: \"09:15\"\ndue: 2024-03-01\n---\nTrip\n",
    );
    let task = Task::from_path(&ctx, "Tasks/Trip");
    task.borrow_mut().load(false);
    let task = task.borrow();

    assert_eq!(
        task.dates(),
        vec!["2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01"]
    );
    assert!(task.is_related_to_date(ymd(2024, 2, 29)));
    assert!(!task.is_related_to_date(ymd(2024, 3, 2)));
    assert_eq!(task.task_date(), Some(ymd(2024, 2, 27)));
    assert_eq!(
        task.date_at().map(|at| at.time().to_string()),
        Some("09:15:00".to_string())
    );
}

#[test]
fn log_tracks_its_target_and_filename_date() {
    let (ctx, vault, _clock) = memory_context(AbeleConfig::default(), ymd(2024, 1, 1));
    vault.seed("Projects/Alpha.md", "# Alpha\n");
    vault.seed(
        "Daily/2024-01-02.md",
        "standup\n\nreviewed [[Alpha]] budget\n\nlunch\n",
    );
    let log = Log::new(&ctx, "Daily/2024-01-02", Some("Projects/Alpha"));
    log.borrow_mut().load(false);
    log.borrow_mut().load_content();

    assert_eq!(log.borrow().created_at, Some(ymd(2024, 1, 2)));
    assert!(log.borrow().is_not_found());
    assert_eq!(log.borrow().content, "reviewed [[Alpha]] budget");

    vault
        .rename("Projects/Alpha.md", "Archive/Alpha.md")
        .expect("rename should succeed");
    assert_eq!(log.borrow().target_path(), Some("Archive/Alpha.md"));
    assert_eq!(log.borrow().load_count(), 2);
    assert_eq!(log.borrow().content, "reviewed [[Alpha]] budget");
}
