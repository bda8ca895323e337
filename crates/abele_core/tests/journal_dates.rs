mod support;

use abele_core::model::journal::MAX_PERIODS_TO_CHECK;
use abele_core::{
    AbeleConfig, DayOfPeriodValue, Journal, JournalRecurrence, JournalSettings, VaultHost,
};
use chrono::Weekday;
use std::rc::Rc;
use support::{memory_context, ymd, CountingVault};

fn journal(
    note_type: &str,
    recurrence: JournalRecurrence,
    day_of_period: Option<DayOfPeriodValue>,
    new_path_template: &str,
) -> Journal {
    Journal::new(
        JournalSettings {
            id: Some("j1".to_string()),
            name: "Journal".to_string(),
            note_type: note_type.to_string(),
            is_default: false,
            date_property: None,
            template_path: None,
            new_path_template: Some(new_path_template.to_string()),
            recurrence,
            day_of_period,
        },
        Weekday::Mon,
    )
}

fn monthly_last() -> Journal {
    journal(
        "monthly",
        JournalRecurrence::Monthly,
        Some(DayOfPeriodValue::Text("last".to_string())),
        "Monthly/{{date:YYYY-MM}}",
    )
}

#[test]
fn monthly_last_snaps_to_month_end_in_leap_and_common_years() {
    let journal = monthly_last();
    assert!(journal.is_journal_date(ymd(2024, 2, 29)));
    assert!(journal.is_journal_date(ymd(2023, 2, 28)));
    assert!(!journal.is_journal_date(ymd(2024, 2, 28)));
    assert_eq!(journal.get_next_date(ymd(2023, 11, 30)), ymd(2023, 12, 31));
}

#[test]
fn closest_note_search_gives_up_after_bounded_probes() {
    let (_ctx, vault, _clock) = memory_context(AbeleConfig::default(), ymd(2024, 6, 15));
    let counting = CountingVault::new(Rc::clone(&vault));
    let journal = monthly_last();

    assert_eq!(journal.find_closest_prev_note(&counting, ymd(2024, 6, 15)), None);
    assert_eq!(counting.exists_calls(), MAX_PERIODS_TO_CHECK);

    counting.reset();
    assert_eq!(journal.find_closest_next_note(&counting, ymd(2024, 6, 15)), None);
    assert_eq!(counting.exists_calls(), 100);
}

#[test]
fn closest_note_search_walks_periods_until_an_instance_exists() {
    let (_ctx, vault, _clock) = memory_context(AbeleConfig::default(), ymd(2024, 6, 15));
    vault.seed("Monthly/2023-11.md", "# November\n");
    vault.seed("Monthly/2024-05.md", "# May\n");
    let counting = CountingVault::new(Rc::clone(&vault));
    let journal = monthly_last();

    assert_eq!(
        journal.find_closest_prev_note(&counting, ymd(2024, 4, 10)),
        Some(ymd(2023, 11, 30))
    );
    // March, February, January, December, November.
    assert_eq!(counting.exists_calls(), 5);

    assert_eq!(
        journal.find_closest_next_note(&counting, ymd(2023, 11, 30)),
        Some(ymd(2024, 5, 31))
    );
}

#[test]
fn instance_detection_by_path_pattern_and_date_property() {
    let (ctx, vault, _clock) = memory_context(AbeleConfig::default(), ymd(2024, 1, 1));
    vault.seed("Daily/2024-01-02.md", "# Tuesday\n");
    vault.seed("Notes/2024-01-02.md", "# not in the journal folder\n");
    vault.seed("Notes/Kickoff.md", "---\ntype: meeting\nday: 2024-03-05\n---\n");

    let daily = journal("/^Daily/", JournalRecurrence::Daily, None, "Daily/{{date:YYYY-MM-DD}}");
    let host = ctx.host.as_ref();
    assert_eq!(
        daily.check_if_note_path_is_journal(host, "Daily/2024-01-02"),
        Some(ymd(2024, 1, 2))
    );
    assert_eq!(daily.check_if_note_path_is_journal(host, "Notes/2024-01-02.md"), None);
    assert_eq!(daily.check_if_note_path_is_journal(host, "Daily/2024-01-03.md"), None);

    let mut settings = daily.to_settings();
    settings.note_type = "meeting".to_string();
    settings.date_property = Some("day".to_string());
    let meetings = Journal::new(settings, Weekday::Mon);
    assert_eq!(
        meetings.check_if_note_path_is_journal(host, "Notes/Kickoff.md"),
        Some(ymd(2024, 3, 5))
    );
}

#[test]
fn invalid_type_pattern_never_matches() {
    let (ctx, vault, _clock) = memory_context(AbeleConfig::default(), ymd(2024, 1, 1));
    vault.seed("Daily/2024-01-02.md", "# Tuesday\n");
    vault.seed("(Daily/2024-01-03.md", "# Wednesday\n");

    let broken = journal("/(Daily/", JournalRecurrence::Daily, None, "Daily/{{date:YYYY-MM-DD}}");
    let host = ctx.host.as_ref();
    assert_eq!(broken.check_if_note_path_is_journal(host, "Daily/2024-01-02.md"), None);
    assert_eq!(broken.check_if_note_path_is_journal(host, "(Daily/2024-01-03.md"), None);
    assert!(broken.is_journal_date(ymd(2024, 1, 2)));
}

#[test]
fn journal_notes_are_created_from_template_once() {
    let (ctx, vault, _clock) = memory_context(AbeleConfig::default(), ymd(2024, 1, 1));
    vault.seed("Templates/Daily.md", "# {{date:dddd, MMMM D}}\n");

    let mut settings = journal("/^Daily/", JournalRecurrence::Daily, None, "Daily/{{date:YYYY-MM-DD}}")
        .to_settings();
    settings.template_path = Some("Templates/Daily".to_string());
    let daily = Journal::new(settings, Weekday::Mon);
    let host = ctx.host.as_ref();

    let created = daily
        .create_journal_note(host, ymd(2024, 1, 1))
        .expect("journal note should be created");
    assert_eq!(created.as_deref(), Some("Daily/2024-01-01.md"));
    assert_eq!(
        host.read("Daily/2024-01-01.md").as_deref(),
        Some("# Monday, January 1\n")
    );
    assert!(daily.is_journal_note_created(host, ymd(2024, 1, 1)));

    let again = daily
        .create_journal_note(host, ymd(2024, 1, 1))
        .expect("existing note is not an error");
    assert_eq!(again, None);
}
