//! Unit tests for the completely fair scheduling simulator.

#![cfg(feature = "scheduler")]

use rstest::rstest;
use timberline::scheduler::{CfsScheduler, ScheduleError, Task, TickReport, parse_tasks};

fn run_to_strings(tasks: Vec<Task>) -> Vec<String> {
    let mut scheduler = CfsScheduler::new(tasks);
    scheduler.run().iter().map(ToString::to_string).collect()
}

// =============================================================================
// Parser Tests
// =============================================================================

#[rstest]
fn test_parse_well_formed_file() {
    let input = "A 0 5\nB 2 3\nC 10 1\n";
    let tasks = parse_tasks(input.as_bytes()).unwrap();

    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0], Task::new('A', 0, 5));
    assert_eq!(tasks[1], Task::new('B', 2, 3));
    assert_eq!(tasks[2], Task::new('C', 10, 1));
}

#[rstest]
fn test_parse_skips_blank_lines() {
    let input = "A 0 5\n\n   \nB 2 3\n";
    let tasks = parse_tasks(input.as_bytes()).unwrap();
    assert_eq!(tasks.len(), 2);
}

#[rstest]
fn test_parse_accepts_extra_whitespace_between_fields() {
    let tasks = parse_tasks("A   0\t5\n".as_bytes()).unwrap();
    assert_eq!(tasks, vec![Task::new('A', 0, 5)]);
}

#[rstest]
#[case::missing_field("A 0\n")]
#[case::extra_field("A 0 5 9\n")]
#[case::non_numeric_start("A zero 5\n")]
#[case::non_numeric_duration("A 0 five\n")]
#[case::long_name("AB 0 5\n")]
#[case::zero_duration("A 0 0\n")]
fn test_parse_rejects_malformed_lines(#[case] input: &str) {
    let error = parse_tasks(input.as_bytes()).unwrap_err();
    assert!(matches!(error, ScheduleError::MalformedLine { line: 1 }));
}

#[rstest]
fn test_parse_reports_the_offending_line_number() {
    let input = "A 0 5\nB 1 2\noops\n";
    let error = parse_tasks(input.as_bytes()).unwrap_err();
    assert!(matches!(error, ScheduleError::MalformedLine { line: 3 }));
    assert_eq!(format!("{error}"), "malformed task description on line 3");
}

// =============================================================================
// Display Tests
// =============================================================================

#[rstest]
fn test_task_display_round_trips_the_description() {
    let task = Task::new('A', 3, 7);
    assert_eq!(format!("{task}"), "A 3 7");
}

#[rstest]
#[case(TickReport { tick: 0, queued: 0, ran: None, completed: false }, "0 [0]: _")]
#[case(TickReport { tick: 3, queued: 2, ran: Some('B'), completed: false }, "3 [2]: B")]
#[case(TickReport { tick: 7, queued: 1, ran: Some('A'), completed: true }, "7 [1]: A*")]
fn test_tick_report_display(#[case] report: TickReport, #[case] expected: &str) {
    assert_eq!(format!("{report}"), expected);
}

// =============================================================================
// Simulation Tests
// =============================================================================

#[rstest]
fn test_single_task_completes_on_its_last_tick() {
    let reports = run_to_strings(vec![Task::new('A', 0, 2)]);
    assert_eq!(reports, vec!["0 [1]: A", "1 [1]: A*"]);
}

#[rstest]
fn test_tasks_admitted_in_start_then_name_order() {
    // Supplied out of order on a shared start tick.
    let tasks = vec![Task::new('C', 0, 1), Task::new('A', 0, 1), Task::new('B', 0, 1)];
    let reports = run_to_strings(tasks);
    assert_eq!(reports, vec!["0 [3]: A*", "1 [2]: B*", "2 [1]: C*"]);
}

#[rstest]
fn test_overlapping_tasks_share_ticks_fairly() {
    let tasks = vec![Task::new('A', 0, 2), Task::new('B', 0, 2)];
    let reports = run_to_strings(tasks);
    assert_eq!(
        reports,
        vec!["0 [2]: A", "1 [2]: B", "2 [2]: A*", "3 [1]: B*"]
    );
}

#[rstest]
fn test_gap_between_arrivals_produces_idle_ticks() {
    let tasks = vec![Task::new('A', 0, 1), Task::new('B', 3, 1)];
    let reports = run_to_strings(tasks);
    assert_eq!(
        reports,
        vec!["0 [1]: A*", "1 [0]: _", "2 [0]: _", "3 [1]: B*"]
    );
}

#[rstest]
fn test_full_scenario_from_parsed_input() {
    let input = "B 0 2\nA 0 2\nC 1 1\n";
    let tasks = parse_tasks(input.as_bytes()).unwrap();
    let reports = run_to_strings(tasks);

    // A and B arrive together with vruntime 0 and serve FIFO in name
    // order; C arrives at tick 1 at the vruntime floor and slots in.
    assert_eq!(
        reports,
        vec!["0 [2]: A", "1 [3]: B", "2 [3]: C*", "3 [2]: A*", "4 [1]: B*"]
    );
}

#[rstest]
fn test_all_ticks_are_consecutive_from_zero() {
    let tasks = vec![Task::new('A', 2, 3), Task::new('B', 4, 1)];
    let mut scheduler = CfsScheduler::new(tasks);
    let reports = scheduler.run();
    for (index, report) in reports.iter().enumerate() {
        assert_eq!(report.tick, index as u64);
    }
}
