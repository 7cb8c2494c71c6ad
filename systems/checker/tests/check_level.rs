use chronoshift_core::{CloneId, ParadoxReason, Position};
use chronoshift_system_checker::{check_level, CheckOptions, SolvedLevel, UnsolvableError};
use chronoshift_system_solution::ReplayMode;
use chronoshift_world::Level;

const GATED_CORRIDOR: &str = "2D SuperFun!\n\
+++++++\n\
+bS-G +\n\
+++++++\n\
\n\
button (1, 1) -> gate (3, 1)\n\
\n";

const ADJACENT_GOAL: &str = "2D SuperFun!\n\
+++++\n\
+SG +\n\
+++++\n\
\n\
nothing\n\
\n";

fn with_solution(level: &str, solution: &str) -> Level {
    let text = format!("{level}solution: {solution}\n");
    Level::parse("checked", &text).expect("level parses")
}

#[test]
fn naive_replay_pads_to_the_longest_loop() {
    let mut level = with_solution(GATED_CORRIDOR, "WHHHHHET\n .\n HEEWWT");
    let report = check_level(&mut level, &CheckOptions::default()).expect("solvable");

    assert_eq!(
        report.solved,
        Some(SolvedLevel {
            clones: 2,
            score: 15,
        })
    );
    assert!(report.warnings.is_empty());
}

#[test]
fn exact_replay_waits_for_older_clones() {
    let mut level = with_solution(GATED_CORRIDOR, "WHHHHHET . HEEWWT");
    let options = CheckOptions {
        replay_mode: ReplayMode::Exact,
        ..CheckOptions::default()
    };
    let report = check_level(&mut level, &options).expect("solvable");
    assert_eq!(report.solved.map(|solved| solved.score), Some(15));
}

#[test]
fn paradox_in_solution_is_reported() {
    let mut level = with_solution(ADJACENT_GOAL, "ET");
    assert_eq!(
        check_level(&mut level, &CheckOptions::default()),
        Err(UnsolvableError::TimeParadox {
            level: "checked".to_owned(),
            clones: 1,
            reason: ParadoxReason::CloneNotAtStart {
                clone: CloneId::new(0),
                position: Position::new(2, 1),
            },
        })
    );
}

#[test]
fn unfinished_solution_does_not_obtain_goal() {
    let mut level = with_solution(ADJACENT_GOAL, "EW");
    assert_eq!(
        check_level(&mut level, &CheckOptions::default()),
        Err(UnsolvableError::GoalNotReached {
            level: "checked".to_owned(),
        })
    );
}

#[test]
fn loop_without_goal_is_not_a_solution() {
    let mut level = with_solution(ADJACENT_GOAL, "HT");
    assert!(matches!(
        check_level(&mut level, &CheckOptions::default()),
        Err(UnsolvableError::GoalNotReached { .. })
    ));
}

#[test]
fn malformed_solution_is_rejected() {
    let mut level = with_solution(ADJACENT_GOAL, "EQ");
    assert!(matches!(
        check_level(&mut level, &CheckOptions::default()),
        Err(UnsolvableError::MalformedSolution { .. })
    ));
}

#[test]
fn shortest_solution_scores_each_tick() {
    let mut level = with_solution(ADJACENT_GOAL, "EWT");
    let report = check_level(&mut level, &CheckOptions::default()).expect("solvable");
    assert_eq!(
        report.solved,
        Some(SolvedLevel {
            clones: 1,
            score: 3,
        })
    );
}
