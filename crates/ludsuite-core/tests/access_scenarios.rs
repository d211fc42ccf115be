//! # Access Scenarios
//!
//! End-to-end lifecycles run against both storage backends. Each scenario
//! must produce the same decisions in memory and on a redb file.

use chrono::NaiveDate;
use ludsuite_core::{
    AssignmentDraft, Dashboard, Directory, LudError, Mentee, NewActivity, NewMentee,
    NewNotification, NewObjective, NewUser, NotificationTarget, ProgramYear, QuarterHours,
    Requester, Role, User, access, assignment, can_access, dashboard, notifications, tracking,
};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Run `scenario` once per backend.
fn on_both_backends(scenario: impl Fn(&mut Directory)) {
    let mut memory = Directory::new();
    scenario(&mut memory);

    let tmp = TempDir::new().expect("temp dir");
    let mut redb = Directory::with_redb(tmp.path().join("scenario.redb")).expect("open redb");
    assert!(redb.is_persistent());
    scenario(&mut redb);
}

struct Cast {
    admin: User,
    mentor: User,
    endorser: User,
    reviewer: User,
    mentee_user: User,
    mentee: Mentee,
}

fn cast(dir: &mut Directory) -> Cast {
    let mut make = |name: &str, role: Role| {
        dir.create_user(NewUser::with_role(name, format!("{name}@example.org"), role))
            .expect("user")
    };
    let admin = make("admin", Role::Admin);
    let mentor = make("mentor", Role::Mentor);
    let endorser = make("endorser", Role::Endorser);
    let reviewer = make("reviewer", Role::Reviewer);
    let mentee_user = make("nia", Role::Mentee);
    let mentee = dir
        .create_mentee(NewMentee {
            user: Some(mentee_user.id),
            name: "Nia".to_string(),
            program_year: ProgramYear::FIRST,
        })
        .expect("mentee");
    Cast {
        admin,
        mentor,
        endorser,
        reviewer,
        mentee_user,
        mentee,
    }
}

#[test]
fn assignment_end_date_gates_mentor_access() {
    on_both_backends(|dir| {
        let c = cast(dir);
        let operator = Requester::from_user(&c.admin);
        let mentor = Requester::from_user(&c.mentor);

        assignment::create_assignment(
            dir,
            &operator,
            AssignmentDraft::new(c.mentor.id, c.mentee.id)
                .starting(date(2024, 1, 1))
                .ending(date(2024, 6, 1)),
            date(2024, 1, 1),
        )
        .expect("assign");

        assert!(can_access(&*dir, &mentor, c.mentee.id, date(2024, 6, 1)).expect("query"));
        assert!(!can_access(&*dir, &mentor, c.mentee.id, date(2024, 7, 1)).expect("query"));
        assert!(can_access(&*dir, &Requester::from_user(&c.reviewer), c.mentee.id, date(2024, 7, 1))
            .expect("query"));
        assert!(!can_access(&*dir, &Requester::from_user(&c.endorser), c.mentee.id, date(2024, 7, 1))
            .expect("query"));
    });
}

#[test]
fn deleting_mentor_removes_assignments_and_links() {
    on_both_backends(|dir| {
        let c = cast(dir);
        let operator = Requester::from_user(&c.admin);
        let today = date(2024, 3, 1);

        assignment::create_assignment(
            dir,
            &operator,
            AssignmentDraft::new(c.mentor.id, c.mentee.id),
            today,
        )
        .expect("assign");
        assignment::add_mentor(dir, &operator, c.endorser.id, c.mentor.id).expect("link");

        assert!(dir.delete_user(c.mentor.id).expect("delete"));

        let mentor = Requester::from_user(&c.mentor);
        assert!(!can_access(&*dir, &mentor, c.mentee.id, today).expect("query"));
        assert!(dir.all_assignments().expect("rows").is_empty());
        assert!(dir.linked_mentors(c.endorser.id).expect("links").is_empty());
        assert!(dir.mentee(c.mentee.id).expect("mentee").is_some());
    });
}

#[test]
fn deleting_mentee_user_keeps_record_without_back_reference() {
    on_both_backends(|dir| {
        let c = cast(dir);

        dir.delete_user(c.mentee_user.id).expect("delete");

        let mentee = dir.require_mentee(c.mentee.id).expect("mentee");
        assert_eq!(mentee.user, None);
    });
}

#[test]
fn record_workflow_respects_roles() {
    on_both_backends(|dir| {
        let c = cast(dir);
        let operator = Requester::from_user(&c.admin);
        let today = date(2024, 3, 1);
        assignment::create_assignment(
            dir,
            &operator,
            AssignmentDraft::new(c.mentor.id, c.mentee.id),
            today,
        )
        .expect("assign");
        assignment::add_mentor(dir, &operator, c.endorser.id, c.mentor.id).expect("link");

        let mentee = Requester::from_user(&c.mentee_user);
        let mentor = Requester::from_user(&c.mentor);
        let endorser = Requester::from_user(&c.endorser);
        let reviewer = Requester::from_user(&c.reviewer);

        let objective = tracking::add_objective(
            dir,
            &mentee,
            c.mentee.id,
            NewObjective {
                title: "Read two books".to_string(),
                description: String::new(),
                target_date: Some(date(2024, 12, 1)),
                status: Default::default(),
            },
        )
        .expect("objective");

        let reviewed =
            tracking::set_objective_feedback(dir, &mentor, objective.id, "  Pick one first ", today)
                .expect("feedback");
        assert_eq!(reviewed.mentor_feedback.as_deref(), Some("Pick one first"));

        assert!(matches!(
            tracking::set_objective_feedback(dir, &reviewer, objective.id, "x", today),
            Err(LudError::PermissionDenied)
        ));
        assert!(matches!(
            tracking::objectives_for(dir, &endorser, c.mentee.id, today),
            Err(LudError::PermissionDenied)
        ));

        let activity = tracking::log_activity(
            dir,
            &mentor,
            NewActivity {
                date: today,
                duration: QuarterHours::new(4).expect("duration"),
                kind: Default::default(),
                other_activity: None,
                learnings: "Session one".to_string(),
            },
        )
        .expect("activity");
        let with_feedback =
            tracking::set_activity_feedback(dir, &endorser, activity.id, "Nice").expect("review");
        assert_eq!(with_feedback.feedback, "Nice");
        assert!(access::can_read_activity(dir, &reviewer, &with_feedback).expect("query"));
        assert!(!access::can_review_activity(dir, &reviewer, &with_feedback).expect("query"));
    });
}

#[test]
fn dashboards_follow_redirects() {
    on_both_backends(|dir| {
        let c = cast(dir);
        let today = date(2024, 3, 1);

        for user in [&c.admin, &c.mentor, &c.endorser, &c.reviewer, &c.mentee_user] {
            let requester = Requester::from_user(user);
            let board = dashboard::dashboard_for(dir, &requester, today).expect("dashboard");
            assert!(dashboard::is_home_of(&board, &requester), "{user}");
        }

        let admin_board =
            dashboard::dashboard_for(dir, &Requester::from_user(&c.admin), today).expect("board");
        assert!(matches!(admin_board, Dashboard::Admin { .. }));
    });
}

#[test]
fn notifications_reach_their_audience() {
    on_both_backends(|dir| {
        let c = cast(dir);
        let operator = Requester::from_user(&c.admin);
        let now = date(2024, 3, 1)
            .and_hms_opt(9, 0, 0)
            .expect("valid time")
            .and_utc();

        notifications::broadcast(
            dir,
            &operator,
            NewNotification {
                message: "Quarterly reviews are due".to_string(),
                target: NotificationTarget::Endorser,
            },
            now,
        )
        .expect("broadcast");

        let endorser = notifications::inbox(dir, &Requester::from_user(&c.endorser)).expect("inbox");
        let mentor = notifications::inbox(dir, &Requester::from_user(&c.mentor)).expect("inbox");
        assert_eq!(endorser.len(), 1);
        assert!(mentor.is_empty());

        assert!(matches!(
            notifications::broadcast(
                dir,
                &Requester::from_user(&c.mentor),
                NewNotification {
                    message: "hello".to_string(),
                    target: NotificationTarget::Both,
                },
                now,
            ),
            Err(LudError::PermissionDenied)
        ));
    });
}

#[test]
fn redb_rows_survive_reopen() {
    let tmp = TempDir::new().expect("temp dir");
    let path = tmp.path().join("reopen.redb");
    let today = date(2024, 3, 1);

    let (mentor, mentee) = {
        let mut dir = Directory::with_redb(&path).expect("open");
        let c = cast(&mut dir);
        assignment::create_assignment(
            &mut dir,
            &Requester::from_user(&c.admin),
            AssignmentDraft::new(c.mentor.id, c.mentee.id),
            today,
        )
        .expect("assign");
        (c.mentor, c.mentee)
    };

    let mut dir = Directory::with_redb(&path).expect("reopen");
    assert!(can_access(&dir, &Requester::from_user(&mentor), mentee.id, today).expect("query"));
    dir.compact().expect("compact");
    assert_eq!(dir.stats().expect("stats").assignments, 1);
}
