//! # Dashboards
//!
//! The landing data for each role, assembled through the same predicates the
//! record operations use. A mentee account without a linked mentee record
//! gets an empty placeholder, never an error.

use crate::access::{Requester, active_assignments_for_mentor, visible_mentees};
use crate::directory::{Directory, DirectoryStats};
use crate::notifications::inbox;
use crate::records::{
    Activity, MenteeAssessment, Notification, ObjectiveItem, WorkScheduleItem, YearPlanItem,
};
use crate::routing::{Destination, redirect_for};
use crate::tracking::{
    activities_for_mentor, assessments_for, objectives_for, work_schedule_for, year_plan_for,
};
use crate::{Assignment, LudError, Mentee, Role, User};
use chrono::NaiveDate;
use serde::Serialize;

/// Activities shown on mentor and endorser dashboards.
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Role-specific landing data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dashboard {
    Admin {
        stats: DirectoryStats,
        notifications: Vec<Notification>,
    },
    Mentor {
        assignments: Vec<Assignment>,
        mentees: Vec<Mentee>,
        /// Endorsers overseeing this mentor.
        endorsers: Vec<User>,
        recent_activities: Vec<Activity>,
        /// Total logged time across all activities.
        minutes_logged: u32,
        /// Work-schedule items due today or later.
        upcoming_work: Vec<WorkScheduleItem>,
        notifications: Vec<Notification>,
    },
    Mentee {
        /// `None` when the account has no mentee record yet.
        mentee: Option<Mentee>,
        objectives: Vec<ObjectiveItem>,
        year_plan: Vec<YearPlanItem>,
        assessments: Vec<MenteeAssessment>,
        /// Mean rating of the most recent assessment, in tenths.
        latest_average_tenths: Option<u32>,
    },
    Endorser {
        mentors: Vec<User>,
        recent_activities: Vec<Activity>,
        notifications: Vec<Notification>,
    },
    Reviewer {
        mentees: Vec<Mentee>,
        stats: DirectoryStats,
    },
    /// Users without a role only see their profile.
    Profile,
}

impl Dashboard {
    /// The route this dashboard is served under.
    #[must_use]
    pub fn destination(&self) -> Destination {
        match self {
            Dashboard::Admin { .. } => Destination::AdminDashboard,
            Dashboard::Mentor { .. } => Destination::MentorDashboard,
            Dashboard::Mentee { .. } => Destination::MenteeDashboard,
            Dashboard::Endorser { .. } => Destination::EndorserDashboard,
            Dashboard::Reviewer { .. } => Destination::ReviewerDashboard,
            Dashboard::Profile => Destination::Profile,
        }
    }
}

/// Build the dashboard the requester is redirected to after login.
pub fn dashboard_for(
    dir: &Directory,
    requester: &Requester,
    today: NaiveDate,
) -> Result<Dashboard, LudError> {
    match requester.effective_role() {
        Some(Role::Admin) => Ok(Dashboard::Admin {
            stats: dir.stats()?,
            notifications: inbox(dir, requester)?,
        }),
        Some(Role::Mentor) => {
            let mut recent_activities = activities_for_mentor(dir, requester, requester.id)?;
            let minutes_logged = recent_activities
                .iter()
                .fold(0u32, |total, a| total.saturating_add(a.duration.minutes()));
            recent_activities.truncate(RECENT_ACTIVITY_LIMIT);

            let mut endorsers = Vec::new();
            for endorser in dir.endorsers_of(requester.id)? {
                if let Some(user) = dir.user(endorser)? {
                    endorsers.push(user);
                }
            }

            let upcoming_work = work_schedule_for(dir, requester, requester.id)?
                .into_iter()
                .filter(|item| item.is_upcoming(today))
                .collect();

            Ok(Dashboard::Mentor {
                assignments: active_assignments_for_mentor(dir, requester.id, today)?,
                mentees: visible_mentees(dir, requester, today)?,
                endorsers,
                recent_activities,
                minutes_logged,
                upcoming_work,
                notifications: inbox(dir, requester)?,
            })
        }
        Some(Role::Mentee) => mentee_dashboard(dir, requester, today),
        Some(Role::Endorser) => {
            let mut mentors = Vec::new();
            let mut recent_activities = Vec::new();
            for mentor in dir.linked_mentors(requester.id)? {
                if let Some(user) = dir.user(mentor)? {
                    mentors.push(user);
                }
                recent_activities.extend(activities_for_mentor(dir, requester, mentor)?);
            }
            recent_activities.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
            recent_activities.truncate(RECENT_ACTIVITY_LIMIT);
            Ok(Dashboard::Endorser {
                mentors,
                recent_activities,
                notifications: inbox(dir, requester)?,
            })
        }
        Some(Role::Reviewer) => Ok(Dashboard::Reviewer {
            mentees: visible_mentees(dir, requester, today)?,
            stats: dir.stats()?,
        }),
        None => Ok(Dashboard::Profile),
    }
}

fn mentee_dashboard(
    dir: &Directory,
    requester: &Requester,
    today: NaiveDate,
) -> Result<Dashboard, LudError> {
    let Some(mentee) = dir.mentee_for_user(requester.id)? else {
        return Ok(Dashboard::Mentee {
            mentee: None,
            objectives: Vec::new(),
            year_plan: Vec::new(),
            assessments: Vec::new(),
            latest_average_tenths: None,
        });
    };
    // Newest first, so the head is the latest assessment.
    let assessments = assessments_for(dir, requester, mentee.id, today)?;
    Ok(Dashboard::Mentee {
        objectives: objectives_for(dir, requester, mentee.id, today)?,
        year_plan: year_plan_for(dir, requester, mentee.id, today)?,
        latest_average_tenths: assessments.first().and_then(MenteeAssessment::average_tenths),
        assessments,
        mentee: Some(mentee),
    })
}

/// Whether the dashboard matches the redirect for the same requester.
#[must_use]
pub fn is_home_of(dashboard: &Dashboard, requester: &Requester) -> bool {
    dashboard.destination() == redirect_for(requester.effective_role())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::{NewMentee, NewUser, ProgramYear, UserId};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).expect("valid date")
    }

    #[test]
    fn mentee_without_record_gets_placeholder() {
        let mut dir = Directory::new();
        let user = dir
            .create_user(NewUser::with_role("n1", "n1@example.org", Role::Mentee))
            .expect("user");
        let requester = Requester::from_user(&user);
        let dashboard = dashboard_for(&dir, &requester, today()).expect("dashboard");
        assert_eq!(
            dashboard,
            Dashboard::Mentee {
                mentee: None,
                objectives: Vec::new(),
                year_plan: Vec::new(),
                assessments: Vec::new(),
                latest_average_tenths: None,
            }
        );
        assert!(is_home_of(&dashboard, &requester));
    }

    #[test]
    fn mentee_with_record_sees_own_profile() {
        let mut dir = Directory::new();
        let user = dir
            .create_user(NewUser::with_role("n1", "n1@example.org", Role::Mentee))
            .expect("user");
        dir.create_mentee(NewMentee {
            user: Some(user.id),
            name: "Nia".to_string(),
            program_year: ProgramYear::FIRST,
        })
        .expect("mentee");
        let dashboard =
            dashboard_for(&dir, &Requester::from_user(&user), today()).expect("dashboard");
        match dashboard {
            Dashboard::Mentee { mentee, .. } => {
                assert_eq!(mentee.map(|m| m.name), Some("Nia".to_string()));
            }
            other => panic!("unexpected dashboard {other:?}"),
        }
    }

    #[test]
    fn mentor_dashboard_summarizes_own_work() {
        use crate::assignment::add_mentor;
        use crate::records::{ActivityKind, NewActivity, NewWorkScheduleItem, QuarterHours};
        use crate::tracking::{add_work_item, log_activity};

        let mut dir = Directory::new();
        let admin = dir
            .create_user(NewUser::with_role("admin", "admin@example.org", Role::Admin))
            .expect("admin");
        let mentor = dir
            .create_user(NewUser::with_role("m1", "m1@example.org", Role::Mentor))
            .expect("mentor");
        let endorser = dir
            .create_user(NewUser::with_role("e1", "e1@example.org", Role::Endorser))
            .expect("endorser");
        let operator = Requester::from_user(&admin);
        let requester = Requester::from_user(&mentor);
        add_mentor(&mut dir, &operator, endorser.id, mentor.id).expect("link");

        for quarters in [2, 5] {
            log_activity(
                &mut dir,
                &requester,
                NewActivity {
                    date: today(),
                    duration: QuarterHours::new(quarters).expect("duration"),
                    kind: ActivityKind::YclpClass,
                    other_activity: None,
                    learnings: String::new(),
                },
            )
            .expect("log");
        }
        let now = today().and_hms_opt(9, 0, 0).expect("valid time").and_utc();
        for (role, due) in [("Past duty", today().pred_opt()), ("Camp lead", Some(today()))] {
            add_work_item(
                &mut dir,
                &requester,
                mentor.id,
                NewWorkScheduleItem {
                    role: role.to_string(),
                    due_date: due.expect("valid date"),
                    description: String::new(),
                },
                now,
            )
            .expect("work item");
        }

        match dashboard_for(&dir, &requester, today()).expect("dashboard") {
            Dashboard::Mentor {
                endorsers,
                minutes_logged,
                upcoming_work,
                ..
            } => {
                assert_eq!(endorsers, vec![endorser]);
                assert_eq!(minutes_logged, 105);
                let roles: Vec<&str> = upcoming_work.iter().map(|i| i.role.as_str()).collect();
                assert_eq!(roles, vec!["Camp lead"]);
            }
            other => panic!("unexpected dashboard {other:?}"),
        }
    }

    #[test]
    fn mentee_dashboard_reports_latest_average() {
        use crate::records::{NewAssessment, Rating, RatingDomain};
        use crate::tracking::add_assessment;
        use std::collections::BTreeMap;

        let mut dir = Directory::new();
        let (user, mentee) = dir
            .create_mentee_user(
                NewUser::with_role("n1", "n1@example.org", Role::Mentee),
                ProgramYear::FIRST,
            )
            .expect("mentee");
        let requester = Requester::from_user(&user);
        for (day, ratings) in [(1, [2, 2]), (20, [4, 5])] {
            add_assessment(
                &mut dir,
                &requester,
                mentee.id,
                NewAssessment {
                    assessed_on: NaiveDate::from_ymd_opt(2024, 5, day).expect("valid date"),
                    ratings: BTreeMap::from([
                        (RatingDomain::Academic, Rating::new(ratings[0]).expect("rating")),
                        (RatingDomain::Leadership, Rating::new(ratings[1]).expect("rating")),
                    ]),
                    reflection: String::new(),
                },
            )
            .expect("assessment");
        }

        match dashboard_for(&dir, &requester, today()).expect("dashboard") {
            Dashboard::Mentee {
                latest_average_tenths,
                ..
            } => assert_eq!(latest_average_tenths, Some(45)),
            other => panic!("unexpected dashboard {other:?}"),
        }
    }

    #[test]
    fn unset_role_lands_on_profile() {
        let dir = Directory::new();
        let requester = Requester::new(UserId(9), None, false);
        let dashboard = dashboard_for(&dir, &requester, today()).expect("dashboard");
        assert_eq!(dashboard, Dashboard::Profile);
        assert!(is_home_of(&dashboard, &requester));
    }

    #[test]
    fn every_role_dashboard_matches_its_redirect() {
        let mut dir = Directory::new();
        for role in Role::ALL {
            let user = dir
                .create_user(NewUser::with_role(
                    role.as_str(),
                    format!("{}@example.org", role.as_str()),
                    role,
                ))
                .expect("user");
            let requester = Requester::from_user(&user);
            let dashboard = dashboard_for(&dir, &requester, today()).expect("dashboard");
            assert!(is_home_of(&dashboard, &requester), "{role}");
        }
    }
}
