//! Admin broadcasts and per-role inboxes.

use crate::access::{Requester, require_admin};
use crate::directory::Directory;
use crate::records::{NewNotification, Notification};
use crate::storage::Collection;
use crate::{LudError, RecordId};
use chrono::{DateTime, Utc};

/// Broadcast a message to endorsers, mentors or both. Admin only.
pub fn broadcast(
    dir: &mut Directory,
    requester: &Requester,
    new_notification: NewNotification,
    now: DateTime<Utc>,
) -> Result<Notification, LudError> {
    require_admin(requester)?;
    new_notification.validate()?;
    let created_by = requester.id;
    dir.insert_row(Collection::Notifications, |id| Notification {
        id: RecordId(id),
        message: new_notification.message.trim().to_string(),
        target: new_notification.target,
        created_at: now,
        created_by,
    })
}

/// Notifications addressed to the requester's role, newest first.
///
/// Mentees, reviewers and users without a role get an empty inbox.
pub fn inbox(dir: &Directory, requester: &Requester) -> Result<Vec<Notification>, LudError> {
    let role = requester.effective_role();
    let mut notes: Vec<Notification> = dir
        .notifications()?
        .into_iter()
        .filter(|n| n.target.reaches(role))
        .collect();
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::NotificationTarget;
    use crate::{NewUser, Role};
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn requester(dir: &mut Directory, name: &str, role: Role) -> Requester {
        let user = dir
            .create_user(NewUser::with_role(name, format!("{name}@example.org"), role))
            .expect("user");
        Requester::from_user(&user)
    }

    #[test]
    fn inbox_is_filtered_by_audience() {
        let mut dir = Directory::new();
        let admin = requester(&mut dir, "admin", Role::Admin);
        let mentor = requester(&mut dir, "m1", Role::Mentor);
        let endorser = requester(&mut dir, "e1", Role::Endorser);
        let mentee = requester(&mut dir, "n1", Role::Mentee);

        for (hour, target) in [
            (8, NotificationTarget::Mentor),
            (9, NotificationTarget::Endorser),
            (10, NotificationTarget::Both),
        ] {
            broadcast(
                &mut dir,
                &admin,
                NewNotification {
                    message: format!("update for {target:?}"),
                    target,
                },
                at(hour),
            )
            .expect("broadcast");
        }

        let mentor_inbox = inbox(&dir, &mentor).expect("inbox");
        let targets: Vec<NotificationTarget> = mentor_inbox.iter().map(|n| n.target).collect();
        assert_eq!(
            targets,
            vec![NotificationTarget::Both, NotificationTarget::Mentor]
        );
        assert_eq!(inbox(&dir, &endorser).expect("inbox").len(), 2);
        assert_eq!(inbox(&dir, &admin).expect("inbox").len(), 3);
        assert!(inbox(&dir, &mentee).expect("inbox").is_empty());
    }

    #[test]
    fn only_admins_broadcast() {
        let mut dir = Directory::new();
        let mentor = requester(&mut dir, "m1", Role::Mentor);
        let err = broadcast(
            &mut dir,
            &mentor,
            NewNotification {
                message: "hello".to_string(),
                target: NotificationTarget::Both,
            },
            at(8),
        )
        .expect_err("mentor cannot broadcast");
        assert!(matches!(err, LudError::PermissionDenied));
        assert!(dir.notifications().expect("rows").is_empty());
    }

    #[test]
    fn empty_message_is_rejected() {
        let mut dir = Directory::new();
        let admin = requester(&mut dir, "admin", Role::Admin);
        let err = broadcast(
            &mut dir,
            &admin,
            NewNotification {
                message: "   ".to_string(),
                target: NotificationTarget::Both,
            },
            at(8),
        )
        .expect_err("blank message");
        assert!(matches!(err, LudError::Validation(_)));
    }
}
