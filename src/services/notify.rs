use sqlx::{Pool, Sqlite};

use crate::db::models::NotificationKind;
use crate::db::{NotificationRepository, UserRepository};
use crate::error::AppError;
use crate::realtime::{Hub, NotificationPayload, ServerEvent};

pub fn notification_message(kind: NotificationKind, name: &str) -> String {
    match kind {
        NotificationKind::Like => format!("{} liked your profile", name),
        NotificationKind::Visit => format!("{} visited your profile", name),
        NotificationKind::Message => format!("{} sent you a message", name),
        NotificationKind::Match => format!("You matched with {}!", name),
        NotificationKind::Unlike => format!("{} unliked your profile", name),
        NotificationKind::DateProposal => format!("{} proposed a date", name),
        NotificationKind::DateAccepted => format!("{} accepted your date", name),
        NotificationKind::DateDeclined => format!("{} declined your date", name),
    }
}

async fn deliver(
    db: &Pool<Sqlite>,
    hub: &Hub,
    target: i64,
    kind: NotificationKind,
    source: Option<i64>,
) -> Result<(), AppError> {
    let id = NotificationRepository::create(db, target, kind, source).await?;

    let name = match source {
        Some(source_id) => UserRepository::first_name(db, source_id).await?,
        None => None,
    };
    let message = notification_message(kind, name.as_deref().unwrap_or("Someone"));

    hub.emit_to_user(
        target,
        ServerEvent::Notification(NotificationPayload {
            id,
            kind,
            from_user_id: source,
            message,
        }),
    )
    .await;

    Ok(())
}

/// Persist a notification for `target` and push it live. Failures are logged
/// and never reach the caller.
pub async fn notify(
    db: &Pool<Sqlite>,
    hub: &Hub,
    target: i64,
    kind: NotificationKind,
    source: Option<i64>,
) {
    if let Err(e) = deliver(db, hub, target, kind, source).await {
        tracing::error!("❌ Failed to notify user {} ({:?}): {}", target, kind, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(notification_message(NotificationKind::Like, "Ann"), "Ann liked your profile");
        assert_eq!(notification_message(NotificationKind::Match, "Bob"), "You matched with Bob!");
        assert_eq!(
            notification_message(NotificationKind::DateDeclined, "Someone"),
            "Someone declined your date"
        );
    }
}
