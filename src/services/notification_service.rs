// services/notification_service.rs
//
// Fire-and-forget notification writes. A failed notification never rolls
// back the purchase it describes.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::{Collection, Database};
use tracing::warn;

use crate::errors::Result;
use crate::models::notification::{Notification, NotificationChannel};

const NOTIFICATIONS: &str = "notifications";

pub async fn create_custom_notification(
    db: &Database,
    description: &str,
    recipient_id: ObjectId,
    notif_type: NotificationChannel,
    scheduled_at: Option<DateTime<Utc>>,
) -> Result<()> {
    let record = Notification {
        id: Some(ObjectId::new()),
        description: description.to_string(),
        recipient_type: "user".to_string(),
        recipient_id,
        notif_type,
        scheduled_at,
        created_at: Utc::now(),
    };

    let collection: Collection<Notification> = db.collection(NOTIFICATIONS);
    collection.insert_one(&record).await?;
    Ok(())
}

/// Send to both channels, logging failures instead of propagating them.
pub async fn notify_best_effort(
    db: &Database,
    description: &str,
    recipient_id: ObjectId,
    scheduled_at: Option<DateTime<Utc>>,
) {
    for channel in [NotificationChannel::Message, NotificationChannel::InApp] {
        if let Err(e) =
            create_custom_notification(db, description, recipient_id, channel, scheduled_at).await
        {
            warn!("Failed to record notification for {}: {}", recipient_id.to_hex(), e);
        }
    }
}
