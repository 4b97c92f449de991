use crate::{
    db::DbPool,
    entities::lead::{self, ActiveModel as LeadActiveModel, Entity as LeadEntity, Model as LeadModel},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications,
    services::email_queue::EmailQueueService,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CaptureLeadRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email must be valid"))]
    pub email: String,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub message: Option<String>,
}

/// Lead capture: persists the contact and queues an owner notification.
/// The notification rides the same durable queue as order emails, so a
/// mailer outage never loses a lead alert.
#[derive(Clone)]
pub struct LeadService {
    db_pool: Arc<DbPool>,
    email_queue: EmailQueueService,
    owner_email: String,
    event_sender: Option<Arc<EventSender>>,
}

impl LeadService {
    pub fn new(
        db_pool: Arc<DbPool>,
        email_queue: EmailQueueService,
        owner_email: String,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            email_queue,
            owner_email,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn capture_lead(
        &self,
        request: CaptureLeadRequest,
    ) -> Result<LeadModel, ServiceError> {
        request.validate().map_err(ServiceError::from)?;

        let model = LeadActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            email: Set(request.email),
            phone: Set(request.phone),
            source: Set(request.source),
            message: Set(request.message),
            created_at: Set(Utc::now()),
        };
        let inserted = model.insert(&*self.db_pool).await?;
        info!(lead_id = %inserted.id, "Lead captured");

        let (subject, html) = notifications::lead_notification_email(&inserted);
        self.email_queue
            .enqueue(&self.owner_email, &subject, &html)
            .await?;

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::LeadCaptured(inserted.id)).await {
                warn!(error = %e, lead_id = %inserted.id, "Failed to send lead captured event");
            }
        }

        Ok(inserted)
    }

    /// Lists captured leads, newest first (admin view).
    pub async fn list_leads(&self) -> Result<Vec<LeadModel>, ServiceError> {
        Ok(LeadEntity::find()
            .order_by_desc(lead::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }
}
