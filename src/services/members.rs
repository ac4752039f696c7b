//! Member registration and contact updates

use crate::{
    error::AppResult,
    models::subscriber::Subscriber,
    repository::Repository,
};

/// Outcome of a registration request.
#[derive(Debug, Clone)]
pub enum CreateMemberOutcome {
    Created(Subscriber),
    DuplicatePhone,
}

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Register a new member. A phone number already on file rejects the
    /// request; member ids are generated by the store, so the created record
    /// is returned for the desk to hand out.
    pub async fn create_member(
        &self,
        full_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> AppResult<CreateMemberOutcome> {
        if let Some(phone) = phone {
            if self.repository.subscribers.exists_with_phone(phone).await? {
                return Ok(CreateMemberOutcome::DuplicatePhone);
            }
        }

        let subscriber = self.repository.subscribers.insert(full_name, email, phone).await?;
        tracing::info!(subscriber_id = subscriber.id, "member registered");
        Ok(CreateMemberOutcome::Created(subscriber))
    }

    /// Update a member's contact details. Returns the operator message.
    pub async fn update_member(
        &self,
        subscriber_id: i32,
        full_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> AppResult<String> {
        let updated = self
            .repository
            .subscribers
            .update_contact(subscriber_id, full_name, email, phone)
            .await?;
        if updated {
            tracing::info!(subscriber_id, "member details updated");
            Ok("Success".to_string())
        } else {
            Ok("Update failed".to_string())
        }
    }
}
