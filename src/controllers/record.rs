use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::authorizer::IdentityContext;
use crate::core::error::{self, Error};
use crate::core::store::RecordStore;
use crate::types::request::{NewUserData, UpdateUserData};
use crate::types::response::Deleted;
use crate::types::user::UserRecord;

/// Record-level access control plus the CRUD operations themselves.
///
/// The router's token authorizer has already allowed the request at the
/// coarse level; every operation here re-checks ownership against the
/// specific record before touching the store.
#[derive(Clone)]
pub(crate) struct RecordController {
    store: Arc<dyn RecordStore>,
    store_timeout: Duration,
    email_pattern: Regex,
}

impl std::fmt::Debug for RecordController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordController")
            .field("store_timeout", &self.store_timeout)
            .field("email_pattern", &self.email_pattern.as_str())
            .finish()
    }
}

impl RecordController {
    pub(crate) fn new(
        store: Arc<dyn RecordStore>,
        store_timeout: Duration,
    ) -> Result<Self, error::ConfigError> {
        Ok(Self {
            store,
            store_timeout,
            email_pattern: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")?,
        })
    }

    #[instrument(skip(self, identity), fields(subject = %identity.subject))]
    pub(crate) async fn list_all(
        &self,
        identity: &IdentityContext,
    ) -> Result<Vec<UserRecord>, Error> {
        if !identity.is_admin {
            return Err(Error::Forbidden);
        }

        // Unbounded scan; ordering is stable so pagination can be added
        // without breaking clients.
        self.bounded(self.store.scan_all()).await
    }

    #[instrument(skip(self, identity, data), fields(subject = %identity.subject))]
    pub(crate) async fn create(
        &self,
        identity: &IdentityContext,
        data: NewUserData,
    ) -> Result<UserRecord, Error> {
        if !identity.is_admin {
            return Err(Error::Forbidden);
        }

        self.validate_name(&data.name)?;
        self.validate_email(&data.email)?;

        let record = UserRecord {
            user_id: Uuid::new_v4(),
            name: data.name,
            email: data.email,
            created_at: Utc::now(),
        };

        self.bounded(self.store.put(&record)).await?;

        tracing::info!(user_id = %record.user_id, "Created user record");

        Ok(record)
    }

    #[instrument(skip(self, identity), fields(subject = %identity.subject))]
    pub(crate) async fn get(
        &self,
        identity: &IdentityContext,
        user_id: Uuid,
    ) -> Result<UserRecord, Error> {
        self.require_ownership(identity, &user_id)?;

        self.bounded(self.store.get(&user_id))
            .await?
            .ok_or(Error::RecordNotFound)
    }

    #[instrument(skip(self, identity, data), fields(subject = %identity.subject))]
    pub(crate) async fn update(
        &self,
        identity: &IdentityContext,
        user_id: Uuid,
        data: UpdateUserData,
    ) -> Result<UserRecord, Error> {
        self.require_ownership(identity, &user_id)?;

        let mut record = self
            .bounded(self.store.get(&user_id))
            .await?
            .ok_or(Error::RecordNotFound)?;

        // Immutable fields may only echo the stored value.
        if data.user_id.is_some_and(|id| id != record.user_id) {
            return Err(Error::Validation("user_id is immutable"));
        }
        if data.created_at.is_some_and(|at| at != record.created_at) {
            return Err(Error::Validation("created_at is immutable"));
        }

        if let Some(name) = data.name {
            self.validate_name(&name)?;
            record.name = name;
        }
        if let Some(email) = data.email {
            self.validate_email(&email)?;
            record.email = email;
        }

        self.bounded(self.store.put(&record)).await?;

        Ok(record)
    }

    #[instrument(skip(self, identity), fields(subject = %identity.subject))]
    pub(crate) async fn delete(
        &self,
        identity: &IdentityContext,
        user_id: Uuid,
    ) -> Result<Deleted, Error> {
        self.require_ownership(identity, &user_id)?;

        let existed = self.bounded(self.store.delete(&user_id)).await?;

        if !existed {
            tracing::debug!(user_id = %user_id, "Delete of absent record");
        }

        Ok(Deleted {
            user_id,
            deleted: existed,
        })
    }

    /// Self-or-admin: admins bypass the ownership comparison entirely.
    fn require_ownership(&self, identity: &IdentityContext, user_id: &Uuid) -> Result<(), Error> {
        if identity.is_admin || identity.owns(user_id) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    fn validate_name(&self, name: &str) -> Result<(), Error> {
        if name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty"));
        }

        Ok(())
    }

    fn validate_email(&self, email: &str) -> Result<(), Error> {
        if email.trim().is_empty() {
            return Err(Error::Validation("email must not be empty"));
        }

        if !self.email_pattern.is_match(email) {
            return Err(Error::Validation("email is not a valid address"));
        }

        Ok(())
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        tokio::time::timeout(self.store_timeout, operation)
            .await
            .map_err(|_| Error::UpstreamTimeout)?
    }
}
