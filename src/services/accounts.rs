use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{generate_opaque_token, hash_token, AuthError, AuthService, TokenPair},
    db::DbPool,
    entities::account_token::{self, Entity as AccountToken, TokenPurpose},
    entities::refresh_token::{self, Entity as RefreshToken},
    entities::user::{self, Entity as User},
    errors::ServiceError,
    events::{Event, EventSender},
    services::notifications::NotificationService,
};

const REFRESH_TOKEN_LEN: usize = 64;
const ACCOUNT_TOKEN_LEN: usize = 48;

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Registration, email verification, login and the password-reset flow.
/// Accounts stay inactive until their verification token is consumed.
pub struct AccountService {
    db: Arc<DbPool>,
    auth: Arc<AuthService>,
    notifications: Arc<NotificationService>,
    event_sender: EventSender,
    verification_ttl: ChronoDuration,
    reset_ttl: ChronoDuration,
}

impl AccountService {
    pub fn new(
        db: Arc<DbPool>,
        auth: Arc<AuthService>,
        notifications: Arc<NotificationService>,
        event_sender: EventSender,
        verification_ttl_secs: u64,
        reset_ttl_secs: u64,
    ) -> Self {
        Self {
            db,
            auth,
            notifications,
            event_sender,
            verification_ttl: ChronoDuration::seconds(verification_ttl_secs as i64),
            reset_ttl: ChronoDuration::seconds(reset_ttl_secs as i64),
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<user::Model, ServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();

        let taken = User::find()
            .filter(
                user::Column::Username
                    .eq(&username)
                    .or(user::Column::Email.eq(&email)),
            )
            .one(&*self.db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }

        let password_hash = self
            .auth
            .hash_password(&input.password)
            .map_err(auth_to_service)?;

        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            is_active: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|err| match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
                ServiceError::Conflict("Username or email already registered".to_string())
            }
            _ => ServiceError::DatabaseError(err),
        })?;

        let token = self
            .issue_account_token(created.id, TokenPurpose::EmailVerify, self.verification_ttl)
            .await?;
        self.notifications
            .send_verification_email(&email, &token)
            .await;

        if let Err(e) = self.event_sender.send(Event::UserRegistered(created.id)).await {
            warn!(error = %e, "failed to publish user registered event");
        }
        info!(user_id = %created.id, "user registered");

        Ok(created)
    }

    /// Consume an email-verification token and activate the account.
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> Result<user::Model, ServiceError> {
        let record = self
            .consume_account_token(token, TokenPurpose::EmailVerify)
            .await?;

        let account = User::find_by_id(record.user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let mut active: user::ActiveModel = account.into();
        active.is_active = Set(true);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        if let Err(e) = self.event_sender.send(Event::EmailVerified(updated.id)).await {
            warn!(error = %e, "failed to publish email verified event");
        }

        Ok(updated)
    }

    /// Verify credentials and issue an access/refresh token pair.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ServiceError> {
        let account = User::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        self.auth
            .verify_password(password, &account.password_hash)
            .map_err(auth_to_service)?;

        if !account.is_active {
            return Err(ServiceError::AuthError(
                "Account email is not verified".to_string(),
            ));
        }

        self.issue_token_pair(&account).await
    }

    /// Exchange a valid refresh token for a rotated pair. The presented
    /// token is revoked whether or not a new one is issued afterwards.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let token_hash = hash_token(refresh_token);
        let record = RefreshToken::find()
            .filter(refresh_token::Column::TokenHash.eq(token_hash))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid refresh token".to_string()))?;

        if record.revoked || record.expires_at < Utc::now() {
            return Err(ServiceError::Unauthorized(
                "Refresh token expired or revoked".to_string(),
            ));
        }

        let account = User::find_by_id(record.user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid refresh token".to_string()))?;

        let mut active: refresh_token::ActiveModel = record.into();
        active.revoked = Set(true);
        active.update(&*self.db).await?;

        self.issue_token_pair(&account).await
    }

    /// Start the password-reset flow. Always succeeds quietly so callers
    /// cannot probe which emails have accounts.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        let account = User::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(&*self.db)
            .await?;

        if let Some(account) = account {
            let token = self
                .issue_account_token(account.id, TokenPurpose::PasswordReset, self.reset_ttl)
                .await?;
            self.notifications
                .send_password_reset_email(&account.email, &token)
                .await;
            if let Err(e) = self
                .event_sender
                .send(Event::PasswordResetRequested(account.id))
                .await
            {
                warn!(error = %e, "failed to publish password reset event");
            }
        }

        Ok(())
    }

    /// Finish the password-reset flow: set the new password and revoke every
    /// outstanding refresh token for the account.
    #[instrument(skip(self, token, new_password))]
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let record = self
            .consume_account_token(token, TokenPurpose::PasswordReset)
            .await?;

        let account = User::find_by_id(record.user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let password_hash = self
            .auth
            .hash_password(new_password)
            .map_err(auth_to_service)?;

        let user_id = account.id;
        let mut active: user::ActiveModel = account.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, sea_orm::sea_query::Expr::value(true))
            .filter(refresh_token::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        info!(user_id = %user_id, "password reset completed");
        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {id} not found")))
    }

    async fn issue_token_pair(&self, account: &user::Model) -> Result<TokenPair, ServiceError> {
        let access_token = self
            .auth
            .issue_access_token(account)
            .map_err(auth_to_service)?;

        let refresh_raw = generate_opaque_token(REFRESH_TOKEN_LEN);
        let expires_at = Utc::now()
            + ChronoDuration::from_std(self.auth.config.refresh_token_expiration)
                .map_err(|_| ServiceError::InternalError("invalid refresh lifetime".into()))?;

        refresh_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(account.id),
            token_hash: Set(hash_token(&refresh_raw)),
            expires_at: Set(expires_at),
            revoked: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_raw,
            token_type: "Bearer".to_string(),
            expires_in: self.auth.config.access_token_expiration.as_secs() as i64,
        })
    }

    async fn issue_account_token(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
        ttl: ChronoDuration,
    ) -> Result<String, ServiceError> {
        let raw = generate_opaque_token(ACCOUNT_TOKEN_LEN);
        account_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            token_hash: Set(hash_token(&raw)),
            purpose: Set(purpose),
            expires_at: Set(Utc::now() + ttl),
            consumed: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        Ok(raw)
    }

    async fn consume_account_token(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<account_token::Model, ServiceError> {
        let record = AccountToken::find()
            .filter(account_token::Column::TokenHash.eq(hash_token(token)))
            .filter(account_token::Column::Purpose.eq(purpose))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError("Invalid or expired token".to_string())
            })?;

        if record.consumed || record.expires_at < Utc::now() {
            return Err(ServiceError::ValidationError(
                "Invalid or expired token".to_string(),
            ));
        }

        let snapshot = record.clone();
        let mut active: account_token::ActiveModel = record.into();
        active.consumed = Set(true);
        active.update(&*self.db).await?;

        Ok(snapshot)
    }
}

fn auth_to_service(err: AuthError) -> ServiceError {
    match err {
        AuthError::InvalidCredentials => {
            ServiceError::Unauthorized("Invalid credentials".to_string())
        }
        other => ServiceError::AuthError(other.to_string()),
    }
}
