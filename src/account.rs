//! Account mutations: password reset, e-mail change with re-verification,
//! username and bio updates.
//!
//! Every mutation is authenticated by a session token looked up in the
//! `sessions` collection. Notification e-mails go through a [`Mailer`];
//! delivery failures are logged and never fail the mutation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::config::AccountConfig;
use crate::local_db_model::Document;
use crate::local_db_state::LocalDbState;

pub const ACCOUNTS_COLLECTION: &str = "accounts";
pub const SESSIONS_COLLECTION: &str = "sessions";

const LAST_SEEN_REASON: &str = "changing account details";
const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub displayname: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    /// bcrypt hash.
    pub password: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen_reason: Option<String>,
}

impl Document for Account {
    fn identity(&self) -> Option<&str> {
        Some(self.id.as_str()).filter(|id| !id.is_empty())
    }
}

/// A login session, keyed by its token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "_id")]
    pub token: String,
    /// Identity of the owning account.
    pub user: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Document for Session {
    fn identity(&self) -> Option<&str> {
        Some(self.token.as_str()).filter(|token| !token.is_empty())
    }
}

/// Requested changes. `None` and empty strings leave a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub token: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub displayname: Option<String>,
    /// Percent-encoded.
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmailTemplate {
    PasswordChanged,
    UsernameChanged,
    EmailReverificationPrevious,
    EmailReverificationNext,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailTemplate::PasswordChanged => "password-changed",
            EmailTemplate::UsernameChanged => "username-changed",
            EmailTemplate::EmailReverificationPrevious => "email-reverification-previous",
            EmailTemplate::EmailReverificationNext => "email-reverification-next",
        }
    }
}

/// Values rendered into an e-mail template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLocals {
    pub user: Account,
    pub old_user: Account,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_displayname: Option<String>,
    /// Verification link for `email`.
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub template: EmailTemplate,
    pub locals: EmailLocals,
}

/// Outgoing e-mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), AppResponse>;
}

#[derive(Debug, Serialize, Deserialize)]
struct VerificationClaims {
    email: String,
    iss: String,
    iat: i64,
    exp: i64,
}

struct Notification {
    to: String,
    template: EmailTemplate,
    new_displayname: Option<String>,
}

pub struct AccountService {
    store: Arc<LocalDbState>,
    mailer: Arc<dyn Mailer>,
    config: AccountConfig,
}

impl AccountService {
    pub fn new(store: Arc<LocalDbState>, mailer: Arc<dyn Mailer>, config: AccountConfig) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    /// Resolves a session token to its account.
    pub fn authenticate(&self, token: &str) -> Result<Account, AppResponse> {
        if token.is_empty() {
            return Err(AppResponse::Unauthorized("Missing session token".to_string()));
        }

        let sessions = self.store.get_collection(SESSIONS_COLLECTION);
        let session: Session = self
            .store
            .get_by_id(&sessions, token)?
            .ok_or_else(|| AppResponse::Unauthorized("Invalid session token".to_string()))?;

        if session.expires_at.is_some_and(|expires| expires <= Utc::now()) {
            return Err(AppResponse::Unauthorized("Session expired".to_string()));
        }

        let accounts = self.store.get_collection(ACCOUNTS_COLLECTION);
        self.store
            .get_by_id(&accounts, &session.user)?
            .ok_or_else(|| AppResponse::Unauthorized("Session owner no longer exists".to_string()))
    }

    /// Signs a one-day HS256 token carrying `email`.
    pub fn issue_verification_token(&self, email: &str) -> Result<String, AppResponse> {
        let now = Utc::now();
        let claims = VerificationClaims {
            email: email.to_string(),
            iss: self.config.domain.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS)).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.client_private_key.as_bytes()),
        )
        .map_err(AppResponse::from)
    }

    /// Validates a verification token and returns the e-mail it carries.
    pub fn verify_email_token(&self, token: &str) -> Result<String, AppResponse> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.domain.as_str()]);

        let data = decode::<VerificationClaims>(
            token,
            &DecodingKey::from_secret(self.config.client_private_key.as_bytes()),
            &validation,
        )?;
        Ok(data.claims.email)
    }

    pub fn verification_link(&self, email: &str) -> Result<String, AppResponse> {
        let token = self.issue_verification_token(email)?;
        Ok(format!("{}/verify-email/{token}", self.config.public_url()))
    }

    /// Applies `update` to the session's account and saves it.
    ///
    /// Conflicting values are rejected before anything changes. Notification
    /// e-mails are sent after the account is saved.
    pub async fn update_account(&self, update: AccountUpdate) -> Result<Account, AppResponse> {
        let mut account = self.authenticate(&update.token)?;
        let old_account = account.clone();

        let password = non_empty(update.password);
        let displayname = non_empty(update.displayname);
        let email = non_empty(update.email);

        if displayname.as_deref() == Some(account.displayname.as_str()) {
            return Err(AppResponse::ValidationError(
                "This username is already the one you're currently using.".to_string(),
            ));
        }
        if email.as_deref() == Some(account.email.as_str()) {
            return Err(AppResponse::ValidationError(
                "This e-mail address is already the one you're currently using".to_string(),
            ));
        }

        let bio = match non_empty(update.bio) {
            Some(raw) => Some(
                urlencoding::decode(&raw)
                    .map_err(|e| AppResponse::ValidationError(format!("Invalid bio encoding: {e}")))?
                    .into_owned(),
            ),
            None => None,
        };

        let mut outbox = Vec::new();

        if let Some(password) = password {
            account.password = bcrypt::hash(password, self.config.salt_rounds)?;
            outbox.push(Notification {
                to: account.email.clone(),
                template: EmailTemplate::PasswordChanged,
                new_displayname: None,
            });
        }

        if let Some(displayname) = displayname {
            account.username = displayname.to_lowercase();
            account.displayname = displayname.clone();
            outbox.push(Notification {
                to: account.email.clone(),
                template: EmailTemplate::UsernameChanged,
                new_displayname: Some(displayname),
            });
        }

        if let Some(email) = email {
            account.pending_email = Some(email.clone());
            account.email_verified = false;
            outbox.push(Notification {
                to: account.email.clone(),
                template: EmailTemplate::EmailReverificationPrevious,
                new_displayname: None,
            });
            outbox.push(Notification {
                to: email,
                template: EmailTemplate::EmailReverificationNext,
                new_displayname: None,
            });
        }

        if let Some(bio) = bio {
            account.bio = bio;
        }

        account.last_seen = Some(Utc::now());
        account.last_seen_reason = Some(LAST_SEEN_REASON.to_string());

        let accounts = self.store.get_collection(ACCOUNTS_COLLECTION);
        self.store.upsert(&accounts, &account)?;
        info!("Updated account {}", account.id);

        for notification in outbox {
            let template = notification.template;
            if let Err(e) = self.send_email(&account, &old_account, notification).await {
                error!("Failed to send {} e-mail for {}: {e}", template.as_str(), account.id);
            }
        }

        Ok(account)
    }

    /// Promotes the pending e-mail matching `token` to the account's address.
    pub fn confirm_pending_email(&self, token: &str) -> Result<Account, AppResponse> {
        let email = self.verify_email_token(token)?;
        let accounts = self.store.get_collection(ACCOUNTS_COLLECTION);

        let mut account = self
            .store
            .get_all::<Account>(&accounts)?
            .into_iter()
            .find(|account| account.pending_email.as_deref() == Some(email.as_str()))
            .ok_or_else(|| AppResponse::NotFound(format!("No account is waiting to verify {email}")))?;

        account.email = email;
        account.pending_email = None;
        account.email_verified = true;
        self.store.upsert(&accounts, &account)?;
        info!("Verified new e-mail for account {}", account.id);

        Ok(account)
    }

    async fn send_email(
        &self,
        user: &Account,
        old_user: &Account,
        notification: Notification,
    ) -> Result<(), AppResponse> {
        if notification.to.is_empty() {
            return Err(AppResponse::ValidationError(
                "No email address defined in locals".to_string(),
            ));
        }

        let link = self.verification_link(&notification.to)?;
        let message = EmailMessage {
            to: notification.to.clone(),
            template: notification.template,
            locals: EmailLocals {
                user: user.clone(),
                old_user: old_user.clone(),
                email: notification.to,
                new_displayname: notification.new_displayname,
                link,
            },
        };

        self.mailer.send(message).await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
