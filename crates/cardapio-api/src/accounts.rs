//! Account service: local registration and login, federated login upsert
//!
//! Linking rule for federated logins: an existing account found by email is
//! linked to the provider identity only when the provider vouches for that
//! email. The rule is the same for password accounts and for accounts
//! already linked to the other provider. Linking only ever adds a login
//! method.

use std::future::Future;

use cardapio_auth::{
    hash_password, password::verify_against_dummy, verify_password, FederatedIdentity,
    PasswordError, Provider, SessionError,
};
use cardapio_db::entities::user;
use cardapio_db::repository::users::{self, NewUser};
use cardapio_db::RepoError;
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("field '{0}' is required")]
    MissingField(&'static str),

    #[error("email already registered")]
    EmailTaken,

    #[error("login failed")]
    LoginFailed,

    #[error("{0} did not verify the email address")]
    EmailNotVerified(Provider),

    #[error("account is linked to a different {0} identity")]
    IdentityMismatch(Provider),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Which login methods an account has
///
/// Methods are independent: a request is checked only against the method
/// it uses, so in `Mixed` no method takes precedence over another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethods {
    LocalOnly,
    GoogleLinked,
    FacebookLinked,
    Mixed,
}

impl AuthMethods {
    pub fn of(user: &user::Model) -> Self {
        let password = user.password_hash.is_some();
        let methods = [password, user.google_login, user.facebook_login]
            .iter()
            .filter(|enabled| **enabled)
            .count();

        match methods {
            0 | 1 if user.google_login => AuthMethods::GoogleLinked,
            0 | 1 if user.facebook_login => AuthMethods::FacebookLinked,
            0 | 1 => AuthMethods::LocalOnly,
            _ => AuthMethods::Mixed,
        }
    }
}

fn required(value: Option<&str>, field: &'static str) -> Result<String, AccountError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AccountError::MissingField(field)),
    }
}

/// Emails are compared case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create a password account
pub async fn register(
    db: &DatabaseConnection,
    name: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<user::Model, AccountError> {
    let name = required(name, "nome")?;
    let email = normalize_email(&required(email, "email")?);
    // The secret is opaque: no trimming
    let password = match password {
        Some(p) if !p.is_empty() => p,
        _ => return Err(AccountError::MissingField("senha")),
    };

    if users::exists_by_email(db, &email).await? {
        return Err(AccountError::EmailTaken);
    }

    let password_hash = hash_password(password)?;

    let created = users::create(
        db,
        NewUser {
            name,
            email,
            password_hash: Some(password_hash),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| match e {
        // Lost a race against another registration
        RepoError::Conflict(_) => AccountError::EmailTaken,
        other => other.into(),
    })?;

    info!(user_id = created.id, "Registered local account");
    Ok(created)
}

/// Check an email/password pair.
///
/// Unknown email, an account without a password and a wrong password all
/// end in [`AccountError::LoginFailed`].
pub async fn login_local(
    db: &DatabaseConnection,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<user::Model, AccountError> {
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AccountError::LoginFailed);
    };
    let email = normalize_email(email);

    let Some(account) = users::find_by_email(db, &email).await? else {
        verify_against_dummy(password);
        warn!("Login rejected: unknown email");
        return Err(AccountError::LoginFailed);
    };

    let Some(hash) = account.password_hash.as_deref() else {
        verify_against_dummy(password);
        warn!(user_id = account.id, "Login rejected: account has no password");
        return Err(AccountError::LoginFailed);
    };

    match verify_password(password, hash) {
        Ok(true) => {
            debug!(user_id = account.id, "Password login accepted");
            Ok(account)
        }
        Ok(false) => {
            warn!(user_id = account.id, "Login rejected: wrong password");
            Err(AccountError::LoginFailed)
        }
        Err(e) => {
            error!(user_id = account.id, "Stored password hash unusable: {}", e);
            Err(AccountError::LoginFailed)
        }
    }
}

fn federated_id(account: &user::Model, provider: Provider) -> Option<&str> {
    match provider {
        Provider::Google => account.google_id.as_deref(),
        Provider::Facebook => account.facebook_id.as_deref(),
    }
}

async fn find_by_federated_id<C: ConnectionTrait>(
    db: &C,
    provider: Provider,
    subject: &str,
) -> Result<Option<user::Model>, RepoError> {
    match provider {
        Provider::Google => users::find_by_google_id(db, subject).await,
        Provider::Facebook => users::find_by_facebook_id(db, subject).await,
    }
}

/// Find or create the account behind a federated identity.
///
/// Runs in one transaction. A concurrent first login for the same identity
/// makes one insert fail on the unique indexes; that attempt is retried once
/// and then finds the row the other request created.
pub async fn login_federated(
    db: &DatabaseConnection,
    identity: &FederatedIdentity,
) -> Result<user::Model, AccountError> {
    retry_on_conflict(|| upsert_federated(db, identity)).await
}

/// Run `attempt`, and once more if it lost a race on a unique index
async fn retry_on_conflict<T, F, Fut>(mut attempt: F) -> Result<T, AccountError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AccountError>>,
{
    match attempt().await {
        Err(AccountError::Repo(RepoError::Conflict(detail))) => {
            debug!("Federated upsert raced ({}), retrying", detail);
            attempt().await
        }
        result => result,
    }
}

async fn upsert_federated(
    db: &DatabaseConnection,
    identity: &FederatedIdentity,
) -> Result<user::Model, AccountError> {
    let provider = identity.provider;
    let email = normalize_email(&identity.email);
    if identity.subject.is_empty() || email.is_empty() {
        return Err(AccountError::LoginFailed);
    }

    let txn = db.begin().await.map_err(RepoError::from)?;

    let account = match find_by_federated_id(&txn, provider, &identity.subject).await? {
        Some(existing) => existing,
        None => match users::find_by_email(&txn, &email).await? {
            Some(existing) => {
                if let Some(current) = federated_id(&existing, provider) {
                    if current != identity.subject {
                        warn!(
                            user_id = existing.id,
                            %provider,
                            "Federated login rejected: account bound to another identity"
                        );
                        return Err(AccountError::IdentityMismatch(provider));
                    }
                }
                if !identity.email_verified {
                    warn!(
                        user_id = existing.id,
                        %provider,
                        "Federated login rejected: email not verified"
                    );
                    return Err(AccountError::EmailNotVerified(provider));
                }

                let user_id = existing.id;
                let mut model: user::ActiveModel = existing.into();
                match provider {
                    Provider::Google => {
                        model.google_login = Set(true);
                        model.google_id = Set(Some(identity.subject.clone()));
                    }
                    Provider::Facebook => {
                        model.facebook_login = Set(true);
                        model.facebook_id = Set(Some(identity.subject.clone()));
                    }
                }
                let linked = users::save(&txn, model).await?;
                info!(user_id, %provider, "Linked federated identity to existing account");
                linked
            }
            None => {
                let (google_id, facebook_id) = match provider {
                    Provider::Google => (Some(identity.subject.clone()), None),
                    Provider::Facebook => (None, Some(identity.subject.clone())),
                };
                let name = match identity.name.trim() {
                    "" => email.clone(),
                    n => n.to_string(),
                };

                let created = users::create(
                    &txn,
                    NewUser {
                        name,
                        email,
                        password_hash: None,
                        google_id,
                        facebook_id,
                    },
                )
                .await?;
                info!(user_id = created.id, %provider, "Created account from federated login");
                created
            }
        },
    };

    let name = identity.name.trim();
    let account = if !name.is_empty() && account.name != name {
        let mut model: user::ActiveModel = account.into();
        model.name = Set(name.to_string());
        users::save(&txn, model).await?
    } else {
        account
    };

    txn.commit().await.map_err(RepoError::from)?;
    Ok(account)
}

/// Delete an account and everything it owns
pub async fn delete_account(db: &DatabaseConnection, user_id: i32) -> Result<bool, AccountError> {
    let deleted = users::delete_by_id(db, user_id).await?;
    if deleted {
        info!(user_id, "Deleted account");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(password: bool, google: bool, facebook: bool) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: 1,
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: password.then(|| "$argon2id$x".to_string()),
            google_login: google,
            google_id: google.then(|| "g-1".to_string()),
            facebook_login: facebook,
            facebook_id: facebook.then(|| "f-1".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_auth_methods_states() {
        assert_eq!(AuthMethods::of(&account(true, false, false)), AuthMethods::LocalOnly);
        assert_eq!(AuthMethods::of(&account(false, true, false)), AuthMethods::GoogleLinked);
        assert_eq!(
            AuthMethods::of(&account(false, false, true)),
            AuthMethods::FacebookLinked
        );
        assert_eq!(AuthMethods::of(&account(true, true, false)), AuthMethods::Mixed);
        assert_eq!(AuthMethods::of(&account(false, true, true)), AuthMethods::Mixed);
        assert_eq!(AuthMethods::of(&account(true, true, true)), AuthMethods::Mixed);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }

    #[test]
    fn test_required_field() {
        assert_eq!(required(Some(" Ana "), "nome").unwrap(), "Ana");
        assert!(matches!(
            required(Some("   "), "nome"),
            Err(AccountError::MissingField("nome"))
        ));
        assert!(matches!(
            required(None, "email"),
            Err(AccountError::MissingField("email"))
        ));
    }

    #[tokio::test]
    async fn test_conflict_is_retried_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = AtomicUsize::new(0);
        let result = retry_on_conflict(|| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(AccountError::Repo(RepoError::Conflict("users.google_id".into())))
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_conflict_is_returned() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry_on_conflict(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AccountError::Repo(RepoError::Conflict("users.email".into()))) }
        })
        .await;

        assert!(matches!(result, Err(AccountError::Repo(RepoError::Conflict(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry_on_conflict(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AccountError::LoginFailed) }
        })
        .await;

        assert!(matches!(result, Err(AccountError::LoginFailed)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_auth_methods_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&AuthMethods::GoogleLinked).unwrap(),
            "\"google_linked\""
        );
    }
}
