use super::error::IdentityError;
use super::mail::{DisabledMailer, MailSender, activation_mail};
use super::password::PasswordService;
use super::repository::{StoreUserRepository, UserRepository};
use super::token::{TokenError, TokenService};
use super::user::{NewUser, User, UserType};
use crate::transaction::DomainTransaction;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex");
}

const BIRTHDAY_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const DEFAULT_MAIL_FROM: &str = "noreply@kompagnon.fr";
const DEFAULT_BASE_URL: &str = "http://localhost:3000/";

/// Registration form. Missing fields deserialize as empty strings so the
/// validator can report all of them at once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterUser {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub password: String,
    pub birthday: String,
}

impl RegisterUser {
    /// Returns the birthday normalized to `YYYY-MM-DD`.
    pub fn validate(&self) -> Result<String, IdentityError> {
        let mut errors = Vec::new();

        check_email(&self.email, &mut errors);
        for (value, message) in [
            (&self.firstname, "Firstname is required"),
            (&self.lastname, "Lastname is required"),
        ] {
            if value.trim().is_empty() {
                errors.push(message.to_string());
            }
        }

        let birthday = if self.birthday.trim().is_empty() {
            errors.push("Birthday is required".to_string());
            None
        } else {
            let parsed = parse_birthday(&self.birthday);
            if parsed.is_none() {
                errors.push("Birthday must be a valid date (YYYY-MM-DD or DD/MM/YYYY)".to_string());
            }
            parsed
        };

        errors.extend(
            PasswordService::validate_strength(&self.password)
                .into_iter()
                .map(str::to_string),
        );

        match birthday {
            Some(date) if errors.is_empty() => Ok(date.format("%Y-%m-%d").to_string()),
            _ => Err(IdentityError::Validation(errors)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<(), IdentityError> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        if self.password.is_empty() {
            errors.push("Password is required".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(IdentityError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub token: String,
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    let email = email.trim();
    if email.is_empty() {
        errors.push("Email is required".to_string());
    } else if !EMAIL.is_match(email) {
        errors.push("Invalid email format".to_string());
    }
}

fn parse_birthday(raw: &str) -> Option<NaiveDate> {
    BIRTHDAY_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw.trim(), format).ok())
}

/// Registration, activation and login of users.
///
/// Repository calls go through the ambient connection, so the steps grouped
/// under [`DomainTransaction::run_in_transaction`] here commit or roll back
/// together.
#[derive(Clone)]
pub struct IdentityService {
    domain: DomainTransaction,
    users: Arc<dyn UserRepository>,
    passwords: PasswordService,
    tokens: TokenService,
    mailer: Arc<dyn MailSender>,
    base_url: String,
}

impl IdentityService {
    pub fn new(domain: DomainTransaction, tokens: TokenService) -> Self {
        Self {
            users: Arc::new(StoreUserRepository::new(domain.clone())),
            domain,
            passwords: PasswordService::default(),
            tokens,
            mailer: Arc::new(DisabledMailer::new(DEFAULT_MAIL_FROM)),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_users(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = users;
        self
    }

    pub fn with_passwords(mut self, passwords: PasswordService) -> Self {
        self.passwords = passwords;
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn MailSender>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Prefix of the activation link; a trailing `/` is added when missing.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn domain(&self) -> &DomainTransaction {
        &self.domain
    }

    /// Creates an inactive user and mails them an activation link.
    ///
    /// The user row and the activation token are produced in one
    /// transaction: if the token cannot be issued the user is not kept.
    /// A failed mail is only logged.
    pub async fn register(&self, input: RegisterUser) -> Result<i64, IdentityError> {
        let birthday = input.validate()?;
        let hashed_password = self.passwords.hash(&input.password).await?;

        let new_user = NewUser {
            firstname: input.firstname.clone(),
            lastname: input.lastname.clone(),
            email: input.email.clone(),
            birthday,
            hashed_password,
            user_type: UserType::default(),
        };

        let users = &self.users;
        let tokens = &self.tokens;
        let (user_id, token) = self
            .domain
            .run_in_transaction(
                move || async move {
                    let user_id = users.create_new_user(new_user).await?;
                    let token = tokens.encode(user_id, None)?;
                    Ok::<_, IdentityError>((user_id, token))
                },
                None,
            )
            .await?;

        let mail = activation_mail(
            &self.base_url,
            input.firstname.trim(),
            input.lastname.trim(),
            input.email.trim(),
            &token,
        );
        if let Err(err) = self.mailer.send(mail).await {
            warn!(user_id, error = %err, "activation mail not sent");
        }

        info!(user_id, "user registered");
        Ok(user_id)
    }

    /// Activates the user named by an activation token.
    pub async fn activate(&self, token: Option<&str>) -> Result<User, IdentityError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                warn!("activation attempt without token");
                IdentityError::TokenRequired
            })?;

        let claims = self.tokens.decode(token).map_err(|err| match err {
            TokenError::NotConfigured => IdentityError::Token(err),
            other => IdentityError::InvalidActivationToken(other),
        })?;

        let users = &self.users;
        self.domain
            .run_in_transaction(
                move || async move {
                    match users.find_by_id(claims.user_id).await? {
                        Some(user) if !user.is_active => users.activate_user_by_id(user.id).await,
                        Some(user) => {
                            info!(user_id = user.id, "activation attempt for already active user");
                            Err(IdentityError::UserNotFoundOrAlreadyActive)
                        }
                        None => {
                            warn!(user_id = claims.user_id, "activation attempt for unknown user");
                            Err(IdentityError::UserNotFoundOrAlreadyActive)
                        }
                    }
                },
                None,
            )
            .await
    }

    pub async fn authenticate(&self, credentials: Credentials) -> Result<AuthenticatedUser, IdentityError> {
        credentials.validate()?;

        let user = self
            .users
            .find_by_email(&credentials.email)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        if !user.is_active {
            return Err(IdentityError::InactiveAccount);
        }

        let hashed = user.hashed_password.as_deref().unwrap_or_default();
        if !self.passwords.verify(&credentials.password, hashed).await? {
            warn!(user_id = user.id, "authentication failed");
            return Err(IdentityError::InvalidCredentials);
        }

        let token = self.tokens.encode(user.id, Some(user.user_type))?;
        self.users.update_last_logged_at(user.id).await?;

        info!(user_id = user.id, "user authenticated");
        Ok(AuthenticatedUser {
            user_id: user.id,
            token,
        })
    }

    pub async fn profile(&self, user_id: i64) -> Result<User, IdentityError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(IdentityError::UserNotFound(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabaseConfig;
    use crate::facade::Database;
    use crate::identity::migrations::migrator;
    use crate::identity::user::USERS_TABLE;
    use std::time::Duration;

    struct Fixture {
        db: Arc<Database>,
        mailer: Arc<DisabledMailer>,
        service: IdentityService,
    }

    async fn fixture(secret: Option<&str>) -> Fixture {
        let db = Arc::new(Database::new(DatabaseConfig::new("identity-service")));
        migrator().run(&db).await.unwrap();

        let mailer = Arc::new(DisabledMailer::new("noreply@kompagnon.fr"));
        let tokens = TokenService::new(secret.map(str::to_string), Duration::from_secs(3600));
        let service = IdentityService::new(DomainTransaction::new(db.clone()), tokens)
            .with_passwords(PasswordService::new(4))
            .with_mailer(mailer.clone())
            .with_base_url("http://localhost:3000");

        Fixture { db, mailer, service }
    }

    fn registration(email: &str) -> RegisterUser {
        RegisterUser {
            email: email.into(),
            firstname: "John".into(),
            lastname: "Doe".into(),
            password: "Str0ng!Pass".into(),
            birthday: "01/02/1990".into(),
        }
    }

    async fn activation_token(mailer: &DisabledMailer) -> String {
        let outbox = mailer.outbox().await;
        let mail = outbox.last().unwrap();
        let html = match &mail.body {
            crate::identity::mail::MailBody::Html(html) => html.clone(),
            other => panic!("expected html body, got {:?}", other),
        };
        let start = html.find("token=").unwrap() + "token=".len();
        let end = start + html[start..].find('"').unwrap();
        html[start..end].to_string()
    }

    async fn user_count(db: &Database) -> usize {
        db.table_stats(USERS_TABLE).await.unwrap().row_count
    }

    #[test]
    fn test_registration_validation_lists_every_problem() {
        let input = RegisterUser {
            email: "not-an-email".into(),
            birthday: "1990-13-45".into(),
            password: "weak".into(),
            ..RegisterUser::default()
        };
        let IdentityError::Validation(errors) = input.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.contains(&"Invalid email format".to_string()));
        assert!(errors.contains(&"Firstname is required".to_string()));
        assert!(errors.contains(&"Lastname is required".to_string()));
        assert!(errors.iter().any(|e| e.starts_with("Birthday must be a valid date")));
        assert!(errors.contains(&"Password must be at least 8 characters long".to_string()));
    }

    #[test]
    fn test_birthday_is_normalized() {
        assert_eq!(registration("a@b.fr").validate().unwrap(), "1990-02-01");

        let mut iso = registration("a@b.fr");
        iso.birthday = "1985-07-14".into();
        assert_eq!(iso.validate().unwrap(), "1985-07-14");
    }

    #[tokio::test]
    async fn test_register_creates_inactive_user_and_mails_link() {
        let fx = fixture(Some("secret")).await;
        let id = fx.service.register(registration("John.Doe@Example.net")).await.unwrap();

        let user = fx.service.profile(id).await.unwrap();
        assert_eq!(user.email, "john.doe@example.net");
        assert_eq!(user.birthday, "1990-02-01");
        assert!(!user.is_active);
        assert_ne!(user.hashed_password.as_deref(), Some("Str0ng!Pass"));

        let outbox = fx.mailer.outbox().await;
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "John.Doe@Example.net");

        let token = activation_token(&fx.mailer).await;
        assert_eq!(fx.service.tokens().decode(&token).unwrap().user_id, id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let fx = fixture(Some("secret")).await;
        fx.service.register(registration("dup@example.net")).await.unwrap();

        let err = fx.service.register(registration("DUP@example.net")).await.unwrap_err();
        assert!(matches!(err, IdentityError::EmailAlreadyExists));
        assert_eq!(user_count(&fx.db).await, 1);
    }

    #[tokio::test]
    async fn test_register_rolls_back_when_token_cannot_be_issued() {
        let fx = fixture(None).await;
        let err = fx.service.register(registration("nobody@example.net")).await.unwrap_err();

        assert!(matches!(err, IdentityError::Token(TokenError::NotConfigured)));
        assert_eq!(user_count(&fx.db).await, 0);
        assert!(fx.mailer.outbox().await.is_empty());
        assert_eq!(fx.db.stats().rolled_back, 1);
    }

    #[tokio::test]
    async fn test_activate() {
        let fx = fixture(Some("secret")).await;
        let id = fx.service.register(registration("act@example.net")).await.unwrap();
        let token = activation_token(&fx.mailer).await;

        let user = fx.service.activate(Some(&token)).await.unwrap();
        assert_eq!(user.id, id);
        assert!(user.is_active);

        let again = fx.service.activate(Some(&token)).await.unwrap_err();
        assert!(matches!(again, IdentityError::UserNotFoundOrAlreadyActive));
    }

    #[tokio::test]
    async fn test_activate_rejects_bad_tokens() {
        let fx = fixture(Some("secret")).await;

        assert!(matches!(
            fx.service.activate(None).await.unwrap_err(),
            IdentityError::TokenRequired
        ));
        assert!(matches!(
            fx.service.activate(Some("  ")).await.unwrap_err(),
            IdentityError::TokenRequired
        ));
        assert!(matches!(
            fx.service.activate(Some("garbage")).await.unwrap_err(),
            IdentityError::InvalidActivationToken(TokenError::Invalid)
        ));

        let unknown = fx.service.tokens().encode(999, None).unwrap();
        assert!(matches!(
            fx.service.activate(Some(&unknown)).await.unwrap_err(),
            IdentityError::UserNotFoundOrAlreadyActive
        ));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let fx = fixture(Some("secret")).await;
        let id = fx.service.register(registration("login@example.net")).await.unwrap();
        let credentials = |password: &str| Credentials {
            email: "login@example.net".into(),
            password: password.into(),
        };

        let inactive = fx.service.authenticate(credentials("Str0ng!Pass")).await.unwrap_err();
        assert!(matches!(inactive, IdentityError::InactiveAccount));

        let token = activation_token(&fx.mailer).await;
        fx.service.activate(Some(&token)).await.unwrap();

        let wrong = fx.service.authenticate(credentials("Wr0ng!Pass")).await.unwrap_err();
        assert!(matches!(wrong, IdentityError::InvalidCredentials));

        let auth = fx.service.authenticate(credentials("Str0ng!Pass")).await.unwrap();
        assert_eq!(auth.user_id, id);
        let claims = fx.service.tokens().decode(&auth.token).unwrap();
        assert_eq!(claims.user_type, Some(UserType::User));
        assert!(fx.service.profile(id).await.unwrap().last_logged_at.is_some());
    }

    #[tokio::test]
    async fn test_authenticate_unknown_or_malformed() {
        let fx = fixture(Some("secret")).await;

        let unknown = Credentials {
            email: "ghost@example.net".into(),
            password: "whatever".into(),
        };
        assert!(matches!(
            fx.service.authenticate(unknown).await.unwrap_err(),
            IdentityError::InvalidCredentials
        ));

        let malformed = Credentials::default();
        let IdentityError::Validation(errors) = fx.service.authenticate(malformed).await.unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors, vec!["Email is required", "Password is required"]);
    }

    #[tokio::test]
    async fn test_profile_of_missing_user() {
        let fx = fixture(Some("secret")).await;
        assert!(matches!(
            fx.service.profile(12).await.unwrap_err(),
            IdentityError::UserNotFound(12)
        ));
    }
}
