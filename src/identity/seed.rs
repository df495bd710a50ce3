use super::error::IdentityError;
use super::password::PasswordService;
use super::user::{NewUser, USERS_TABLE, UserType, normalize_email};
use crate::query::ConnectionExt;
use crate::transaction::DomainTransaction;
use tracing::info;

/// Password of every demo account.
pub const DEMO_PASSWORD: &str = "password";

struct DemoUser {
    firstname: &'static str,
    lastname: &'static str,
    email: &'static str,
    birthday: &'static str,
}

const DEMO_USERS: &[DemoUser] = &[DemoUser {
    firstname: "simple",
    lastname: "user",
    email: "simple.user@example.net",
    birthday: "01/01/1970",
}];

/// Inserts the active demo accounts that are not there yet, in one
/// transaction. Returns the ids of the inserted users.
pub async fn seed_demo_users(
    domain: &DomainTransaction,
    passwords: &PasswordService,
) -> Result<Vec<i64>, IdentityError> {
    let hashed_password = passwords.hash(DEMO_PASSWORD).await?;

    domain
        .run_in_transaction(
            || async {
                let mut inserted = Vec::new();
                for demo in DEMO_USERS {
                    let users = domain.get_connection().table(USERS_TABLE);
                    if users
                        .where_eq("email", normalize_email(demo.email))
                        .first()
                        .await?
                        .is_some()
                    {
                        continue;
                    }

                    let record = NewUser {
                        firstname: demo.firstname.to_string(),
                        lastname: demo.lastname.to_string(),
                        email: demo.email.to_string(),
                        birthday: demo.birthday.to_string(),
                        hashed_password: hashed_password.clone(),
                        user_type: UserType::User,
                    }
                    .into_record()
                    .with("isActive", true)
                    .with("isChecked", true);

                    let row = domain.get_connection().table(USERS_TABLE).insert(record).await?;
                    if let Some(id) = row.id() {
                        info!(user_id = id, email = demo.email, "demo user seeded");
                        inserted.push(id);
                    }
                }
                Ok::<_, IdentityError>(inserted)
            },
            None,
        )
        .await
}
