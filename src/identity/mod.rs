//! User accounts: registration, activation by mailed token, and login.

pub mod error;
pub mod mail;
pub mod migrations;
pub mod password;
pub mod repository;
pub mod seed;
pub mod service;
pub mod token;
pub mod user;

pub use error::IdentityError;
pub use mail::{DisabledMailer, HttpMailer, Mail, MailBody, MailError, MailReceipt, MailSender};
pub use password::PasswordService;
pub use repository::{StoreUserRepository, UserRepository};
pub use seed::seed_demo_users;
pub use service::{AuthenticatedUser, Credentials, IdentityService, RegisterUser};
pub use token::{Claims, TokenError, TokenService};
pub use user::{NewUser, User, UserType};
