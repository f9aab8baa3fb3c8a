//! Account business logic - provisioning, login, and the forced-change gate.
//!
//! Accounts are always provisioned with a generated temporary password and
//! `must_change_password` set; there are no built-in credentials anywhere.
//! Until the holder changes the password, login resolves to
//! [`LoginOutcome::PasswordChangeRequired`] and the caller must withhold
//! everything except the password-change flow.
//!
//! Hashing uses Argon2id in PHC string format.

use crate::{
    entities::{Account, ResetToken, account, reset_token},
    errors::{Error, Result},
};
use argon2::{
    Argon2, PasswordHash,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::{Set, prelude::*};

/// Length of generated temporary passwords
const TEMP_PASSWORD_LEN: usize = 12;

/// Minimum accepted password length
const MIN_PASSWORD_LEN: usize = 8;

/// Result of a credential check.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Credentials valid, no gate in the way
    Authenticated(account::Model),
    /// Credentials valid, but the account must pick a new password before
    /// anything else is allowed
    PasswordChangeRequired(account::Model),
}

/// Hashes a password with Argon2id, returning the PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash {
            message: e.to_string(),
        })
}

/// Verifies a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|_| Error::PasswordHash {
        message: "stored hash is not a valid PHC string".to_string(),
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Generates a random alphanumeric temporary password.
fn generate_temp_password() -> String {
    rand::rngs::OsRng
        .sample_iter(&Alphanumeric)
        .take(TEMP_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Provisions a new account with a generated temporary password.
///
/// The account starts gated (`must_change_password = true`). Returns the
/// created account together with the cleartext temporary password for
/// one-time delivery to the holder; only the hash is stored.
pub async fn provision_account(
    db: &DatabaseConnection,
    email: &str,
    full_name: &str,
    role: &str,
) -> Result<(account::Model, String)> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::Config {
            message: format!("'{email}' is not a usable login email"),
        });
    }

    if get_account_by_email(db, &email).await?.is_some() {
        return Err(Error::Config {
            message: format!("An account already exists for {email}"),
        });
    }

    let temp_password = generate_temp_password();
    let model = account::ActiveModel {
        email: Set(email),
        full_name: Set(full_name.trim().to_string()),
        role: Set(role.to_string()),
        password_hash: Set(hash_password(&temp_password)?),
        must_change_password: Set(true),
        active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    Ok((created, temp_password))
}

/// Finds an account by login email.
pub async fn get_account_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<account::Model>> {
    Account::find()
        .filter(account::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Checks credentials and applies the forced-change gate.
///
/// Unknown accounts, inactive accounts, and wrong passwords all fail with
/// the same `InvalidCredentials`, so a caller cannot probe which emails
/// exist. A valid password on a gated account yields
/// [`LoginOutcome::PasswordChangeRequired`] rather than a session.
pub async fn login(db: &DatabaseConnection, email: &str, password: &str) -> Result<LoginOutcome> {
    let account = get_account_by_email(db, &email.trim().to_lowercase())
        .await?
        .filter(|a| a.active)
        .ok_or(Error::InvalidCredentials)?;

    if !verify_password(password, &account.password_hash)? {
        return Err(Error::InvalidCredentials);
    }

    if account.must_change_password {
        Ok(LoginOutcome::PasswordChangeRequired(account))
    } else {
        Ok(LoginOutcome::Authenticated(account))
    }
}

/// Sets a new password and clears the forced-change gate. This is the only
/// path that clears the flag.
pub async fn change_password(
    db: &DatabaseConnection,
    account_id: i64,
    new_password: &str,
) -> Result<account::Model> {
    if new_password.len() < MIN_PASSWORD_LEN {
        return Err(Error::Config {
            message: format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        });
    }

    let account = Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            identity: account_id.to_string(),
        })?;

    let mut active: account::ActiveModel = account.into();
    active.password_hash = Set(hash_password(new_password)?);
    active.must_change_password = Set(false);
    active.update(db).await.map_err(Into::into)
}

/// Deactivates an account; it can no longer log in but its records remain.
/// Any live reset token is invalidated with it.
pub async fn deactivate_account(db: &DatabaseConnection, account_id: i64) -> Result<()> {
    let account = Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            identity: account_id.to_string(),
        })?;

    let mut active: account::ActiveModel = account.into();
    active.active = Set(false);
    active.update(db).await?;

    ResetToken::delete_many()
        .filter(reset_token::Column::AccountId.eq(account_id))
        .exec(db)
        .await?;
    Ok(())
}
