//! Reset-token business logic - time-limited, single-use recovery codes.
//!
//! A code is six digits drawn from the operating system's CSPRNG. Issuing a
//! code replaces whatever code the account had before, so at most one token
//! is ever live per account, and a successful validation deletes the token
//! it matched. Code comparison runs in constant time.
//!
//! This module never sends anything; the caller forwards the code through
//! the notification dispatcher.

use crate::{
    core::account::{self, change_password},
    entities::{Account, ResetToken, account as account_entity, reset_token},
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use rand::Rng;
use sea_orm::{Set, TransactionTrait, prelude::*};
use subtle::ConstantTimeEq;

/// Number of digits in a reset code
const CODE_LEN: usize = 6;

/// Generates a random fixed-length numeric code.
fn generate_code() -> String {
    let mut rng = rand::rngs::OsRng;
    (0..CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Compares two codes without leaking a mismatch position through timing.
fn codes_match(supplied: &str, stored: &str) -> bool {
    supplied.len() == stored.len()
        && bool::from(supplied.as_bytes().ct_eq(stored.as_bytes()))
}

/// Issues a fresh reset token for an account.
///
/// Any prior token for the account is invalidated in the same database
/// transaction that stores the new one. Returns the stored token; its
/// `code` field is what the caller forwards to the account holder.
pub async fn issue(
    db: &DatabaseConnection,
    account_id: i64,
    ttl: Duration,
) -> Result<reset_token::Model> {
    Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            identity: account_id.to_string(),
        })?;

    let now = Utc::now();
    let txn = db.begin().await?;

    ResetToken::delete_many()
        .filter(reset_token::Column::AccountId.eq(account_id))
        .exec(&txn)
        .await?;

    let model = reset_token::ActiveModel {
        account_id: Set(account_id),
        code: Set(generate_code()),
        issued_at: Set(now),
        expires_at: Set(now + ttl),
        temp_password_hash: Set(None),
        ..Default::default()
    };
    let token = model.insert(&txn).await?;

    txn.commit().await?;
    Ok(token)
}

/// Validates a code for an account and consumes the token on success.
///
/// Outcomes, in order of checking: `TokenNotFound` when no live token
/// exists, `TokenExpired` when the expiry has passed, `CodeMismatch` when
/// the digits differ. On success the token row is deleted before returning,
/// so a second validation with the same code finds nothing. The delete is
/// keyed on the token id, which also settles the race between two
/// concurrent validations: only one of them removes the row.
pub async fn validate_and_consume(
    db: &DatabaseConnection,
    account_id: i64,
    code: &str,
) -> Result<()> {
    let token = ResetToken::find()
        .filter(reset_token::Column::AccountId.eq(account_id))
        .one(db)
        .await?
        .ok_or(Error::TokenNotFound)?;

    if Utc::now() > token.expires_at {
        return Err(Error::TokenExpired);
    }

    if !codes_match(code, &token.code) {
        return Err(Error::CodeMismatch);
    }

    let result = ResetToken::delete_many()
        .filter(reset_token::Column::Id.eq(token.id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        // A concurrent validation consumed it first
        return Err(Error::TokenNotFound);
    }

    Ok(())
}

/// Completes an account recovery: validates and consumes the code, then
/// stores the new password and clears the forced-change gate.
pub async fn complete_reset(
    db: &DatabaseConnection,
    account_id: i64,
    code: &str,
    new_password: &str,
) -> Result<account_entity::Model> {
    validate_and_consume(db, account_id, code).await?;
    change_password(db, account_id, new_password).await
}

/// Issues a token for the account holding the given email - the shape the
/// "forgot password" flow calls with. The email lookup is the only
/// difference from [`issue`].
pub async fn issue_for_email(
    db: &DatabaseConnection,
    email: &str,
    ttl: Duration,
) -> Result<reset_token::Model> {
    let account = account::get_account_by_email(db, email)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            identity: email.to_string(),
        })?;
    issue(db, account.id, ttl).await
}
