//! Access Gate - the allow-list of shared access codes.

use crate::{
    entities::{AccessCode, access_code},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*, sea_query::OnConflict};

/// Returns whether `code` is present in the allow-list.
pub async fn is_valid_code<C>(db: &C, code: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::validation("Access code is required"));
    }

    let found = AccessCode::find_by_id(code.to_string()).one(db).await?;
    Ok(found.is_some())
}

/// Inserts the given codes, skipping any that already exist.
///
/// Returns the number of codes considered (blank entries are ignored).
pub async fn seed_codes<C, I, S>(db: &C, codes: I) -> Result<usize>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seeded = 0;
    for code in codes {
        let code = code.as_ref().trim();
        if code.is_empty() {
            continue;
        }

        let model = access_code::ActiveModel {
            code: Set(code.to_string()),
        };
        AccessCode::insert(model)
            .on_conflict(
                OnConflict::column(access_code::Column::Code)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        seeded += 1;
    }

    tracing::info!(count = seeded, "Access codes seeded");
    Ok(seeded)
}

/// Lists every configured access code.
pub async fn list_codes<C>(db: &C) -> Result<Vec<String>>
where
    C: ConnectionTrait,
{
    let codes = AccessCode::find().all(db).await?;
    Ok(codes.into_iter().map(|c| c.code).collect())
}
