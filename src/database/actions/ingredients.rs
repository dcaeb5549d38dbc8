use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    error::{Error, HtmlError, QueryError},
    schema::{Id, Ingredient, NewIngredient},
};

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};

/// Escapes LIKE wildcards so user input only ever matches literally.
fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{escaped}%")
}

/// Lists ingredients ordered by name, optionally narrowed to a case-insensitive name prefix.
pub async fn list_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let list: Vec<Ingredient> = match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
            .bind(like_prefix(name))
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(list)
}

async fn fetch_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let ingredient: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(ingredient)
}

pub async fn get_ingredient(
    id: Id,
    pool: &Pool<Postgres>,
    cache: Option<&mut MultiplexedConnection>,
) -> Result<Ingredient, Error> {
    let ingredient = match cache {
        Some(cache) => {
            let pool = pool.clone();
            RedisValue::<Ingredient>::get_or_optional(
                CacheKeyType::Ingredient.new(id),
                cache,
                || async move { fetch_ingredient(id, &pool).await },
            )
            .await?
            .map(|cached| cached.value)
        }
        None => fetch_ingredient(id, pool).await?,
    };

    ingredient.ok_or_else(|| HtmlError::NotFound.new("No ingredient exists with specified id"))
}

pub async fn create_ingredient(
    session: &SessionData,
    ingredient: NewIngredient,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, Error> {
    session.authenticate(ActionType::ManageIngredients)?;
    ingredient.validate()?;

    let ingredient: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(ingredient.name.trim())
    .bind(ingredient.measurement_unit.trim())
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("{} created ingredient {}", session.username, ingredient.name);
    Ok(ingredient)
}

pub async fn delete_ingredient(
    session: &SessionData,
    id: Id,
    pool: &Pool<Postgres>,
    cache: Option<&mut MultiplexedConnection>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageIngredients)?;

    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.new("No ingredient exists with specified id"));
    }

    if let Some(cache) = cache {
        CacheLifetime::BindIngredientCache.invalidate(cache).await?;
    }

    log::info!("{} deleted ingredient {id}", session.username);
    Ok(())
}

/// Ids from `ids` that have no ingredient row.
pub async fn missing_ingredients(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, Error> {
    let missing: Vec<(Id,)> = sqlx::query_as(
        "
        SELECT wanted.id FROM UNNEST($1::INT[]) AS wanted (id)
        WHERE NOT EXISTS (SELECT 1 FROM ingredients i WHERE i.id = wanted.id)
    ",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(missing.into_iter().map(|row| row.0).collect())
}
