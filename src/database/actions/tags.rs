use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    error::{Error, HtmlError, QueryError},
    schema::{Id, NewTag, Tag},
};

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};

async fn fetch_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

/// Lists every tag, served from the cache when one is available.
pub async fn list_tags(
    pool: &Pool<Postgres>,
    cache: Option<&mut MultiplexedConnection>,
) -> Result<Vec<Tag>, Error> {
    match cache {
        Some(cache) => {
            let pool = pool.clone();
            let tags = RedisValue::<Vec<Tag>>::get_or(CacheKeyType::Tag.new("all"), cache, || {
                async move { fetch_tags(&pool).await }
            })
            .await?;

            Ok(tags.value)
        }
        None => fetch_tags(pool).await,
    }
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Tag, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    tag.ok_or_else(|| HtmlError::NotFound.new("No tag exists with specified id"))
}

pub async fn create_tag(
    session: &SessionData,
    tag: NewTag,
    pool: &Pool<Postgres>,
    cache: Option<&mut MultiplexedConnection>,
) -> Result<Tag, Error> {
    session.authenticate(ActionType::ManageTags)?;
    tag.validate()?;

    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(tag.name.trim())
    .bind(tag.color.to_uppercase())
    .bind(&tag.slug)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    if let Some(cache) = cache {
        CacheLifetime::BindTagCache.invalidate(cache).await?;
    }

    log::info!("{} created tag {}", session.username, tag.slug);
    Ok(tag)
}

pub async fn delete_tag(
    session: &SessionData,
    id: Id,
    pool: &Pool<Postgres>,
    cache: Option<&mut MultiplexedConnection>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageTags)?;

    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.new("No tag exists with specified id"));
    }

    if let Some(cache) = cache {
        CacheLifetime::BindTagCache.invalidate(cache).await?;
    }

    log::info!("{} deleted tag {id}", session.username);
    Ok(())
}

/// Ids from `ids` that have no tag row.
pub async fn missing_tags(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, Error> {
    let missing: Vec<(Id,)> = sqlx::query_as(
        "
        SELECT wanted.id FROM UNNEST($1::INT[]) AS wanted (id)
        WHERE NOT EXISTS (SELECT 1 FROM tags t WHERE t.id = wanted.id)
    ",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(missing.into_iter().map(|row| row.0).collect())
}
