use std::collections::HashMap;

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{Error, HtmlError, QueryError},
    pagination::{Page, PageContext},
    schema::{AuthorRecipe, Id, RecipeShort, Subscription, SubscriptionRow, UserProfile},
};

use sqlx::{Pool, Postgres};

use super::users::get_user_by_id;

async fn author_recipes(
    author_ids: &[Id],
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<RecipeShort>>, Error> {
    let rows: Vec<AuthorRecipe> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM recipes
        WHERE author_id = ANY($1)
        ORDER BY pub_date DESC, id DESC
    ",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let limit = recipes_limit
        .and_then(|limit| usize::try_from(limit).ok())
        .unwrap_or(usize::MAX);

    let mut map: HashMap<Id, Vec<RecipeShort>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        let recipes = map.entry(row.author_id).or_default();
        if recipes.len() < limit {
            recipes.push(row.into());
        }
    });

    Ok(map)
}

fn subscription(row: SubscriptionRow, recipes: Vec<RecipeShort>) -> Subscription {
    Subscription {
        author: UserProfile {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: true,
        },
        recipes,
        recipes_count: row.recipes_count,
    }
}

const SUBSCRIPTION_QUERY: &str = "
    SELECT u.id, u.email, u.username, u.first_name, u.last_name,
        (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
        COUNT(*) OVER() AS count
    FROM subscriptions s
    INNER JOIN users u ON u.id = s.author_id
    WHERE s.user_id = $1
";

/// Follows an author. Following yourself or following twice is rejected.
pub async fn subscribe(
    session: &SessionData,
    author_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Subscription, Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(HtmlError::NotFound.new("No user exists with specified id"));
    }
    if author_id == session.user_id {
        return Err(HtmlError::InvalidRequest.new("You can't subscribe to yourself"));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this author"));
    }

    log::info!("{} subscribed to user {author_id}", session.username);
    get_subscription(session, author_id, recipes_limit, pool).await
}

pub async fn get_subscription(
    session: &SessionData,
    author_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Subscription, Error> {
    let row: Option<SubscriptionRow> =
        sqlx::query_as(&format!("{SUBSCRIPTION_QUERY} AND s.author_id = $2"))
            .bind(session.user_id)
            .bind(author_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    let Some(row) = row else {
        return Err(HtmlError::NotFound.new("You are not subscribed to this author"));
    };

    let mut recipes = author_recipes(&[author_id], recipes_limit, pool).await?;
    Ok(subscription(row, recipes.remove(&author_id).unwrap_or_default()))
}

/// Stops following an author. Returns `false` when there was nothing to remove.
pub async fn unsubscribe(
    session: &SessionData,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(HtmlError::NotFound.new("No user exists with specified id"));
    }

    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(session.user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    let removed = result.rows_affected() > 0;
    if removed {
        log::info!("{} unsubscribed from user {author_id}", session.username);
    }
    Ok(removed)
}

async fn count_subscriptions(user_id: Id, pool: &Pool<Postgres>) -> Result<i64, Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count.0)
}

pub async fn list_subscriptions(
    session: &SessionData,
    page: Page,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Subscription>, Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
        "{SUBSCRIPTION_QUERY} ORDER BY u.username LIMIT $2 OFFSET $3"
    ))
    .bind(session.user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.page > 1 => count_subscriptions(session.user_id, pool).await?,
        None => 0,
    };
    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut recipes = author_recipes(&ids, recipes_limit, pool).await?;

    let rows = rows
        .into_iter()
        .map(|row| {
            let author_recipes = recipes.remove(&row.id).unwrap_or_default();
            subscription(row, author_recipes)
        })
        .collect();

    Ok(PageContext::from_rows(rows, total_count, page))
}
