use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{Error, QueryError},
    schema::Id,
    shopping::list::{CartIngredient, ShoppingList},
};

use sqlx::{Pool, Postgres};

/// Every ingredient amount of every recipe in the user's cart, one row per (recipe, ingredient).
pub async fn fetch_cart_ingredients(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartIngredient>, Error> {
    let rows: Vec<CartIngredient> = sqlx::query_as(
        "
        SELECT i.id AS ingredient_id, i.name, i.measurement_unit, ia.amount::BIGINT AS amount
        FROM shopping_carts c
        INNER JOIN ingredient_amounts ia ON ia.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Builds the consolidated shopping list for the caller's cart. Read only.
pub async fn download_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<ShoppingList, Error> {
    session.authenticate(ActionType::ManageOwnCart)?;

    let rows = fetch_cart_ingredients(session.user_id, pool).await?;
    log::trace!("Aggregating {} cart rows for {}", rows.len(), session.username);

    Ok(ShoppingList::aggregate(rows))
}
