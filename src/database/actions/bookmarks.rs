use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{Error, HtmlError, QueryError},
    pagination::{Page, PageContext},
    schema::{Id, RecipeShort, RecipeShortRow},
};

use sqlx::{Pool, Postgres};

/// Per-user recipe collections that are toggled on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(&self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_carts",
        }
    }

    fn action(&self) -> ActionType {
        match self {
            RecipeList::Favorites => ActionType::ManageOwnFavorites,
            RecipeList::ShoppingCart => ActionType::ManageOwnCart,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping cart",
        }
    }
}

pub async fn get_recipe_short(id: Id, pool: &Pool<Postgres>) -> Result<RecipeShort, Error> {
    let recipe: Option<RecipeShort> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    recipe.ok_or_else(|| HtmlError::NotFound.new("No recipe exists with specified id"))
}

pub async fn is_listed(
    list: RecipeList,
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Id,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE recipe_id = $1 AND user_id = $2",
        list.table()
    ))
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

/// Adds a recipe to one of the caller's lists. A second add of the same recipe is rejected.
pub async fn add_to_list(
    list: RecipeList,
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    session.authenticate(list.action())?;
    let recipe = get_recipe_short(recipe_id, pool).await?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        list.table()
    ))
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "Recipe is already in {}",
            list.label()
        )));
    }

    log::info!("{} added recipe {recipe_id} to {}", session.username, list.label());
    Ok(recipe)
}

/// Removes a recipe from one of the caller's lists.
/// Returns `false` when it was not listed; that is not an error.
pub async fn remove_from_list(
    list: RecipeList,
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    session.authenticate(list.action())?;
    get_recipe_short(recipe_id, pool).await?;

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    let removed = result.rows_affected() > 0;
    if removed {
        log::info!("{} removed recipe {recipe_id} from {}", session.username, list.label());
    }
    Ok(removed)
}

async fn count_listed(list: RecipeList, user_id: Id, pool: &Pool<Postgres>) -> Result<i64, Error> {
    let count: (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM {} WHERE user_id = $1",
        list.table()
    ))
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(count.0)
}

pub async fn fetch_list(
    list: RecipeList,
    session: &SessionData,
    page: Page,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeShort>, Error> {
    session.authenticate(list.action())?;

    let rows: Vec<RecipeShortRow> = sqlx::query_as(&format!(
        "
        SELECT r.id, r.name, r.image, r.cooking_time, COUNT(*) OVER() AS count
        FROM {} l
        INNER JOIN recipes r ON r.id = l.recipe_id
        WHERE l.user_id = $1
        ORDER BY l.pub_date DESC
        LIMIT $2 OFFSET $3
    ",
        list.table()
    ))
    .bind(session.user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.page > 1 => count_listed(list, session.user_id, pool).await?,
        None => 0,
    };
    let rows = rows.into_iter().map(RecipeShort::from).collect();

    Ok(PageContext::from_rows(rows, total_count, page))
}

pub async fn is_favorite(recipe_id: Id, user_id: Id, pool: &Pool<Postgres>) -> Result<bool, Error> {
    is_listed(RecipeList::Favorites, recipe_id, user_id, pool).await
}

pub async fn add_to_favorites(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    add_to_list(RecipeList::Favorites, session, recipe_id, pool).await
}

pub async fn remove_from_favorites(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    remove_from_list(RecipeList::Favorites, session, recipe_id, pool).await
}

pub async fn fetch_favorites(
    session: &SessionData,
    page: Page,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeShort>, Error> {
    fetch_list(RecipeList::Favorites, session, page, pool).await
}

pub async fn is_in_cart(recipe_id: Id, user_id: Id, pool: &Pool<Postgres>) -> Result<bool, Error> {
    is_listed(RecipeList::ShoppingCart, recipe_id, user_id, pool).await
}

pub async fn add_to_cart(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    add_to_list(RecipeList::ShoppingCart, session, recipe_id, pool).await
}

pub async fn remove_from_cart(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    remove_from_list(RecipeList::ShoppingCart, session, recipe_id, pool).await
}

pub async fn fetch_cart(
    session: &SessionData,
    page: Page,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeShort>, Error> {
    fetch_list(RecipeList::ShoppingCart, session, page, pool).await
}
