use std::collections::HashMap;

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{Error, HtmlError, QueryError},
    form::{Form, FormData},
    pagination::{Page, PageContext},
    schema::{Id, Recipe, RecipeIngredient, RecipeRead, RecipeRow, RecipeTag, RecipeWrite, Tag},
};

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use super::{ingredients::missing_ingredients, tags::missing_tags};

/// Recipe listing filters as passed in the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    /// Tag slugs; a recipe matches when it carries any of them.
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub page: Page,
}

impl RecipeFilter {
    pub fn from_query(data: FormData) -> Result<Self, Error> {
        let form = Form::from_data(data);

        Ok(Self {
            author: form.get_number("author")?,
            tags: form.get_all("tags"),
            is_favorited: form.get_flag("is_favorited")?,
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart")?,
            page: Page::new(form.get_number("page")?, form.get_number("limit")?),
        })
    }
}

fn recipe_query<'a>(viewer: Option<Id>) -> QueryBuilder<'a, Postgres> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
        "
        SELECT r.id, r.name, r.text, r.image, r.cooking_time, r.pub_date,
            u.id AS author_id, u.email AS author_email, u.username AS author_username,
            u.first_name AS author_first_name, u.last_name AS author_last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = ",
    );
    query.push_bind(viewer);
    query.push(") AS author_is_subscribed, EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
    query.push_bind(viewer);
    query.push(") AS is_favorited, EXISTS (SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = ");
    query.push_bind(viewer);
    query.push(
        ") AS is_in_shopping_cart,
            COUNT(*) OVER() AS count
        FROM recipes r
        INNER JOIN users u ON u.id = r.author_id
        WHERE TRUE ",
    );
    query
}

async fn list_recipe_tags(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<Tag>>, Error> {
    let rows: Vec<RecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut map: HashMap<Id, Vec<Tag>> = HashMap::new();
    rows.into_iter()
        .for_each(|row| map.entry(row.recipe_id).or_default().push(row.into()));

    Ok(map)
}

async fn list_recipe_ingredients(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<RecipeIngredient>>, Error> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT ia.recipe_id, i.id, i.name, i.measurement_unit, ia.amount
        FROM ingredient_amounts ia
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE ia.recipe_id = ANY($1)
        ORDER BY ia.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut map: HashMap<Id, Vec<RecipeIngredient>> = HashMap::new();
    rows.into_iter()
        .for_each(|row| map.entry(row.recipe_id).or_default().push(row));

    Ok(map)
}

/// Attaches tags and ingredients to each row, preserving row order.
async fn read_recipes(rows: Vec<RecipeRow>, pool: &Pool<Postgres>) -> Result<Vec<RecipeRead>, Error> {
    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut tags = list_recipe_tags(&ids, pool).await?;
    let mut ingredients = list_recipe_ingredients(&ids, pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            RecipeRead::from_row(
                row,
                tags.remove(&id).unwrap_or_default(),
                ingredients.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}

/// Appends the listing predicates. The "me" flags have no meaning for anonymous viewers and are ignored for them.
fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter, viewer_id: Option<Id>) {
    if let Some(author) = filter.author {
        query.push("AND r.author_id = ").push_bind(author).push(" ");
    }
    if !filter.tags.is_empty() {
        query
            .push("AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
            .push_bind(filter.tags.clone())
            .push(")) ");
    }
    if let Some(viewer_id) = viewer_id {
        if filter.is_favorited {
            query
                .push("AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer_id)
                .push(") ");
        }
        if filter.is_in_shopping_cart {
            query
                .push("AND EXISTS (SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(viewer_id)
                .push(") ");
        }
    }
}

/// Total for pages past the end, where the window count has no row to ride on.
async fn count_recipes(
    filter: &RecipeFilter,
    viewer_id: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<i64, Error> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE ");
    push_filters(&mut query, filter, viewer_id);

    let count: (i64,) = query
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count.0)
}

pub async fn list_recipes(
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRead>, Error> {
    let viewer_id = viewer.map(|session| session.user_id);
    let mut query = recipe_query(viewer_id);
    push_filters(&mut query, filter, viewer_id);
    query
        .push("ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(filter.page.limit)
        .push(" OFFSET ")
        .push_bind(filter.page.offset());

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if filter.page.page > 1 => count_recipes(filter, viewer_id, pool).await?,
        None => 0,
    };
    let rows = read_recipes(rows, pool).await?;

    Ok(PageContext::from_rows(rows, total_count, filter.page))
}

pub async fn get_recipe(
    id: Id,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeRead, Error> {
    let mut query = recipe_query(viewer.map(|session| session.user_id));
    query.push("AND r.id = ").push_bind(id);

    let row: Option<RecipeRow> = query
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    let Some(row) = row else {
        return Err(HtmlError::NotFound.new("No recipe exists with specified id"));
    };

    read_recipes(vec![row], pool)
        .await?
        .pop()
        .ok_or_else(|| HtmlError::NotFound.new("No recipe exists with specified id"))
}

pub async fn get_recipe_row(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Fetches a recipe the caller is allowed to modify.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe_row(id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.new("No recipe exists with specified id"))?;

    session.authenticate_owner(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    Ok(recipe)
}

async fn check_references(recipe: &RecipeWrite, pool: &Pool<Postgres>) -> Result<(), Error> {
    let missing = missing_tags(&recipe.tags, pool).await?;
    if !missing.is_empty() {
        return Err(HtmlError::NotFound.new(&format!("Unknown tags: {missing:?}")));
    }

    let ids: Vec<Id> = recipe.ingredients.iter().map(|part| part.id).collect();
    let missing = missing_ingredients(&ids, pool).await?;
    if !missing.is_empty() {
        return Err(HtmlError::NotFound.new(&format!("Unknown ingredients: {missing:?}")));
    }
    Ok(())
}

fn duplicate_name(e: sqlx::Error) -> Error {
    let e = QueryError::from(e);
    if e.is_unique_violation() {
        return HtmlError::InvalidRequest.new("You already have a recipe with this name");
    }
    e.into()
}

async fn insert_links(
    recipe_id: Id,
    recipe: &RecipeWrite,
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    if !recipe.tags.is_empty() {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        query.push_values(recipe.tags.iter(), |mut b, tag_id| {
            b.push_bind(recipe_id).push_bind(*tag_id);
        });
        query
            .build()
            .execute(&mut **tr)
            .await
            .map_err(QueryError::from)?;
    }

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO ingredient_amounts (recipe_id, ingredient_id, amount) ");
    query.push_values(recipe.ingredients.iter(), |mut b, part| {
        b.push_bind(recipe_id).push_bind(part.id).push_bind(part.amount);
    });
    query
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Creates a recipe with its tags and ingredient amounts in one transaction.
pub async fn create_recipe(
    session: &SessionData,
    recipe: RecipeWrite,
    pool: &Pool<Postgres>,
) -> Result<RecipeRead, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    recipe.validate()?;
    check_references(&recipe, pool).await?;

    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(recipe.name.trim())
    .bind(&recipe.text)
    .bind(&recipe.image)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(duplicate_name)?;

    insert_links(id.0, &recipe, &mut tr).await?;
    tr.commit().await.map_err(QueryError::from)?;

    log::info!("{} created recipe {} ({})", session.username, recipe.name, id.0);
    get_recipe(id.0, Some(session), pool).await
}

/// Replaces every field, tag and ingredient amount of a recipe.
pub async fn update_recipe(
    session: &SessionData,
    id: Id,
    recipe: RecipeWrite,
    pool: &Pool<Postgres>,
) -> Result<RecipeRead, Error> {
    get_recipe_mut(id, session, pool).await?;
    recipe.validate()?;
    check_references(&recipe, pool).await?;

    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query("UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5")
        .bind(recipe.name.trim())
        .bind(&recipe.text)
        .bind(&recipe.image)
        .bind(recipe.cooking_time)
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(duplicate_name)?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM ingredient_amounts WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    insert_links(id, &recipe, &mut tr).await?;
    tr.commit().await.map_err(QueryError::from)?;

    log::info!("{} updated recipe {id}", session.username);
    get_recipe(id, Some(session), pool).await
}

/// Deletes a recipe; tag links, amounts, favorites and cart entries go with it.
pub async fn delete_recipe(
    session: &SessionData,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    log::info!("{} deleted recipe {id}", session.username);
    Ok(())
}
