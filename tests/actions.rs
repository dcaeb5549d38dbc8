//! Runs against a live Postgres pointed to by `DATABASE_URL`; every test gets its own schema.
//! Tests return early when the variable is unset.

use foodgram_sdk::{
    actions::*,
    config::run_migrations,
    jwt::{SessionData, SessionKeys},
    schema::{IngredientAmountWrite, NewIngredient, NewTag, NewUser, RecipeWrite, UserRole},
    pagination::Page,
};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

async fn setup() -> Option<Pool<Postgres>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set, skipping");
        return None;
    };

    let schema = format!("test_{}", uuid::Uuid::new_v4().simple());
    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .unwrap();

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .after_connect(move |conn, _meta| {
            let sql = format!("SET search_path TO {schema}");
            Box::pin(async move {
                sqlx::query(&sql).execute(conn).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .unwrap();

    run_migrations(&pool).await.unwrap();
    Some(pool)
}

async fn user(name: &str, pool: &Pool<Postgres>) -> SessionData {
    let profile = register_user(
        NewUser {
            email: format!("{name}@example.com"),
            username: name.to_owned(),
            first_name: name.to_owned(),
            last_name: String::from("Tester"),
            password: String::from("Qwerty123"),
        },
        pool,
    )
    .await
    .unwrap();

    SessionData {
        user_id: profile.id,
        username: profile.username,
        role: UserRole::User,
        is_admin: false,
    }
}

fn admin() -> SessionData {
    SessionData {
        user_id: 0,
        username: String::from("admin"),
        role: UserRole::Admin,
        is_admin: true,
    }
}

async fn ingredient(name: &str, unit: &str, pool: &Pool<Postgres>) -> i32 {
    create_ingredient(
        &admin(),
        NewIngredient {
            name: name.to_owned(),
            measurement_unit: unit.to_owned(),
        },
        pool,
    )
    .await
    .unwrap()
    .id
}

fn recipe(name: &str, tags: Vec<i32>, ingredients: &[(i32, i32)]) -> RecipeWrite {
    RecipeWrite {
        name: name.to_owned(),
        text: String::from("Cook it"),
        image: String::from("images/dish.png"),
        cooking_time: 15,
        tags,
        ingredients: ingredients
            .iter()
            .map(|(id, amount)| IngredientAmountWrite {
                id: *id,
                amount: *amount,
            })
            .collect(),
    }
}

async fn count(sql: &str, id: i32, pool: &Pool<Postgres>) -> i64 {
    let row: (i64,) = sqlx::query_as(sql).bind(id).fetch_one(pool).await.unwrap();
    row.0
}

#[tokio::test]
async fn empty_cart_gives_empty_shopping_list() {
    let Some(pool) = setup().await else { return };
    let cook = user("empty", &pool).await;

    let list = download_shopping_list(&cook, &pool).await.unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn shared_ingredient_is_summed_across_cart() {
    let Some(pool) = setup().await else { return };
    let cook = user("cook", &pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    let milk = ingredient("Milk", "ml", &pool).await;
    let sugar = ingredient("Sugar", "g", &pool).await;

    let pancakes = create_recipe(&cook, recipe("Pancakes", vec![], &[(flour, 100), (milk, 200)]), &pool)
        .await
        .unwrap();
    let bread = create_recipe(&cook, recipe("Bread", vec![], &[(flour, 150)]), &pool)
        .await
        .unwrap();
    // Not in the cart, its sugar must not show up.
    create_recipe(&cook, recipe("Fudge", vec![], &[(sugar, 300)]), &pool)
        .await
        .unwrap();

    add_to_cart(&cook, pancakes.id, &pool).await.unwrap();
    add_to_cart(&cook, bread.id, &pool).await.unwrap();

    let list = download_shopping_list(&cook, &pool).await.unwrap();
    assert_eq!(list.lines(), vec!["Flour (250) — g", "Milk (200) — ml"]);
}

#[tokio::test]
async fn favoriting_twice_keeps_one_row() {
    let Some(pool) = setup().await else { return };
    let cook = user("fan", &pool).await;
    let salt = ingredient("Salt", "g", &pool).await;
    let soup = create_recipe(&cook, recipe("Soup", vec![], &[(salt, 5)]), &pool)
        .await
        .unwrap();

    add_to_favorites(&cook, soup.id, &pool).await.unwrap();
    let error = add_to_favorites(&cook, soup.id, &pool).await.unwrap_err();

    assert_eq!(error.code, 400);
    assert_eq!(
        count("SELECT COUNT(*) FROM favorites WHERE recipe_id = $1", soup.id, &pool).await,
        1
    );
    assert!(is_favorite(soup.id, cook.user_id, &pool).await.unwrap());
}

#[tokio::test]
async fn removing_absent_favorite_is_not_an_error() {
    let Some(pool) = setup().await else { return };
    let cook = user("idle", &pool).await;
    let salt = ingredient("Salt", "g", &pool).await;
    let soup = create_recipe(&cook, recipe("Soup", vec![], &[(salt, 5)]), &pool)
        .await
        .unwrap();

    assert!(!remove_from_favorites(&cook, soup.id, &pool).await.unwrap());
    assert_eq!(remove_from_cart(&cook, 999_999, &pool).await.unwrap_err().code, 404);
}

#[tokio::test]
async fn recipe_names_are_unique_per_author() {
    let Some(pool) = setup().await else { return };
    let first = user("first", &pool).await;
    let second = user("second", &pool).await;
    let egg = ingredient("Egg", "pcs", &pool).await;

    create_recipe(&first, recipe("Omelette", vec![], &[(egg, 2)]), &pool)
        .await
        .unwrap();
    let error = create_recipe(&first, recipe("Omelette", vec![], &[(egg, 3)]), &pool)
        .await
        .unwrap_err();
    assert_eq!(error.code, 400);

    assert!(create_recipe(&second, recipe("Omelette", vec![], &[(egg, 3)]), &pool)
        .await
        .is_ok());
}

#[tokio::test]
async fn subscribing_to_yourself_is_rejected() {
    let Some(pool) = setup().await else { return };
    let cook = user("narcissus", &pool).await;
    let other = user("echo", &pool).await;

    let error = subscribe(&cook, cook.user_id, None, &pool).await.unwrap_err();
    assert_eq!(error.code, 400);

    let subscription = subscribe(&cook, other.user_id, None, &pool).await.unwrap();
    assert!(subscription.author.is_subscribed);
    assert_eq!(subscribe(&cook, other.user_id, None, &pool).await.unwrap_err().code, 400);

    let page = list_subscriptions(&cook, Page::default(), None, &pool).await.unwrap();
    assert_eq!(page.total_rows, 1);
    assert_eq!(page.rows[0].author.username, "echo");

    assert!(unsubscribe(&cook, other.user_id, &pool).await.unwrap());
    assert!(!unsubscribe(&cook, other.user_id, &pool).await.unwrap());
}

#[tokio::test]
async fn deleting_recipe_cascades() {
    let Some(pool) = setup().await else { return };
    let cook = user("cleaner", &pool).await;
    let rice = ingredient("Rice", "g", &pool).await;
    let pilaf = create_recipe(&cook, recipe("Pilaf", vec![], &[(rice, 400)]), &pool)
        .await
        .unwrap();

    add_to_favorites(&cook, pilaf.id, &pool).await.unwrap();
    add_to_cart(&cook, pilaf.id, &pool).await.unwrap();
    delete_recipe(&cook, pilaf.id, &pool).await.unwrap();

    for table in ["ingredient_amounts", "favorites", "shopping_carts"] {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE recipe_id = $1");
        assert_eq!(count(&sql, pilaf.id, &pool).await, 0, "{table}");
    }
    assert_eq!(get_recipe(pilaf.id, None, &pool).await.unwrap_err().code, 404);
}

#[tokio::test]
async fn only_owner_may_edit() {
    let Some(pool) = setup().await else { return };
    let owner = user("owner", &pool).await;
    let stranger = user("stranger", &pool).await;
    let tea = ingredient("Tea", "g", &pool).await;
    let lemon = ingredient("Lemon", "pcs", &pool).await;
    let brew = create_recipe(&owner, recipe("Brew", vec![], &[(tea, 5)]), &pool)
        .await
        .unwrap();

    let error = update_recipe(&stranger, brew.id, recipe("Mine", vec![], &[(tea, 1)]), &pool)
        .await
        .unwrap_err();
    assert_eq!(error.code, 403);
    assert_eq!(delete_recipe(&stranger, brew.id, &pool).await.unwrap_err().code, 403);

    let updated = update_recipe(&owner, brew.id, recipe("Brew", vec![], &[(lemon, 1)]), &pool)
        .await
        .unwrap();
    assert_eq!(updated.ingredients.len(), 1);
    assert_eq!(updated.ingredients[0].name, "Lemon");
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let Some(pool) = setup().await else { return };
    let cook = user("sloppy", &pool).await;

    let error = create_recipe(&cook, recipe("Ghost", vec![], &[(424_242, 1)]), &pool)
        .await
        .unwrap_err();
    assert_eq!(error.code, 404);
}

fn tag(name: &str, color: &str) -> NewTag {
    NewTag {
        name: name.to_owned(),
        color: color.to_owned(),
        slug: name.to_lowercase(),
    }
}

#[tokio::test]
async fn recipe_filters() {
    let Some(pool) = setup().await else { return };
    let cook = user("filter", &pool).await;
    let other = user("other", &pool).await;
    let brunch = create_tag(&admin(), tag("Brunch", "#123456"), &pool, None)
        .await
        .unwrap();
    let supper = create_tag(&admin(), tag("Supper", "#654321"), &pool, None)
        .await
        .unwrap();
    create_tag(&admin(), tag("Snack", "#ABCDEF"), &pool, None)
        .await
        .unwrap();
    let oats = ingredient("Oats", "g", &pool).await;

    let porridge = create_recipe(&cook, recipe("Porridge", vec![brunch.id], &[(oats, 50)]), &pool)
        .await
        .unwrap();
    let granola = create_recipe(&other, recipe("Granola", vec![supper.id], &[(oats, 80)]), &pool)
        .await
        .unwrap();
    add_to_favorites(&other, porridge.id, &pool).await.unwrap();
    add_to_cart(&other, granola.id, &pool).await.unwrap();

    let by_tag = RecipeFilter {
        tags: vec![String::from("brunch")],
        ..RecipeFilter::default()
    };
    let page = list_recipes(&by_tag, None, &pool).await.unwrap();
    assert_eq!(page.total_rows, 1);
    assert_eq!(page.rows[0].tags[0].slug, "brunch");

    let any_tag = RecipeFilter {
        tags: vec![String::from("brunch"), String::from("supper")],
        ..RecipeFilter::default()
    };
    assert_eq!(list_recipes(&any_tag, None, &pool).await.unwrap().total_rows, 2);

    let unused_tag = RecipeFilter {
        tags: vec![String::from("snack")],
        ..RecipeFilter::default()
    };
    assert_eq!(list_recipes(&unused_tag, None, &pool).await.unwrap().total_rows, 0);

    let by_author = RecipeFilter {
        author: Some(other.user_id),
        ..RecipeFilter::default()
    };
    assert_eq!(list_recipes(&by_author, None, &pool).await.unwrap().rows[0].name, "Granola");

    let favorited = RecipeFilter {
        is_favorited: true,
        ..RecipeFilter::default()
    };
    let page = list_recipes(&favorited, Some(&other), &pool).await.unwrap();
    assert_eq!(page.total_rows, 1);
    assert!(page.rows[0].is_favorited);

    let in_cart = RecipeFilter {
        is_in_shopping_cart: true,
        ..RecipeFilter::default()
    };
    let page = list_recipes(&in_cart, Some(&other), &pool).await.unwrap();
    assert_eq!(page.total_rows, 1);
    assert_eq!(page.rows[0].name, "Granola");
    assert!(page.rows[0].is_in_shopping_cart);
    assert_eq!(list_recipes(&in_cart, Some(&cook), &pool).await.unwrap().total_rows, 0);

    // Anonymous viewers see everything, the flags are ignored.
    assert_eq!(list_recipes(&favorited, None, &pool).await.unwrap().total_rows, 2);
    assert_eq!(list_recipes(&in_cart, None, &pool).await.unwrap().total_rows, 2);

    let anonymous = get_recipe(granola.id, None, &pool).await.unwrap();
    assert!(!anonymous.is_favorited);
    assert!(!anonymous.is_in_shopping_cart);
    assert!(!anonymous.author.is_subscribed);

    let owner_view = get_recipe(porridge.id, Some(&other), &pool).await.unwrap();
    assert!(owner_view.is_favorited);
    assert!(!owner_view.is_in_shopping_cart);
}

#[tokio::test]
async fn page_past_the_end_keeps_total() {
    let Some(pool) = setup().await else { return };
    let cook = user("pager", &pool).await;
    let jam = ingredient("Jam", "g", &pool).await;
    let toast = create_recipe(&cook, recipe("Toast", vec![], &[(jam, 20)]), &pool)
        .await
        .unwrap();
    add_to_favorites(&cook, toast.id, &pool).await.unwrap();

    let far = Page::new(Some(5), Some(6));
    let filter = RecipeFilter {
        page: far,
        ..RecipeFilter::default()
    };
    let page = list_recipes(&filter, None, &pool).await.unwrap();
    assert!(page.rows.is_empty());
    assert_eq!(page.total_rows, 1);
    assert_eq!(page.prev_page, Some(1));

    let page = fetch_favorites(&cook, far, &pool).await.unwrap();
    assert_eq!(page.total_rows, 1);
    assert_eq!(page.prev_page, Some(1));

    let page = list_users(None, far, &pool).await.unwrap();
    assert_eq!(page.total_rows, 1);

    let huge = RecipeFilter {
        page: Page::new(Some(i64::MAX), None),
        ..RecipeFilter::default()
    };
    let page = list_recipes(&huge, None, &pool).await.unwrap();
    assert!(page.rows.is_empty());
    assert_eq!(page.total_rows, 1);
}

#[tokio::test]
async fn email_is_unique_regardless_of_case() {
    let Some(pool) = setup().await else { return };
    let keys = SessionKeys::new("secret", chrono::Duration::hours(1)).unwrap();
    let new_user = |email: &str, username: &str, password: &str| NewUser {
        email: email.to_owned(),
        username: username.to_owned(),
        first_name: String::from("Case"),
        last_name: String::from("Tester"),
        password: password.to_owned(),
    };

    register_user(new_user("Cook@example.com", "upper", "Password1"), &pool)
        .await
        .unwrap();
    let error = register_user(new_user("cook@example.com", "lower", "Password2"), &pool)
        .await
        .unwrap_err();
    assert_eq!(error.code, 400);

    assert!(login_user("cook@EXAMPLE.com", "Password1", &keys, &pool).await.is_ok());
    assert_eq!(
        login_user("cook@example.com", "Password2", &keys, &pool)
            .await
            .unwrap_err()
            .code,
        400
    );
}

#[tokio::test]
async fn deleting_user_cascades() {
    let Some(pool) = setup().await else { return };
    let cook = user("leaving", &pool).await;
    let fan = user("staying", &pool).await;
    let basil = ingredient("Basil", "g", &pool).await;
    let pesto = create_recipe(&cook, recipe("Pesto", vec![], &[(basil, 30)]), &pool)
        .await
        .unwrap();
    add_to_cart(&fan, pesto.id, &pool).await.unwrap();
    subscribe(&fan, cook.user_id, None, &pool).await.unwrap();

    assert_eq!(delete_user(&cook, fan.user_id, &pool).await.unwrap_err().code, 403);
    delete_user(&admin(), cook.user_id, &pool).await.unwrap();

    assert_eq!(get_recipe(pesto.id, None, &pool).await.unwrap_err().code, 404);
    assert!(download_shopping_list(&fan, &pool).await.unwrap().is_empty());
    assert_eq!(
        list_subscriptions(&fan, Page::default(), None, &pool)
            .await
            .unwrap()
            .total_rows,
        0
    );
    assert_eq!(delete_user(&admin(), cook.user_id, &pool).await.unwrap_err().code, 404);
}

#[tokio::test]
async fn ingredient_prefix_search() {
    let Some(pool) = setup().await else { return };
    let loaded = load_ingredients("Sugar,g\nsalt,g\nPepper,g\n", &pool).await.unwrap();
    assert_eq!(loaded, 3);
    assert_eq!(load_ingredients("Sugar,g\n", &pool).await.unwrap(), 0);

    let found = list_ingredients(Some("s"), &pool).await.unwrap();
    let names: Vec<&str> = found.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"salt") && names.contains(&"Sugar"));
}
