use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData, SessionKeys},
        permissions::ActionType,
    },
    error::{Error, HtmlError, QueryError},
    pagination::{Page, PageContext},
    schema::{validate_password, Id, NewUser, User, UserProfile, UserProfileRow, UserRole},
};

use sqlx::{Pool, Postgres};

const PROFILE_COLUMNS: &str = "
    u.id, u.email, u.username, u.first_name, u.last_name,
    EXISTS (SELECT 1 FROM subscriptions s WHERE s.user_id = $1 AND s.author_id = u.id) AS is_subscribed
";

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates a regular user. The password is stored hashed.
pub async fn register_user(user: NewUser, pool: &Pool<Postgres>) -> Result<UserProfile, Error> {
    user.validate()?;
    let password = hash_password(&user.password)?;

    let profile: UserProfile = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, email, username, first_name, last_name, FALSE AS is_subscribed
    ",
    )
    .bind(user.email.trim())
    .bind(&user.username)
    .bind(user.first_name.trim())
    .bind(user.last_name.trim())
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        let e = QueryError::from(e);
        match e.is_unique_violation() {
            true => HtmlError::InvalidRequest.new("A user with this email or username already exists"),
            false => e.into(),
        }
    })?;

    log::info!("Registered user {} ({})", profile.username, profile.id);
    Ok(profile)
}

/// Logs in with email and password, returning a session token.
pub async fn login_user(
    email: &str,
    password: &str,
    keys: &SessionKeys,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let Some(user) = get_user_by_email(pool, email).await? else {
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    };

    if !verify_password(password, &user.password)? {
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    }

    generate_jwt_session(&user, keys)
}

pub async fn get_profile(
    user_id: Id,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, Error> {
    let profile: Option<UserProfile> =
        sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = $2"))
            .bind(viewer.map(|session| session.user_id))
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    profile.ok_or_else(|| HtmlError::NotFound.new("No user exists with specified id"))
}

pub async fn me(session: &SessionData, pool: &Pool<Postgres>) -> Result<UserProfile, Error> {
    session.authenticate(ActionType::ManageOwnProfile)?;
    get_profile(session.user_id, Some(session), pool).await
}

pub async fn list_users(
    viewer: Option<&SessionData>,
    page: Page,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserProfile>, Error> {
    let rows: Vec<UserProfileRow> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS}, COUNT(*) OVER() AS count FROM users u ORDER BY u.id LIMIT $2 OFFSET $3"
    ))
    .bind(viewer.map(|session| session.user_id))
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.page > 1 => {
            let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await
                .map_err(QueryError::from)?;
            count.0
        }
        None => 0,
    };
    let rows = rows.into_iter().map(UserProfile::from).collect();

    Ok(PageContext::from_rows(rows, total_count, page))
}

pub async fn set_password(
    session: &SessionData,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnProfile)?;

    let user = get_user_by_id(pool, session.user_id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.new("User no longer exists"))?;

    if !verify_password(current_password, &user.password)? {
        return Err(HtmlError::InvalidRequest.new("Current password is incorrect"));
    }
    validate_password(new_password)?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(hash_password(new_password)?)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    log::info!("{} changed their password", user.username);
    Ok(())
}

pub async fn set_user_role(
    session: &SessionData,
    user_id: Id,
    role: UserRole,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageUsers)?;

    let result = sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
        .bind(role)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.new("No user exists with specified id"));
    }

    log::info!("{} set role of user {user_id} to {role:?}", session.username);
    Ok(())
}

/// Removes a user together with their recipes, lists and subscriptions.
pub async fn delete_user(session: &SessionData, user_id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    session.authenticate(ActionType::ManageUsers)?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.new("No user exists with specified id"));
    }

    log::info!("{} deleted user {user_id}", session.username);
    Ok(())
}
