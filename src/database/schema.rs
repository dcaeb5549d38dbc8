use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        MAX_EMAIL_LENGTH, MAX_INGREDIENT_NAME_LENGTH, MAX_RECIPE_NAME_LENGTH, MAX_TAG_NAME_LENGTH,
        MAX_UNIT_LENGTH, MAX_USERNAME_LENGTH, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT,
        MIN_PASSWORD_LENGTH,
    },
    error::TypeError,
};

pub type Id = i32;

#[derive(
    Clone, Copy, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
}

/// A user as seen by another (possibly anonymous) user.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserProfileRow {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub count: i64,
}

impl From<UserProfileRow> for UserProfile {
    fn from(value: UserProfileRow) -> Self {
        UserProfile {
            id: value.id,
            email: value.email,
            username: value.username,
            first_name: value.first_name,
            last_name: value.last_name,
            is_subscribed: value.is_subscribed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), TypeError> {
        if !is_valid_email(&self.email) {
            return Err(TypeError::new("Enter a valid email address"));
        }
        if self.username.is_empty()
            || self.username.chars().count() > MAX_USERNAME_LENGTH
            || !self
                .username
                .chars()
                .all(|c| c.is_alphanumeric() || "_.@+-".contains(c))
        {
            return Err(TypeError::new(
                "Username may contain only letters, digits and @/./+/-/_",
            ));
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(TypeError::new("First and last name are required"));
        }
        validate_password(&self.password)
    }
}

pub fn validate_password(password: &str) -> Result<(), TypeError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(TypeError::new("Password is too short"));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(TypeError::new("Password is entirely numeric"));
    }
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl NewTag {
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.name.trim().is_empty() || self.name.chars().count() > MAX_TAG_NAME_LENGTH {
            return Err(TypeError::new("Invalid tag name"));
        }
        let color = self.color.strip_prefix('#').unwrap_or("");
        if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::new("Color must be in #RRGGBB format"));
        }
        if self.slug.is_empty()
            || self.slug.len() > MAX_TAG_NAME_LENGTH
            || !self
                .slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TypeError::new(
                "Slug may contain only latin letters, digits, hyphens and underscores",
            ));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

impl NewIngredient {
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.name.trim().is_empty() || self.name.chars().count() > MAX_INGREDIENT_NAME_LENGTH {
            return Err(TypeError::new("Invalid ingredient name"));
        }
        if self.measurement_unit.trim().is_empty()
            || self.measurement_unit.chars().count() > MAX_UNIT_LENGTH
        {
            return Err(TypeError::new("Invalid measurement unit"));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// An ingredient amount joined with its ingredient, as listed on a recipe.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct RecipeIngredient {
    #[serde(skip_serializing)]
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeTag {
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<RecipeTag> for Tag {
    fn from(value: RecipeTag) -> Self {
        Tag {
            id: value.id,
            name: value.name,
            color: value.color,
            slug: value.slug,
        }
    }
}

/// Recipe row joined with its author and the viewer-relative flags.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Id,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
    pub author_id: Id,
    pub author_email: String,
    pub author_username: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_is_subscribed: bool,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub count: i64,
}

/// Read shape of a recipe.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeRead {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

impl RecipeRead {
    pub fn from_row(row: RecipeRow, tags: Vec<Tag>, ingredients: Vec<RecipeIngredient>) -> Self {
        Self {
            id: row.id,
            tags,
            author: UserProfile {
                id: row.author_id,
                email: row.author_email,
                username: row.author_username,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                is_subscribed: row.author_is_subscribed,
            },
            ingredients,
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            name: row.name,
            image: row.image,
            text: row.text,
            cooking_time: row.cooking_time,
            pub_date: row.pub_date,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct IngredientAmountWrite {
    pub id: Id,
    pub amount: i32,
}

/// Write shape of a recipe, used for both creation and full update.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeWrite {
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmountWrite>,
}

impl RecipeWrite {
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.name.trim().is_empty() || self.name.chars().count() > MAX_RECIPE_NAME_LENGTH {
            return Err(TypeError::new("Invalid recipe name"));
        }
        if self.text.trim().is_empty() {
            return Err(TypeError::new("Recipe description is required"));
        }
        if self.cooking_time < MIN_COOKING_TIME {
            return Err(TypeError::new("Minimal cooking time is 1"));
        }
        if self.ingredients.is_empty() {
            return Err(TypeError::new("Recipe needs at least one ingredient"));
        }

        let mut seen = HashSet::new();
        for part in self.ingredients.iter() {
            if part.amount < MIN_INGREDIENT_AMOUNT {
                return Err(TypeError::new("Minimal ingredient amount is 1"));
            }
            if !seen.insert(part.id) {
                return Err(TypeError::new("Ingredients must not repeat"));
            }
        }

        let mut seen = HashSet::new();
        if !self.tags.iter().all(|tag| seen.insert(*tag)) {
            return Err(TypeError::new("Tags must not repeat"));
        }
        Ok(())
    }
}

/// Short form of a recipe used by favorite/cart replies and subscription listings.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeShort {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AuthorRecipe {
    pub author_id: Id,
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<AuthorRecipe> for RecipeShort {
    fn from(value: AuthorRecipe) -> Self {
        RecipeShort {
            id: value.id,
            name: value.name,
            image: value.image,
            cooking_time: value.cooking_time,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeShortRow {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
    pub count: i64,
}

impl From<RecipeShortRow> for RecipeShort {
    fn from(value: RecipeShortRow) -> Self {
        RecipeShort {
            id: value.id,
            name: value.name,
            image: value.image,
            cooking_time: value.cooking_time,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct SubscriptionRow {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub recipes_count: i64,
    pub count: i64,
}

/// A followed author with their recipes.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    #[serde(flatten)]
    pub author: UserProfile,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}
