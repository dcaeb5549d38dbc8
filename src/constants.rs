pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_RECIPE_NAME_LENGTH: usize = 200;
pub const MAX_TAG_NAME_LENGTH: usize = 50;
pub const MAX_INGREDIENT_NAME_LENGTH: usize = 100;
pub const MAX_UNIT_LENGTH: usize = 50;

pub const SESSION_HEADER: &str = "authorization";
pub const SESSION_SCHEMES: &[&str] = &["Token", "Bearer"];

/// (name, color, slug)
pub const DEFAULT_TAGS: &[(&str, &str, &str)] = &[
    ("Breakfast", "#E26C2D", "breakfast"),
    ("Lunch", "#49B64E", "lunch"),
    ("Dinner", "#8775D2", "dinner"),
];
