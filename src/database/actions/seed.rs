use crate::{
    constants::DEFAULT_TAGS,
    error::{Error, QueryError, TypeError},
    schema::{NewIngredient, NewTag},
};

use sqlx::{Pool, Postgres, QueryBuilder};

// Bind parameters per statement are capped at 65535.
const INGREDIENT_BATCH: usize = 65535 / 2;

/// Splits one CSV record, honouring double quotes and `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = vec![];
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', _) => quoted = !quoted,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Parses `name,unit` lines. Blank lines are skipped.
pub fn parse_ingredients(csv: &str) -> Result<Vec<NewIngredient>, TypeError> {
    csv.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let fields = split_record(line);
            let ingredient = match fields.as_slice() {
                [name, unit] => NewIngredient {
                    name: name.trim().to_owned(),
                    measurement_unit: unit.trim().to_owned(),
                },
                _ => return Err(TypeError::new(&format!("Line {}: expected name,unit", n + 1))),
            };
            ingredient
                .validate()
                .map_err(|e| TypeError::new(&format!("Line {}: {e}", n + 1)))?;
            Ok(ingredient)
        })
        .collect()
}

/// Inserts the default tags, leaving existing ones untouched. Returns how many were added.
pub async fn load_tags(pool: &Pool<Postgres>) -> Result<u64, Error> {
    let mut inserted = 0;

    for (name, color, slug) in DEFAULT_TAGS {
        let tag = NewTag {
            name: name.to_string(),
            color: color.to_string(),
            slug: slug.to_string(),
        };
        tag.validate()?;

        let result = sqlx::query(
            "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(tag.name)
        .bind(tag.color)
        .bind(tag.slug)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

        inserted += result.rows_affected();
    }

    log::info!("Loaded {inserted} tags");
    Ok(inserted)
}

/// Loads ingredients from CSV text, skipping names that already exist.
pub async fn load_ingredients(csv: &str, pool: &Pool<Postgres>) -> Result<u64, Error> {
    let ingredients = parse_ingredients(csv)?;
    let mut inserted = 0;

    for batch in ingredients.chunks(INGREDIENT_BATCH) {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
        query.push_values(batch, |mut b, ingredient| {
            b.push_bind(ingredient.name.clone())
                .push_bind(ingredient.measurement_unit.clone());
        });
        query.push(" ON CONFLICT DO NOTHING");

        let result = query
            .build()
            .execute(pool)
            .await
            .map_err(QueryError::from)?;

        inserted += result.rows_affected();
    }

    log::info!("Loaded {inserted} of {} ingredients", ingredients.len());
    Ok(inserted)
}
