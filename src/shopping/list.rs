use std::collections::HashMap;

use serde::Serialize;

use crate::schema::Id;

/// One ingredient amount of one recipe in a user's cart.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct CartIngredient {
    pub ingredient_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShoppingListItem {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl ShoppingListItem {
    pub fn line(&self) -> String {
        format!("{} ({}) — {}", self.name, self.amount, self.measurement_unit)
    }
}

/// Ingredients needed for every recipe in a cart, one entry per ingredient.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ShoppingList {
    pub items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    /// Groups rows by ingredient id and sums their amounts.
    /// Items are ordered by name, ties broken by id.
    pub fn aggregate<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = CartIngredient>,
    {
        let mut grouped: HashMap<Id, ShoppingListItem> = HashMap::new();

        for row in rows {
            grouped
                .entry(row.ingredient_id)
                .and_modify(|item| item.amount += row.amount)
                .or_insert_with(|| ShoppingListItem {
                    id: row.ingredient_id,
                    name: row.name,
                    measurement_unit: row.measurement_unit,
                    amount: row.amount,
                });
        }

        let mut items: Vec<ShoppingListItem> = grouped.into_values().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        self.items.iter().map(ShoppingListItem::line).collect()
    }

    /// Plain text body, one line per ingredient.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{}\n", item.line()))
            .collect()
    }
}
