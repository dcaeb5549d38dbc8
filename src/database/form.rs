use std::{collections::HashMap, str::FromStr};

use super::error::{Error, TypeError};

/// Raw query string pairs, in request order. Keys may repeat (`?tags=a&tags=b`).
pub type FormData = Vec<(String, String)>;

pub struct Form {
    inner: HashMap<String, Vec<String>>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        let mut inner: HashMap<String, Vec<String>> = HashMap::new();
        data.into_iter()
            .for_each(|(key, value)| inner.entry(key).or_default().push(value));

        Self { inner }
    }

    fn first(&self, key: &str) -> Option<&str> {
        self.inner
            .get(key)
            .and_then(|values| values.first())
            .map(|value| value.as_str())
    }

    /// Missing or empty keys are `None`; present but unparsable values are errors.
    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
    {
        match self.first(key) {
            Some("") | None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_e| {
                TypeError::new(&format!("Invalid number for '{key}'")).into()
            }),
        }
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .get(key)
            .map(|values| {
                values
                    .iter()
                    .filter(|value| !value.is_empty())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Accepts `1`/`true` and `0`/`false`.
    pub fn get_flag(&self, key: &str) -> Result<bool, Error> {
        match self.first(key) {
            None | Some("") => Ok(false),
            Some("1") | Some("true") => Ok(true),
            Some("0") | Some("false") => Ok(false),
            Some(_) => Err(TypeError::new(&format!("Invalid flag for '{key}'")).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn repeated_keys_are_collected_in_order() {
        let form = form(&[("tags", "lunch"), ("page", "2"), ("tags", "dinner")]);

        assert_eq!(form.get_all("tags"), vec!["lunch", "dinner"]);
        assert_eq!(form.get_all("author"), Vec::<String>::new());
    }

    #[test]
    fn numbers_are_optional_but_strict() {
        let form = form(&[("page", "3"), ("limit", "abc"), ("author", "")]);

        assert_eq!(form.get_number::<i64>("page").unwrap(), Some(3));
        assert_eq!(form.get_number::<i64>("missing").unwrap(), None);
        assert_eq!(form.get_number::<i32>("author").unwrap(), None);
        assert_eq!(form.get_number::<i64>("limit").unwrap_err().code, 400);
    }

    #[test]
    fn flags() {
        let form = form(&[("a", "1"), ("b", "false"), ("c", "yes")]);

        assert!(form.get_flag("a").unwrap());
        assert!(!form.get_flag("b").unwrap());
        assert!(!form.get_flag("missing").unwrap());
        assert!(form.get_flag("c").is_err());
    }
}
