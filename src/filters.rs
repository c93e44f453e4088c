//! Query-parameter filters for the list endpoints.

use thiserror::Error;

use crate::models::Recipe;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Expected a comma-separated list of integer ids, got {0:?}.")]
    InvalidIdList(String),
    #[error("A valid integer is required.")]
    InvalidFlag,
}

/// Restricts a recipe listing to recipes linked to at least one of the
/// given tag ids and at least one of the given ingredient ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<u64>>,
    pub ingredients: Option<Vec<u64>>,
}

impl RecipeFilter {
    pub fn matches(&self, recipe: &Recipe) -> bool {
        links_any(self.tags.as_deref(), &recipe.tags)
            && links_any(self.ingredients.as_deref(), &recipe.ingredients)
    }
}

fn links_any(wanted: Option<&[u64]>, linked: &[u64]) -> bool {
    match wanted {
        Some(ids) => linked.iter().any(|id| ids.contains(id)),
        None => true,
    }
}

/// Parses `"1,2,3"`. A blank value means "no filter".
pub fn parse_id_list(raw: &str) -> Result<Option<Vec<u64>>, FilterError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.split(',')
        .map(|part| part.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
        .map_err(|_| FilterError::InvalidIdList(raw.to_string()))
}

/// `assigned_only` is an integer flag; anything non-zero turns it on.
pub fn parse_assigned_only(raw: Option<&str>) -> Result<bool, FilterError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(false),
        Some(value) => value
            .parse::<i64>()
            .map(|flag| flag != 0)
            .map_err(|_| FilterError::InvalidFlag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::Price;

    fn recipe(tags: Vec<u64>, ingredients: Vec<u64>) -> Recipe {
        Recipe {
            id: 1,
            user_id: 1,
            title: "Sample recipe".to_string(),
            description: String::new(),
            time_minutes: 10,
            price: Price::from_cents(500),
            link: String::new(),
            image: None,
            tags,
            ingredients,
        }
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("1,2, 3").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(parse_id_list("").unwrap(), None);
        assert!(parse_id_list("1,abc").is_err());
        assert!(parse_id_list("1,,2").is_err());
        assert!(parse_id_list("-4").is_err());
    }

    #[test]
    fn test_parse_assigned_only() {
        assert!(!parse_assigned_only(None).unwrap());
        assert!(!parse_assigned_only(Some("0")).unwrap());
        assert!(parse_assigned_only(Some("1")).unwrap());
        assert!(parse_assigned_only(Some("yes")).is_err());
    }

    #[test]
    fn test_filter_requires_one_match_per_kind() {
        let filter = RecipeFilter {
            tags: Some(vec![1, 2]),
            ingredients: Some(vec![9]),
        };
        assert!(filter.matches(&recipe(vec![2], vec![9, 10])));
        assert!(!filter.matches(&recipe(vec![2], vec![10])));
        assert!(!filter.matches(&recipe(vec![], vec![9])));
        assert!(RecipeFilter::default().matches(&recipe(vec![], vec![])));
    }
}
