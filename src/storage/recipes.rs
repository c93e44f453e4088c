use sled::Transactional;
use tracing::debug;

use super::labels::reconcile;
use super::{abort, decode, encode, id_key, owner_key, Storage, StorageError, TxResult};
use crate::filters::RecipeFilter;
use crate::models::{LabelKind, NewRecipe, Recipe, RecipeChanges};

impl Storage {
    /// Inserts a recipe for `owner`, reconciling its tag and ingredient
    /// names in the same transaction.
    pub fn create_recipe(&self, owner: u64, draft: NewRecipe) -> Result<Recipe, StorageError> {
        let recipe = (
            &self.recipes,
            &self.recipes_by_owner,
            &self.tags.rows,
            &self.tags.names,
            &self.ingredients.rows,
            &self.ingredients.names,
        )
            .transaction(
                |(recipes, by_owner, tag_rows, tag_names, ingredient_rows, ingredient_names)| -> TxResult<Recipe> {
                    let id = recipes.generate_id()? + 1;
                    let tags = match &draft.tags {
                        Some(names) => reconcile(LabelKind::Tag, tag_rows, tag_names, owner, names)?,
                        None => Vec::new(),
                    };
                    let ingredients = match &draft.ingredients {
                        Some(names) => {
                            reconcile(LabelKind::Ingredient, ingredient_rows, ingredient_names, owner, names)?
                        }
                        None => Vec::new(),
                    };

                    let recipe = Recipe {
                        id,
                        user_id: owner,
                        title: draft.title.clone(),
                        description: draft.description.clone(),
                        time_minutes: draft.time_minutes,
                        price: draft.price,
                        link: draft.link.clone(),
                        image: None,
                        tags,
                        ingredients,
                    };
                    recipes.insert(id_key(id).to_vec(), encode(&recipe).map_err(abort)?)?;
                    by_owner.insert(owner_key(owner, &id_key(id)), Vec::<u8>::new())?;
                    Ok(recipe)
                },
            )?;

        debug!(recipe_id = recipe.id, owner, "recipe created");
        Ok(recipe)
    }

    /// Returns the recipe only if `owner` owns it.
    pub fn get_recipe(&self, owner: u64, id: u64) -> Result<Option<Recipe>, StorageError> {
        let recipe: Option<Recipe> = self.recipes.get(id_key(id))?.map(|bytes| decode(&bytes)).transpose()?;
        Ok(recipe.filter(|recipe| recipe.user_id == owner))
    }

    /// Recipes of `owner` matching `filter`, newest (highest id) first.
    pub fn list_recipes(&self, owner: u64, filter: &RecipeFilter) -> Result<Vec<Recipe>, StorageError> {
        let mut recipes = Vec::new();
        for id in self.recipe_ids_of(owner)?.into_iter().rev() {
            if let Some(bytes) = self.recipes.get(id_key(id))? {
                let recipe: Recipe = decode(&bytes)?;
                if filter.matches(&recipe) {
                    recipes.push(recipe);
                }
            }
        }
        Ok(recipes)
    }

    /// Applies `changes` to a recipe owned by `owner`. The owner itself is
    /// never changed here.
    pub fn update_recipe(&self, owner: u64, id: u64, changes: RecipeChanges) -> Result<Recipe, StorageError> {
        let recipe = (
            &self.recipes,
            &self.tags.rows,
            &self.tags.names,
            &self.ingredients.rows,
            &self.ingredients.names,
        )
            .transaction(
                |(recipes, tag_rows, tag_names, ingredient_rows, ingredient_names)| -> TxResult<Recipe> {
                    let mut recipe: Recipe = match recipes.get(id_key(id))? {
                        Some(bytes) => decode(&bytes).map_err(abort)?,
                        None => return Err(abort(StorageError::NotFound("recipe"))),
                    };
                    if recipe.user_id != owner {
                        return Err(abort(StorageError::NotFound("recipe")));
                    }

                    if let Some(title) = &changes.title {
                        recipe.title = title.clone();
                    }
                    if let Some(description) = &changes.description {
                        recipe.description = description.clone();
                    }
                    if let Some(time_minutes) = changes.time_minutes {
                        recipe.time_minutes = time_minutes;
                    }
                    if let Some(price) = changes.price {
                        recipe.price = price;
                    }
                    if let Some(link) = &changes.link {
                        recipe.link = link.clone();
                    }
                    if let Some(names) = &changes.tags {
                        recipe.tags = reconcile(LabelKind::Tag, tag_rows, tag_names, owner, names)?;
                    }
                    if let Some(names) = &changes.ingredients {
                        recipe.ingredients =
                            reconcile(LabelKind::Ingredient, ingredient_rows, ingredient_names, owner, names)?;
                    }

                    recipes.insert(id_key(id).to_vec(), encode(&recipe).map_err(abort)?)?;
                    Ok(recipe)
                },
            )?;
        Ok(recipe)
    }

    /// Records the stored image path (relative to the media root).
    pub fn set_recipe_image(&self, owner: u64, id: u64, image: &str) -> Result<Recipe, StorageError> {
        let recipe = self.recipes.transaction(|recipes| -> TxResult<Recipe> {
            let mut recipe: Recipe = match recipes.get(id_key(id))? {
                Some(bytes) => decode(&bytes).map_err(abort)?,
                None => return Err(abort(StorageError::NotFound("recipe"))),
            };
            if recipe.user_id != owner {
                return Err(abort(StorageError::NotFound("recipe")));
            }
            recipe.image = Some(image.to_string());
            recipes.insert(id_key(id).to_vec(), encode(&recipe).map_err(abort)?)?;
            Ok(recipe)
        })?;
        Ok(recipe)
    }

    pub fn delete_recipe(&self, owner: u64, id: u64) -> Result<(), StorageError> {
        (&self.recipes, &self.recipes_by_owner).transaction(|(recipes, by_owner)| -> TxResult<()> {
            let recipe: Recipe = match recipes.get(id_key(id))? {
                Some(bytes) => decode(&bytes).map_err(abort)?,
                None => return Err(abort(StorageError::NotFound("recipe"))),
            };
            if recipe.user_id != owner {
                return Err(abort(StorageError::NotFound("recipe")));
            }
            recipes.remove(id_key(id).to_vec())?;
            by_owner.remove(owner_key(owner, &id_key(id)))?;
            Ok(())
        })?;
        debug!(recipe_id = id, owner, "recipe deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::price::Price;

    fn setup() -> (Storage, u64, u64) {
        let storage = Storage::temporary().unwrap();
        let mut ids = Vec::new();
        for email in ["testuser@example.com", "diffuser@example.com"] {
            let user = storage
                .create_user(NewUser {
                    email: email.to_string(),
                    password_hash: "hash".to_string(),
                    ..NewUser::default()
                })
                .unwrap();
            ids.push(user.id);
        }
        (storage, ids[0], ids[1])
    }

    fn sample(title: &str) -> NewRecipe {
        NewRecipe {
            title: title.to_string(),
            description: "Sample recipe description".to_string(),
            time_minutes: 10,
            price: Price::from_cents(119),
            link: "http://example.com/SampleRecipe.txt".to_string(),
            ..NewRecipe::default()
        }
    }

    #[test]
    fn test_list_is_owner_scoped_newest_first() {
        let (storage, user, other) = setup();
        let first = storage.create_recipe(user, sample("First")).unwrap();
        let second = storage.create_recipe(user, sample("Second")).unwrap();
        storage.create_recipe(other, sample("Not mine")).unwrap();

        let listed = storage.list_recipes(user, &RecipeFilter::default()).unwrap();
        let ids: Vec<u64> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_cross_user_access_is_not_found() {
        let (storage, user, other) = setup();
        let recipe = storage.create_recipe(user, sample("Mine")).unwrap();

        assert!(storage.get_recipe(other, recipe.id).unwrap().is_none());
        assert!(matches!(
            storage.delete_recipe(other, recipe.id),
            Err(StorageError::NotFound("recipe"))
        ));
        assert!(matches!(
            storage.update_recipe(other, recipe.id, RecipeChanges::default()),
            Err(StorageError::NotFound("recipe"))
        ));
        assert!(storage.get_recipe(user, recipe.id).unwrap().is_some());
    }

    #[test]
    fn test_filter_by_tags_and_ingredients() {
        let (storage, user, _) = setup();
        let curry = storage
            .create_recipe(
                user,
                NewRecipe {
                    tags: Some(vec!["Vegan".to_string()]),
                    ingredients: Some(vec!["Tofu".to_string()]),
                    ..sample("Curry")
                },
            )
            .unwrap();
        let stew = storage
            .create_recipe(
                user,
                NewRecipe {
                    tags: Some(vec!["Vegetarian".to_string()]),
                    ingredients: Some(vec!["Tofu".to_string()]),
                    ..sample("Stew")
                },
            )
            .unwrap();
        storage.create_recipe(user, sample("Fish and chips")).unwrap();

        let by_tag = RecipeFilter {
            tags: Some(vec![curry.tags[0], stew.tags[0]]),
            ingredients: None,
        };
        let ids: Vec<u64> = storage.list_recipes(user, &by_tag).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![stew.id, curry.id]);

        let both = RecipeFilter {
            tags: Some(vec![curry.tags[0]]),
            ingredients: Some(curry.ingredients.clone()),
        };
        let ids: Vec<u64> = storage.list_recipes(user, &both).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![curry.id]);
    }

    #[test]
    fn test_partial_update_keeps_untouched_fields() {
        let (storage, user, _) = setup();
        let recipe = storage
            .create_recipe(user, NewRecipe { tags: Some(vec!["Breakfast".to_string()]), ..sample("Eggs") })
            .unwrap();

        let updated = storage
            .update_recipe(
                user,
                recipe.id,
                RecipeChanges {
                    title: Some("New title".to_string()),
                    ..RecipeChanges::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.link, recipe.link);
        assert_eq!(updated.tags, recipe.tags);
        assert_eq!(updated.user_id, user);
    }

    #[test]
    fn test_empty_label_list_clears_links() {
        let (storage, user, _) = setup();
        let recipe = storage
            .create_recipe(user, NewRecipe { tags: Some(vec!["Dessert".to_string()]), ..sample("Pie") })
            .unwrap();

        let cleared = storage
            .update_recipe(
                user,
                recipe.id,
                RecipeChanges {
                    tags: Some(Vec::new()),
                    ..RecipeChanges::default()
                },
            )
            .unwrap();
        assert!(cleared.tags.is_empty());
        // The tag itself survives.
        assert_eq!(storage.list_labels(LabelKind::Tag, user, false).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_removes_from_owner_index() {
        let (storage, user, _) = setup();
        let recipe = storage.create_recipe(user, sample("Toast")).unwrap();
        storage.delete_recipe(user, recipe.id).unwrap();
        assert!(storage.get_recipe(user, recipe.id).unwrap().is_none());
        assert!(storage.recipe_ids_of(user).unwrap().is_empty());
    }

    #[test]
    fn test_set_image_is_owner_scoped() {
        let (storage, user, other) = setup();
        let recipe = storage.create_recipe(user, sample("Cake")).unwrap();
        assert!(storage.set_recipe_image(other, recipe.id, "uploads/recipe/x.png").is_err());
        let updated = storage.set_recipe_image(user, recipe.id, "uploads/recipe/x.png").unwrap();
        assert_eq!(updated.image.as_deref(), Some("uploads/recipe/x.png"));
    }
}
