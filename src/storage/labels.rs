//! Tags and ingredients: per-user names linked to recipes.
//!
//! Both kinds share one layout (a row tree plus an `owner ++ name` index)
//! and one code path, selected by [`LabelKind`].

use sled::transaction::TransactionalTree;
use sled::Transactional;
use std::collections::HashSet;
use tracing::debug;

use super::{abort, decode, decode_id, encode, id_key, owner_key, Storage, StorageError, TxResult};
use crate::models::{Label, LabelKind, Recipe};

/// Get-or-create every name for `owner` and return the label ids in
/// first-seen order. A name repeated in `names` maps to a single label.
///
/// Runs inside the caller's transaction; the name index lookup and the
/// insert commit together, so two concurrent requests cannot both create
/// the same (owner, name).
pub(crate) fn reconcile(
    kind: LabelKind,
    rows: &TransactionalTree,
    index: &TransactionalTree,
    owner: u64,
    names: &[String],
) -> TxResult<Vec<u64>> {
    let mut ids: Vec<u64> = Vec::with_capacity(names.len());
    let mut seen: Vec<(&str, u64)> = Vec::with_capacity(names.len());

    for name in names {
        if let Some((_, id)) = seen.iter().find(|(n, _)| *n == name.as_str()) {
            if !ids.contains(id) {
                ids.push(*id);
            }
            continue;
        }

        let key = owner_key(owner, name.as_bytes());
        let id = match index.get(&key)? {
            Some(existing) => decode_id(&existing, "label_names").map_err(abort)?,
            None => {
                let id = rows.generate_id()? + 1;
                let label = Label {
                    id,
                    user_id: owner,
                    name: name.clone(),
                };
                rows.insert(id_key(id).to_vec(), encode(&label).map_err(abort)?)?;
                index.insert(key, id_key(id).to_vec())?;
                debug!(%kind, label_id = id, owner, "label created during reconciliation");
                id
            }
        };

        seen.push((name.as_str(), id));
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

impl Storage {
    pub fn create_label(&self, kind: LabelKind, owner: u64, name: &str) -> Result<Label, StorageError> {
        let trees = self.label_trees(kind);
        let label = (&trees.rows, &trees.names).transaction(|(rows, index)| -> TxResult<Label> {
            let key = owner_key(owner, name.as_bytes());
            if index.get(&key)?.is_some() {
                return Err(abort(StorageError::DuplicateLabel { kind }));
            }
            let id = rows.generate_id()? + 1;
            let label = Label {
                id,
                user_id: owner,
                name: name.to_string(),
            };
            rows.insert(id_key(id).to_vec(), encode(&label).map_err(abort)?)?;
            index.insert(key, id_key(id).to_vec())?;
            Ok(label)
        })?;
        Ok(label)
    }

    /// Returns the label only if `owner` owns it.
    pub fn get_label(&self, kind: LabelKind, owner: u64, id: u64) -> Result<Option<Label>, StorageError> {
        let label: Option<Label> = self
            .label_trees(kind)
            .rows
            .get(id_key(id))?
            .map(|bytes| decode(&bytes))
            .transpose()?;
        Ok(label.filter(|label| label.user_id == owner))
    }

    /// Labels owned by `owner`, by name descending (ties: newest first).
    /// With `assigned_only`, only labels linked to at least one recipe.
    pub fn list_labels(&self, kind: LabelKind, owner: u64, assigned_only: bool) -> Result<Vec<Label>, StorageError> {
        let rows = &self.label_trees(kind).rows;
        let assigned = if assigned_only {
            Some(self.linked_label_ids(kind, owner)?)
        } else {
            None
        };

        let mut labels = Vec::new();
        for (_, id) in self.label_index_entries(kind, owner)? {
            if assigned.as_ref().is_some_and(|linked| !linked.contains(&id)) {
                continue;
            }
            if let Some(bytes) = rows.get(id_key(id))? {
                labels.push(decode::<Label>(&bytes)?);
            }
        }
        labels.sort_by(|a, b| b.name.cmp(&a.name).then(b.id.cmp(&a.id)));
        Ok(labels)
    }

    pub fn rename_label(&self, kind: LabelKind, owner: u64, id: u64, name: &str) -> Result<Label, StorageError> {
        let trees = self.label_trees(kind);
        let label = (&trees.rows, &trees.names).transaction(|(rows, index)| -> TxResult<Label> {
            let mut label: Label = match rows.get(id_key(id))? {
                Some(bytes) => decode(&bytes).map_err(abort)?,
                None => return Err(abort(StorageError::NotFound(kind.noun()))),
            };
            if label.user_id != owner {
                return Err(abort(StorageError::NotFound(kind.noun())));
            }
            if label.name == name {
                return Ok(label);
            }

            let new_key = owner_key(owner, name.as_bytes());
            if index.get(&new_key)?.is_some() {
                return Err(abort(StorageError::DuplicateLabel { kind }));
            }
            index.remove(owner_key(owner, label.name.as_bytes()))?;
            index.insert(new_key, id_key(id).to_vec())?;

            label.name = name.to_string();
            rows.insert(id_key(id).to_vec(), encode(&label).map_err(abort)?)?;
            Ok(label)
        })?;
        Ok(label)
    }

    /// Deletes the label and unlinks it from every recipe of its owner.
    pub fn delete_label(&self, kind: LabelKind, owner: u64, id: u64) -> Result<(), StorageError> {
        let trees = self.label_trees(kind);
        let recipe_ids = self.recipe_ids_of(owner)?;

        (&trees.rows, &trees.names, &self.recipes).transaction(|(rows, index, recipes)| -> TxResult<()> {
            let label: Label = match rows.get(id_key(id))? {
                Some(bytes) => decode(&bytes).map_err(abort)?,
                None => return Err(abort(StorageError::NotFound(kind.noun()))),
            };
            if label.user_id != owner {
                return Err(abort(StorageError::NotFound(kind.noun())));
            }
            rows.remove(id_key(id).to_vec())?;
            index.remove(owner_key(owner, label.name.as_bytes()))?;

            for recipe_id in &recipe_ids {
                let Some(bytes) = recipes.get(id_key(*recipe_id))? else {
                    continue;
                };
                let mut recipe: Recipe = decode(&bytes).map_err(abort)?;
                let links = match kind {
                    LabelKind::Tag => &mut recipe.tags,
                    LabelKind::Ingredient => &mut recipe.ingredients,
                };
                let before = links.len();
                links.retain(|linked| *linked != id);
                if links.len() != before {
                    recipes.insert(id_key(*recipe_id).to_vec(), encode(&recipe).map_err(abort)?)?;
                }
            }
            Ok(())
        })?;

        debug!(%kind, label_id = id, owner, "label deleted");
        Ok(())
    }

    /// Looks up labels by id for rendering a recipe, keeping the given
    /// order and skipping ids that no longer exist.
    pub fn resolve_labels(&self, kind: LabelKind, ids: &[u64]) -> Result<Vec<Label>, StorageError> {
        let rows = &self.label_trees(kind).rows;
        let mut labels = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(bytes) = rows.get(id_key(*id))? {
                labels.push(decode(&bytes)?);
            }
        }
        Ok(labels)
    }

    /// `(index key, label id)` for every label of `owner`.
    pub(crate) fn label_index_entries(&self, kind: LabelKind, owner: u64) -> Result<Vec<(Vec<u8>, u64)>, StorageError> {
        let mut entries = Vec::new();
        for item in self.label_trees(kind).names.scan_prefix(owner.to_be_bytes()) {
            let (key, value) = item?;
            entries.push((key.to_vec(), decode_id(&value, "label_names")?));
        }
        Ok(entries)
    }

    fn linked_label_ids(&self, kind: LabelKind, owner: u64) -> Result<HashSet<u64>, StorageError> {
        let mut linked = HashSet::new();
        for recipe_id in self.recipe_ids_of(owner)? {
            if let Some(bytes) = self.recipes.get(id_key(recipe_id))? {
                let recipe: Recipe = decode(&bytes)?;
                let links = match kind {
                    LabelKind::Tag => recipe.tags,
                    LabelKind::Ingredient => recipe.ingredients,
                };
                linked.extend(links);
            }
        }
        Ok(linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRecipe, NewUser, RecipeChanges};

    fn create_user(storage: &Storage, email: &str) -> u64 {
        storage
            .create_user(NewUser {
                email: email.to_string(),
                password_hash: "hash".to_string(),
                ..NewUser::default()
            })
            .unwrap()
            .id
    }

    fn setup() -> (Storage, u64, u64) {
        let storage = Storage::temporary().unwrap();
        let user = create_user(&storage, "user@example.com");
        let other = create_user(&storage, "user2@example.com");
        (storage, user, other)
    }

    fn names(labels: &[Label]) -> Vec<&str> {
        labels.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_list_is_scoped_and_sorted_by_name_desc() {
        let (storage, user, other) = setup();
        for name in ["Vegan", "Dessert", "Soup"] {
            storage.create_label(LabelKind::Tag, user, name).unwrap();
        }
        storage.create_label(LabelKind::Tag, other, "Pretty").unwrap();

        let labels = storage.list_labels(LabelKind::Tag, user, false).unwrap();
        assert_eq!(names(&labels), ["Vegan", "Soup", "Dessert"]);
    }

    #[test]
    fn test_duplicate_name_per_owner_is_rejected() {
        let (storage, user, other) = setup();
        storage.create_label(LabelKind::Ingredient, user, "Salt").unwrap();
        let err = storage.create_label(LabelKind::Ingredient, user, "Salt").unwrap_err();
        assert!(matches!(err, StorageError::DuplicateLabel { kind: LabelKind::Ingredient }));

        // Same name under another owner, or as the other kind, is fine.
        storage.create_label(LabelKind::Ingredient, other, "Salt").unwrap();
        storage.create_label(LabelKind::Tag, user, "Salt").unwrap();
    }

    #[test]
    fn test_other_owner_cannot_see_rename_or_delete() {
        let (storage, user, other) = setup();
        let label = storage.create_label(LabelKind::Tag, user, "Breakfast").unwrap();

        assert!(storage.get_label(LabelKind::Tag, other, label.id).unwrap().is_none());
        assert!(matches!(
            storage.rename_label(LabelKind::Tag, other, label.id, "Lunch"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete_label(LabelKind::Tag, other, label.id),
            Err(StorageError::NotFound(_))
        ));
        assert_eq!(
            storage.get_label(LabelKind::Tag, user, label.id).unwrap().unwrap().name,
            "Breakfast"
        );
    }

    #[test]
    fn test_rename_moves_the_name_index() {
        let (storage, user, _) = setup();
        let label = storage.create_label(LabelKind::Tag, user, "Test tag").unwrap();
        let renamed = storage.rename_label(LabelKind::Tag, user, label.id, "Update test tag").unwrap();
        assert_eq!(renamed.name, "Update test tag");

        // The old name is free again, the new one is taken.
        storage.create_label(LabelKind::Tag, user, "Test tag").unwrap();
        assert!(storage.create_label(LabelKind::Tag, user, "Update test tag").is_err());
    }

    #[test]
    fn test_assigned_only_returns_linked_labels_once() {
        let (storage, user, _) = setup();
        let draft = NewRecipe {
            title: "Sample recipe1".to_string(),
            tags: Some(vec!["Apple".to_string()]),
            ..NewRecipe::default()
        };
        storage.create_recipe(user, draft.clone()).unwrap();
        storage.create_recipe(user, NewRecipe { title: "Sample recipe2".to_string(), ..draft }).unwrap();
        storage.create_label(LabelKind::Tag, user, "Pear").unwrap();

        let assigned = storage.list_labels(LabelKind::Tag, user, true).unwrap();
        assert_eq!(names(&assigned), ["Apple"]);
        assert_eq!(storage.list_labels(LabelKind::Tag, user, false).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_unlinks_from_recipes() {
        let (storage, user, _) = setup();
        let recipe = storage
            .create_recipe(
                user,
                NewRecipe {
                    title: "Curry".to_string(),
                    ingredients: Some(vec!["Rice".to_string(), "Lentils".to_string()]),
                    ..NewRecipe::default()
                },
            )
            .unwrap();
        let rice = recipe.ingredients[0];

        storage.delete_label(LabelKind::Ingredient, user, rice).unwrap();

        let recipe = storage.get_recipe(user, recipe.id).unwrap().unwrap();
        assert_eq!(recipe.ingredients.len(), 1);
        assert!(!recipe.ingredients.contains(&rice));
        assert!(storage.get_label(LabelKind::Ingredient, user, rice).unwrap().is_none());
    }

    #[test]
    fn test_reconcile_reuses_and_dedupes_names() {
        let (storage, user, _) = setup();
        let existing = storage.create_label(LabelKind::Tag, user, "Chinese").unwrap();

        let recipe = storage
            .create_recipe(
                user,
                NewRecipe {
                    title: "Noodles".to_string(),
                    tags: Some(vec!["Chinese".to_string(), "Dinner".to_string(), "Chinese".to_string()]),
                    ..NewRecipe::default()
                },
            )
            .unwrap();
        assert_eq!(recipe.tags.len(), 2);
        assert_eq!(recipe.tags[0], existing.id);

        let updated = storage
            .update_recipe(
                user,
                recipe.id,
                RecipeChanges {
                    tags: Some(vec!["Chinese".to_string()]),
                    ..RecipeChanges::default()
                },
            )
            .unwrap();
        assert_eq!(updated.tags, vec![existing.id]);

        let all = storage.list_labels(LabelKind::Tag, user, false).unwrap();
        assert_eq!(names(&all), ["Dinner", "Chinese"]);
    }

    #[test]
    fn test_concurrent_reconcile_creates_label_once() {
        let (storage, user, _) = setup();
        let storage = std::sync::Arc::new(storage);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    let draft = NewRecipe {
                        title: format!("Chow mein {i}"),
                        tags: Some(vec!["Chinese".to_string()]),
                        ingredients: Some(vec!["Noodles".to_string()]),
                        ..NewRecipe::default()
                    };
                    storage.create_recipe(user, draft).unwrap()
                })
            })
            .collect();
        let recipes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let tags = storage.list_labels(LabelKind::Tag, user, false).unwrap();
        assert_eq!(names(&tags), ["Chinese"]);
        assert_eq!(storage.list_labels(LabelKind::Ingredient, user, false).unwrap().len(), 1);
        assert!(recipes.iter().all(|r| r.tags == [tags[0].id]));
    }
}
