use chrono::Utc;
use sled::Transactional;
use tracing::debug;

use super::{abort, decode, decode_id, encode, id_key, owner_key, Storage, StorageError, TxResult};
use crate::models::{normalize_email, LabelKind, NewUser, User};

impl Storage {
    /// Creates an account. The email is normalized first and must be unique.
    pub fn create_user(&self, new_user: NewUser) -> Result<User, StorageError> {
        let email = normalize_email(&new_user.email);
        if email.is_empty() {
            return Err(StorageError::MissingEmail);
        }

        let user = (&self.users, &self.users_by_email).transaction(|(users, emails)| -> TxResult<User> {
            if emails.get(email.as_bytes())?.is_some() {
                return Err(abort(StorageError::DuplicateEmail));
            }
            let id = users.generate_id()? + 1;
            let user = User {
                id,
                email: email.clone(),
                name: new_user.name.clone(),
                password_hash: new_user.password_hash.clone(),
                is_active: true,
                is_staff: new_user.is_staff,
                is_superuser: new_user.is_superuser,
                date_joined: Utc::now(),
            };
            users.insert(id_key(id).to_vec(), encode(&user).map_err(abort)?)?;
            emails.insert(email.as_bytes(), id_key(id).to_vec())?;
            Ok(user)
        })?;

        debug!(user_id = user.id, "user created");
        Ok(user)
    }

    pub fn get_user(&self, id: u64) -> Result<Option<User>, StorageError> {
        self.users.get(id_key(id))?.map(|bytes| decode(&bytes)).transpose()
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let email = normalize_email(email);
        match self.users_by_email.get(email.as_bytes())? {
            Some(id) => self.get_user(decode_id(&id, "users_by_email")?),
            None => Ok(None),
        }
    }

    /// Persists profile changes (name and password hash) onto the stored
    /// row. The email never changes through this path. A user deleted
    /// since `user` was loaded stays deleted.
    pub fn update_user(&self, user: &User) -> Result<(), StorageError> {
        (&self.users, &self.users_by_email).transaction(|(users, emails)| -> TxResult<()> {
            let mut stored: User = match users.get(id_key(user.id))? {
                Some(bytes) => decode(&bytes).map_err(abort)?,
                None => return Err(abort(StorageError::NotFound("user"))),
            };
            if emails.get(stored.email.as_bytes())?.as_deref() != Some(&id_key(user.id)[..]) {
                return Err(abort(StorageError::NotFound("user")));
            }
            stored.name = user.name.clone();
            stored.password_hash = user.password_hash.clone();
            users.insert(id_key(user.id).to_vec(), encode(&stored).map_err(abort)?)?;
            Ok(())
        })?;
        Ok(())
    }

    /// Removes the account together with its recipes, tags and ingredients.
    pub fn delete_user(&self, id: u64) -> Result<(), StorageError> {
        let user = self.get_user(id)?.ok_or(StorageError::NotFound("user"))?;
        let recipe_ids = self.recipe_ids_of(id)?;
        let tag_keys = self.label_index_entries(LabelKind::Tag, id)?;
        let ingredient_keys = self.label_index_entries(LabelKind::Ingredient, id)?;

        (
            &self.users,
            &self.users_by_email,
            &self.recipes,
            &self.recipes_by_owner,
            &self.tags.rows,
            &self.tags.names,
            &self.ingredients.rows,
            &self.ingredients.names,
        )
            .transaction(
                |(users, emails, recipes, by_owner, tag_rows, tag_names, ingredient_rows, ingredient_names)| -> TxResult<()> {
                    users.remove(id_key(id).to_vec())?;
                    emails.remove(user.email.as_bytes())?;
                    for recipe_id in &recipe_ids {
                        recipes.remove(id_key(*recipe_id).to_vec())?;
                        by_owner.remove(owner_key(id, &id_key(*recipe_id)))?;
                    }
                    for (name_key, label_id) in &tag_keys {
                        tag_names.remove(name_key.as_slice())?;
                        tag_rows.remove(id_key(*label_id).to_vec())?;
                    }
                    for (name_key, label_id) in &ingredient_keys {
                        ingredient_names.remove(name_key.as_slice())?;
                        ingredient_rows.remove(id_key(*label_id).to_vec())?;
                    }
                    Ok(())
                },
            )?;

        debug!(user_id = id, recipes = recipe_ids.len(), "user deleted with owned rows");
        Ok(())
    }
}
