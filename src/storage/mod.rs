//! Sled-backed persistence for users, recipes, tags and ingredients.
//!
//! Each entity lives in its own tree keyed by a big-endian `u64` id, so tree
//! order is id order. Secondary trees act as indexes and constraints:
//! - `users_by_email`: normalized email -> user id (uniqueness)
//! - `recipes_by_owner`: owner id ++ recipe id -> () (per-user scans)
//! - `<kind>_names`: owner id ++ label name -> label id (per-user
//!   uniqueness, and the lookup side of get-or-create)
//!
//! Writes that touch more than one tree go through a sled multi-tree
//! transaction, so a request either lands completely or not at all.

pub mod labels;
pub mod recipes;
pub mod users;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Tree};
use std::path::Path;
use thiserror::Error;

use crate::models::LabelKind;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("an email address is required")]
    MissingEmail,
    #[error("user with this email already exists")]
    DuplicateEmail,
    #[error("{kind} with this name already exists")]
    DuplicateLabel { kind: LabelKind },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("corrupt index entry in {0}")]
    Corrupt(&'static str),
}

impl From<TransactionError<StorageError>> for StorageError {
    fn from(e: TransactionError<StorageError>) -> Self {
        match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StorageError::Sled(e),
        }
    }
}

pub(crate) type TxResult<T> = Result<T, ConflictableTransactionError<StorageError>>;

pub(crate) fn abort(e: impl Into<StorageError>) -> ConflictableTransactionError<StorageError> {
    ConflictableTransactionError::Abort(e.into())
}

/// Id row plus name index for one label kind.
#[derive(Clone)]
pub(crate) struct LabelTrees {
    pub(crate) rows: Tree,
    pub(crate) names: Tree,
}

#[derive(Clone)] // Sled handles are reference counted; clones share the same db
pub struct Storage {
    db: Db,
    users: Tree,
    users_by_email: Tree,
    recipes: Tree,
    recipes_by_owner: Tree,
    tags: LabelTrees,
    ingredients: LabelTrees,
}

impl Storage {
    /// Open or create the Sled database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database removed on drop (tests, dry runs).
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        Ok(Self {
            users: db.open_tree("users")?,
            users_by_email: db.open_tree("users_by_email")?,
            recipes: db.open_tree("recipes")?,
            recipes_by_owner: db.open_tree("recipes_by_owner")?,
            tags: LabelTrees {
                rows: db.open_tree("tags")?,
                names: db.open_tree("tag_names")?,
            },
            ingredients: LabelTrees {
                rows: db.open_tree("ingredients")?,
                names: db.open_tree("ingredient_names")?,
            },
            db,
        })
    }

    pub async fn flush(&self) -> Result<usize, StorageError> {
        Ok(self.db.flush_async().await?)
    }

    pub(crate) fn label_trees(&self, kind: LabelKind) -> &LabelTrees {
        match kind {
            LabelKind::Tag => &self.tags,
            LabelKind::Ingredient => &self.ingredients,
        }
    }

    /// Ids of every recipe owned by `owner`, ascending.
    pub(crate) fn recipe_ids_of(&self, owner: u64) -> Result<Vec<u64>, StorageError> {
        let mut ids = Vec::new();
        for item in self.recipes_by_owner.scan_prefix(owner.to_be_bytes()) {
            let (key, _) = item?;
            ids.push(decode_id(&key[8..], "recipes_by_owner")?);
        }
        Ok(ids)
    }
}

pub(crate) fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// `owner` (8 bytes, big-endian) followed by `suffix`.
pub(crate) fn owner_key(owner: u64, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + suffix.len());
    key.extend_from_slice(&owner.to_be_bytes());
    key.extend_from_slice(suffix);
    key
}

pub(crate) fn decode_id(bytes: &[u8], tree: &'static str) -> Result<u64, StorageError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| StorageError::Corrupt(tree))?;
    Ok(u64::from_be_bytes(raw))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &IVec) -> Result<T, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}
