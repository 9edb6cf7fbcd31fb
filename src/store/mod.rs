//! Datastore: users, contacts, transaction records and contact wallets.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod sqlite;

pub use sqlite::SqliteDatastore;

use crate::error::ServiceResult;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub wallet_address: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Contact {
    pub id: i64,
    pub user_id: i64,
    pub nombre: String,
    pub wallet_address: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TransactionRecord {
    pub id: String,
    pub sender_wallet: String,
    pub recipient_wallet: String,
    pub amount: f64,
    pub txid: Option<String>,
    pub status: String,
    pub created_at: String,
}

/// A wallet bookmarked by another wallet.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContactWallet {
    pub id: String,
    pub nombre_wallet_agregada: String,
    pub wallet_agregada: String,
    pub wallet_quien_agrego: String,
    pub fecha_creacion: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub wallet_address: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewContact {
    pub user_id: i64,
    pub nombre: String,
    pub wallet_address: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewTransaction {
    pub sender_wallet: String,
    pub recipient_wallet: String,
    pub amount: f64,
    pub txid: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewContactWallet {
    pub nombre_wallet_agregada: String,
    pub wallet_agregada: String,
    pub wallet_quien_agrego: String,
}

/// Record store. Addresses passed in are already normalized.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn list_users(&self) -> ServiceResult<Vec<User>>;

    async fn get_user(&self, id: i64) -> ServiceResult<Option<User>>;

    async fn find_user_by_wallet(&self, wallet_address: &str) -> ServiceResult<Option<User>>;

    /// Fails with `Conflict` when the wallet is already registered.
    async fn create_user(&self, new: NewUser) -> ServiceResult<User>;

    /// Contacts of one user, in insertion order.
    async fn list_contacts(&self, user_id: i64) -> ServiceResult<Vec<Contact>>;

    /// Fails with `NotFound` for an unknown user and `Conflict` when the
    /// user already has a contact with that wallet.
    async fn create_contact(&self, new: NewContact) -> ServiceResult<Contact>;

    /// All records, or those where `wallet` is sender or recipient.
    async fn list_transactions(&self, wallet: Option<&str>)
        -> ServiceResult<Vec<TransactionRecord>>;

    async fn create_transaction(&self, new: NewTransaction) -> ServiceResult<TransactionRecord>;

    /// All bookmarks, or those added by `owner`.
    async fn list_contact_wallets(&self, owner: Option<&str>) -> ServiceResult<Vec<ContactWallet>>;

    async fn create_contact_wallet(&self, new: NewContactWallet) -> ServiceResult<ContactWallet>;
}
