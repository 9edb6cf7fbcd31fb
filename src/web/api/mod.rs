//! HTTP handlers.

pub mod chain;
pub mod chat;
pub mod contact_wallets;
pub mod contacts;
pub mod pyth;
pub mod transactions;
pub mod users;

pub use chain::{
    balance_by_path, check_transaction, get_balance, get_count, index, network_info,
    prepare_transfer,
};
pub use chat::chat;
pub use contact_wallets::{create_contact_wallet, list_contact_wallets, list_owner_contact_wallets};
pub use contacts::{create_contact, list_contacts};
pub use transactions::{create_transaction, list_transactions, list_wallet_transactions};
pub use users::{create_user, get_user, get_user_by_wallet, get_user_contacts, list_users};
