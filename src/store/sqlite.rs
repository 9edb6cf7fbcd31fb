//! SQLite-backed datastore.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{
    Contact, ContactWallet, Datastore, NewContact, NewContactWallet, NewTransaction, NewUser,
    TransactionRecord, User,
};
use crate::error::{Error, ServiceError, ServiceResult};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL,
        wallet_address TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS contacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        nombre TEXT NOT NULL,
        wallet_address TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, wallet_address)
    );
    CREATE TABLE IF NOT EXISTS transacciones (
        id TEXT PRIMARY KEY,
        sender_wallet TEXT NOT NULL,
        recipient_wallet TEXT NOT NULL,
        amount REAL NOT NULL,
        txid TEXT,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS contact_wallets (
        id TEXT PRIMARY KEY,
        nombre_wallet_agregada TEXT NOT NULL,
        wallet_agregada TEXT NOT NULL,
        wallet_quien_agrego TEXT NOT NULL,
        fecha_creacion TEXT NOT NULL,
        UNIQUE (wallet_quien_agrego, wallet_agregada)
    );
    CREATE INDEX IF NOT EXISTS idx_contacts_user ON contacts(user_id);
    CREATE INDEX IF NOT EXISTS idx_tx_sender ON transacciones(sender_wallet);
    CREATE INDEX IF NOT EXISTS idx_tx_recipient ON transacciones(recipient_wallet);
    CREATE INDEX IF NOT EXISTS idx_cw_owner ON contact_wallets(wallet_quien_agrego);
"#;

pub struct SqliteDatastore {
    conn: Mutex<Connection>,
}

impl SqliteDatastore {
    /// Open (and migrate) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::info!("Opened datastore at {}", path.display());
        Self::init(conn)
    }

    /// In-memory database, used by tests and `chat` dry runs.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ServiceError::Upstream("datastore connection poisoned".to_string()))
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        wallet_address: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        user_id: row.get(1)?,
        nombre: row.get(2)?,
        wallet_address: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    Ok(TransactionRecord {
        id: row.get(0)?,
        sender_wallet: row.get(1)?,
        recipient_wallet: row.get(2)?,
        amount: row.get(3)?,
        txid: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn contact_wallet_from_row(row: &Row<'_>) -> rusqlite::Result<ContactWallet> {
    Ok(ContactWallet {
        id: row.get(0)?,
        nombre_wallet_agregada: row.get(1)?,
        wallet_agregada: row.get(2)?,
        wallet_quien_agrego: row.get(3)?,
        fecha_creacion: row.get(4)?,
    })
}

const USER_COLUMNS: &str = "id, username, wallet_address, created_at";
const CONTACT_COLUMNS: &str = "id, user_id, nombre, wallet_address, created_at";
const TX_COLUMNS: &str = "id, sender_wallet, recipient_wallet, amount, txid, status, created_at";
const CW_COLUMNS: &str =
    "id, nombre_wallet_agregada, wallet_agregada, wallet_quien_agrego, fecha_creacion";

#[async_trait]
impl Datastore for SqliteDatastore {
    async fn list_users(&self) -> ServiceResult<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    async fn get_user(&self, id: i64) -> ServiceResult<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_user_by_wallet(&self, wallet_address: &str) -> ServiceResult<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE wallet_address = ?1", USER_COLUMNS),
                params![wallet_address],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn create_user(&self, new: NewUser) -> ServiceResult<User> {
        let conn = self.lock()?;
        let created_at = now();
        conn.execute(
            "INSERT INTO users (username, wallet_address, created_at) VALUES (?1, ?2, ?3)",
            params![new.username, new.wallet_address, created_at],
        )?;
        tracing::debug!("Created user {} ({})", new.username, new.wallet_address);
        Ok(User {
            id: conn.last_insert_rowid(),
            username: new.username,
            wallet_address: new.wallet_address,
            created_at,
        })
    }

    async fn list_contacts(&self, user_id: i64) -> ServiceResult<Vec<Contact>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM contacts WHERE user_id = ?1 ORDER BY id",
            CONTACT_COLUMNS
        ))?;
        let contacts = stmt
            .query_map(params![user_id], contact_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contacts)
    }

    async fn create_contact(&self, new: NewContact) -> ServiceResult<Contact> {
        let conn = self.lock()?;
        let owner_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![new.user_id],
            |row| row.get(0),
        )?;
        if !owner_exists {
            return Err(ServiceError::not_found("Usuario no encontrado"));
        }

        let created_at = now();
        conn.execute(
            "INSERT INTO contacts (user_id, nombre, wallet_address, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![new.user_id, new.nombre, new.wallet_address, created_at],
        )?;
        Ok(Contact {
            id: conn.last_insert_rowid(),
            user_id: new.user_id,
            nombre: new.nombre,
            wallet_address: new.wallet_address,
            created_at,
        })
    }

    async fn list_transactions(
        &self,
        wallet: Option<&str>,
    ) -> ServiceResult<Vec<TransactionRecord>> {
        let conn = self.lock()?;
        let records = match wallet {
            Some(w) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM transacciones WHERE sender_wallet = ?1 OR recipient_wallet = ?1 ORDER BY rowid",
                    TX_COLUMNS
                ))?;
                let rows = stmt.query_map(params![w], transaction_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM transacciones ORDER BY rowid",
                    TX_COLUMNS
                ))?;
                let rows = stmt.query_map([], transaction_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }

    async fn create_transaction(&self, new: NewTransaction) -> ServiceResult<TransactionRecord> {
        let conn = self.lock()?;
        let record = TransactionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            sender_wallet: new.sender_wallet,
            recipient_wallet: new.recipient_wallet,
            amount: new.amount,
            txid: new.txid,
            status: new.status.unwrap_or_else(|| "pending".to_string()),
            created_at: now(),
        };
        conn.execute(
            "INSERT INTO transacciones (id, sender_wallet, recipient_wallet, amount, txid, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.sender_wallet,
                record.recipient_wallet,
                record.amount,
                record.txid,
                record.status,
                record.created_at
            ],
        )?;
        Ok(record)
    }

    async fn list_contact_wallets(&self, owner: Option<&str>) -> ServiceResult<Vec<ContactWallet>> {
        let conn = self.lock()?;
        let records = match owner {
            Some(o) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM contact_wallets WHERE wallet_quien_agrego = ?1 ORDER BY rowid",
                    CW_COLUMNS
                ))?;
                let rows = stmt.query_map(params![o], contact_wallet_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM contact_wallets ORDER BY rowid",
                    CW_COLUMNS
                ))?;
                let rows = stmt.query_map([], contact_wallet_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }

    async fn create_contact_wallet(&self, new: NewContactWallet) -> ServiceResult<ContactWallet> {
        let conn = self.lock()?;
        let record = ContactWallet {
            id: uuid::Uuid::new_v4().to_string(),
            nombre_wallet_agregada: new.nombre_wallet_agregada,
            wallet_agregada: new.wallet_agregada,
            wallet_quien_agrego: new.wallet_quien_agrego,
            fecha_creacion: now(),
        };
        conn.execute(
            "INSERT INTO contact_wallets (id, nombre_wallet_agregada, wallet_agregada, wallet_quien_agrego, fecha_creacion) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.nombre_wallet_agregada,
                record.wallet_agregada,
                record.wallet_quien_agrego,
                record.fecha_creacion
            ],
        )?;
        Ok(record)
    }
}
