//! Action resolver: completes and executes an [`Intent`].
//!
//! Dispatch is a flat match on the action. Every failure is folded into the
//! intent (`error` plus `message`) so the chat route always answers 200;
//! not-found results only set `message`.

use serde_json::{json, Value};
use std::sync::Arc;

use super::contacts::resolve_contact;
use super::intent::{Action, Intent};
use crate::chain::AddressFormat;
use crate::error::{ServiceError, ServiceResult};
use crate::oracle::Oracle;
use crate::store::{Datastore, NewContact, NewUser};

const DATASTORE: &str = "Datastore";

#[derive(Clone)]
pub struct Resolver {
    datastore: Option<Arc<dyn Datastore>>,
    oracle: Oracle,
    format: AddressFormat,
}

impl Resolver {
    pub fn new(
        datastore: Option<Arc<dyn Datastore>>,
        oracle: Oracle,
        format: AddressFormat,
    ) -> Self {
        Self {
            datastore,
            oracle,
            format,
        }
    }

    fn datastore(&self) -> ServiceResult<&dyn Datastore> {
        self.datastore
            .as_deref()
            .ok_or(ServiceError::NotConfigured(DATASTORE))
    }

    /// Resolve `intent` in place.
    pub async fn resolve(&self, intent: &mut Intent) {
        let action = intent.action();
        let result = match &action {
            Action::TransferToContact => {
                self.transfer_to_contact(intent).await;
                Ok(())
            }
            Action::ListUsers => self.list_users(intent).await,
            Action::GetUser => self.get_user(intent).await,
            Action::CreateUser => self.create_user(intent).await,
            Action::GetContacts => self.get_contacts(intent).await,
            Action::CreateContact => self.create_contact(intent).await,
            Action::GetPrice => self.get_price(intent).await,
            Action::GetMultiplePrices => self.get_multiple_prices(intent).await,
            Action::TransferAdvice => self.transfer_advice(intent).await,
            Action::CalculatePortfolio => self.calculate_portfolio(intent).await,
            Action::Advice => self.advice(intent).await,
            // Resolved entirely by the interpreter; the client acts on them.
            Action::Transfer
            | Action::Balance
            | Action::Increment
            | Action::Read
            | Action::NetworkInfo
            | Action::None
            | Action::Other(_) => Ok(()),
        };

        match result {
            Ok(()) => {}
            Err(ServiceError::NotFound(msg)) => intent.insert("message", msg),
            Err(e) => {
                tracing::warn!("Action '{}' failed: {}", action, e);
                intent.set_error(e.to_string());
            }
        }
    }

    async fn transfer_to_contact(&self, intent: &mut Intent) {
        let Some(sender) = intent.str_field("sender_wallet") else {
            intent.set_error("Se requiere sender_wallet para transferir a un contacto");
            return;
        };
        let Some(contact_name) = intent.str_field("contact_name") else {
            intent.set_error("Se requiere el nombre del contacto");
            return;
        };
        let Some(amount) = intent.number("amount").filter(|a| *a > 0.0) else {
            intent.set_error("Se requiere un monto mayor a 0");
            return;
        };
        let store = match self.datastore() {
            Ok(store) => store,
            Err(e) => {
                intent.set_error(e.to_string());
                return;
            }
        };

        // Stored wallets are normalized; an unparseable sender simply fails
        // the exact lookup below.
        let sender = self.format.normalize(&sender).unwrap_or(sender);

        let user = match store.find_user_by_wallet(&sender).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                intent.set_error("Tu wallet no está registrada");
                return;
            }
            Err(e) => {
                intent.set_error(format!("Error al buscar contactos: {}", e));
                return;
            }
        };

        let contacts = match store.list_contacts(user.id).await {
            Ok(contacts) if contacts.is_empty() => {
                intent.set_error("No tienes contactos registrados");
                return;
            }
            Ok(contacts) => contacts,
            Err(e) => {
                intent.set_error(format!("Error al buscar contactos: {}", e));
                return;
            }
        };

        let Some(contact) = resolve_contact(&contacts, &contact_name) else {
            let names: Vec<&str> = contacts.iter().map(|c| c.nombre.as_str()).collect();
            intent.set_error(format!("No se encontró el contacto '{}'", contact_name));
            intent.insert("available_contacts", json!(names));
            return;
        };

        tracing::info!("Resolved contact '{}' to {}", contact_name, contact.wallet_address);
        if !intent.rewrite_action(Action::Transfer) {
            return;
        }
        intent.insert("recipient", contact.wallet_address.clone());
        intent.insert("recipient_name", contact.nombre.clone());
        intent.insert("sender", sender);
        intent.insert("contact_id", contact.id);
        intent.insert("amount", amount);
        intent.insert("success", true);
        intent.default_message(format!(
            "Transferir {} {} a {} ({})",
            amount,
            self.format.native_symbol(),
            contact.nombre,
            contact.wallet_address
        ));
    }

    async fn list_users(&self, intent: &mut Intent) -> ServiceResult<()> {
        let users = self.datastore()?.list_users().await?;
        intent.default_message(format!("Se encontraron {} usuarios", users.len()));
        intent.insert("count", users.len());
        intent.insert("users", serde_json::to_value(users).unwrap_or(Value::Null));
        Ok(())
    }

    async fn get_user(&self, intent: &mut Intent) -> ServiceResult<()> {
        let store = self.datastore()?;
        let user = if let Some(id) = intent.number("user_id") {
            store.get_user(id as i64).await?
        } else if let Some(wallet) = intent.str_field("wallet_address") {
            store.find_user_by_wallet(&self.format.normalize(&wallet)?).await?
        } else {
            return Err(ServiceError::validation("Se requiere user_id o wallet_address"));
        };

        let user = user.ok_or_else(|| ServiceError::not_found("Usuario no encontrado"))?;
        intent.default_message(format!("Usuario {} ({})", user.username, user.wallet_address));
        intent.insert("user", serde_json::to_value(user).unwrap_or(Value::Null));
        Ok(())
    }

    async fn create_user(&self, intent: &mut Intent) -> ServiceResult<()> {
        let store = self.datastore()?;
        let username = intent
            .str_field("username")
            .ok_or_else(|| ServiceError::validation("Se requiere username"))?;
        let wallet = intent
            .str_field("wallet_address")
            .ok_or_else(|| ServiceError::validation("Se requiere wallet_address"))?;
        let wallet = self.format.normalize(&wallet)?;

        let user = store
            .create_user(NewUser {
                username,
                wallet_address: wallet,
            })
            .await?;
        intent.default_message(format!("Usuario {} creado", user.username));
        intent.insert("user", serde_json::to_value(user).unwrap_or(Value::Null));
        intent.insert("success", true);
        Ok(())
    }

    async fn get_contacts(&self, intent: &mut Intent) -> ServiceResult<()> {
        let store = self.datastore()?;
        let wallet = intent
            .str_field("wallet_address")
            .or_else(|| intent.str_field("sender_wallet"))
            .ok_or_else(|| ServiceError::validation("Se requiere wallet_address o sender_wallet"))?;
        let wallet = self.format.normalize(&wallet)?;

        let user = store
            .find_user_by_wallet(&wallet)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tu wallet no está registrada"))?;
        let contacts = store.list_contacts(user.id).await?;

        intent.default_message(format!("Tienes {} contactos", contacts.len()));
        intent.insert("count", contacts.len());
        intent.insert("contacts", serde_json::to_value(contacts).unwrap_or(Value::Null));
        Ok(())
    }

    async fn create_contact(&self, intent: &mut Intent) -> ServiceResult<()> {
        let store = self.datastore()?;
        let sender = intent
            .str_field("sender_wallet")
            .ok_or_else(|| ServiceError::validation("Se requiere sender_wallet para crear un contacto"))?;
        let nombre = intent
            .str_field("nombre")
            .or_else(|| intent.str_field("contact_name"))
            .ok_or_else(|| ServiceError::validation("Se requiere el nombre del contacto"))?;
        let wallet = intent
            .str_field("wallet_address")
            .ok_or_else(|| ServiceError::validation("Se requiere wallet_address"))?;
        let wallet = self.format.normalize(&wallet)?;
        let sender = self.format.normalize(&sender)?;

        let owner = store
            .find_user_by_wallet(&sender)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tu wallet no está registrada"))?;
        let contact = store
            .create_contact(NewContact {
                user_id: owner.id,
                nombre,
                wallet_address: wallet,
            })
            .await?;

        intent.default_message(format!("Contacto {} agregado", contact.nombre));
        intent.insert("contact", serde_json::to_value(contact).unwrap_or(Value::Null));
        intent.insert("success", true);
        Ok(())
    }

    async fn get_price(&self, intent: &mut Intent) -> ServiceResult<()> {
        let symbol = intent
            .str_field("symbol")
            .ok_or_else(|| ServiceError::validation("Se requiere un símbolo"))?;
        let quote = self.oracle.quote(&symbol).await?;

        intent.default_message(format!("{}: ${:.2}", quote.symbol, quote.price));
        intent.insert("price_data", serde_json::to_value(quote).unwrap_or(Value::Null));
        Ok(())
    }

    async fn get_multiple_prices(&self, intent: &mut Intent) -> ServiceResult<()> {
        let symbols = symbol_list(intent.get("symbols"));
        if symbols.is_empty() {
            return Err(ServiceError::validation("Se requiere al menos un símbolo"));
        }
        let result = self.oracle.quotes(&symbols).await?;

        intent.default_message(format!("Se obtuvieron {} precios", result.prices.len()));
        intent.insert("prices", serde_json::to_value(&result.prices).unwrap_or(Value::Null));
        intent.insert("errors", serde_json::to_value(&result.errors).unwrap_or(Value::Null));
        Ok(())
    }

    async fn transfer_advice(&self, intent: &mut Intent) -> ServiceResult<()> {
        let symbol = intent
            .str_field("symbol")
            .unwrap_or_else(|| self.format.native_symbol().to_string());
        let quote = self.oracle.quote(&symbol).await?;

        if let Some(amount) = intent.number("amount").filter(|a| *a > 0.0) {
            intent.insert("usd_value", amount * quote.price);
        }
        intent.insert("volatility", quote.volatility.label());
        intent.insert("recommendation", quote.volatility.recommendation());
        intent.default_message(format!(
            "{} a ${:.2}, volatilidad {}. {}",
            quote.symbol,
            quote.price,
            quote.volatility.label(),
            quote.volatility.recommendation()
        ));
        intent.insert("price_data", serde_json::to_value(quote).unwrap_or(Value::Null));
        Ok(())
    }

    async fn calculate_portfolio(&self, intent: &mut Intent) -> ServiceResult<()> {
        let holdings = holding_list(intent.get("holdings"));
        if holdings.is_empty() {
            return Err(ServiceError::validation("Se requieren holdings"));
        }
        let portfolio = self.oracle.portfolio(&holdings).await?;

        intent.default_message(format!("Valor total del portafolio: ${:.2}", portfolio.total_value));
        intent.insert("portfolio", serde_json::to_value(portfolio).unwrap_or(Value::Null));
        Ok(())
    }

    async fn advice(&self, intent: &mut Intent) -> ServiceResult<()> {
        let Some(symbol) = intent.str_field("symbol") else {
            return Ok(());
        };
        let quote = self.oracle.quote(&symbol).await?;
        intent.insert("recommendation", quote.volatility.recommendation());
        intent.insert("price_data", serde_json::to_value(quote).unwrap_or(Value::Null));
        Ok(())
    }
}

/// Symbols from a JSON list or a comma-separated string.
pub fn symbol_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Holdings from `{"BTC": 0.5}` or `[{"symbol": "BTC", "amount": 0.5}]`.
/// Entries without a positive numeric amount are dropped.
pub fn holding_list(value: Option<&Value>) -> Vec<(String, f64)> {
    let amount = |v: &Value| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    let pairs: Vec<(String, Option<f64>)> = match value {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), amount(v))).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let symbol = item.get("symbol")?.as_str()?.to_string();
                Some((symbol, item.get("amount").and_then(amount)))
            })
            .collect(),
        _ => Vec::new(),
    };

    pairs
        .into_iter()
        .filter_map(|(symbol, amount)| match amount {
            Some(a) if a.is_finite() && a > 0.0 => Some((symbol, a)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::tests::{raw, StubFeed};
    use crate::store::tests::CountingStore;
    use serde_json::Map;

    const JUAN: &str = "ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6";
    const CARLOS: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
    const CARLA: &str = "ST3AQ7KXWA7KGQ67EX2MFYR1E3231B9S4KY6EFB1R";

    fn intent(value: Value) -> Intent {
        match value {
            Value::Object(map) => Intent::from_map(map),
            _ => Intent::from_map(Map::new()),
        }
    }

    fn resolver_with(store: Arc<CountingStore>, feed: Arc<StubFeed>) -> Resolver {
        Resolver::new(Some(store), Oracle::new(feed), AddressFormat::Stacks)
    }

    async fn seeded() -> Arc<CountingStore> {
        let store = CountingStore::new();
        let juan = store
            .inner
            .create_user(NewUser {
                username: "Juan".to_string(),
                wallet_address: JUAN.to_string(),
            })
            .await
            .unwrap();
        for (name, wallet) in [("Carla", CARLA), ("Carlos", CARLOS)] {
            store
                .inner
                .create_contact(NewContact {
                    user_id: juan.id,
                    nombre: name.to_string(),
                    wallet_address: wallet.to_string(),
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_transfer_to_contact_requires_sender_before_any_lookup() {
        let store = seeded().await;
        let resolver = resolver_with(store.clone(), StubFeed::new(vec![]));

        let mut i = intent(json!({
            "action": "transfer_to_contact",
            "message": "Envía 5 a Carlos",
            "contact_name": "Carlos",
            "amount": 5
        }));
        resolver.resolve(&mut i).await;

        let v = i.into_value();
        assert_eq!(v["action"], "transfer_to_contact");
        assert!(v["error"].as_str().unwrap().contains("Se requiere sender_wallet"));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_precondition_order() {
        let store = seeded().await;
        let resolver = resolver_with(store.clone(), StubFeed::new(vec![]));

        let mut i = intent(json!({"action": "transfer_to_contact", "sender_wallet": JUAN, "amount": 5}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.str_field("error").as_deref(), Some("Se requiere el nombre del contacto"));

        let mut i = intent(json!({
            "action": "transfer_to_contact",
            "sender_wallet": JUAN,
            "contact_name": "Carlos",
            "amount": "0"
        }));
        resolver.resolve(&mut i).await;
        assert_eq!(i.str_field("error").as_deref(), Some("Se requiere un monto mayor a 0"));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_exact_match_rewrites_to_transfer() {
        let store = seeded().await;
        let resolver = resolver_with(store, StubFeed::new(vec![]));

        let mut i = intent(json!({
            "action": "transfer_to_contact",
            "message": "",
            "sender_wallet": JUAN.to_lowercase(),
            "contact_name": " carlos ",
            "amount": 5
        }));
        resolver.resolve(&mut i).await;

        let v = i.into_value();
        assert_eq!(v["action"], "transfer");
        assert_eq!(v["recipient"], CARLOS);
        assert_eq!(v["recipient_name"], "Carlos");
        assert_eq!(v["sender"], JUAN);
        assert_eq!(v["contact_id"], 2);
        assert_eq!(v["success"], true);
        assert!(v.get("error").is_none());
        assert!(!v["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_substring_match_and_miss() {
        let store = seeded().await;
        let resolver = resolver_with(store, StubFeed::new(vec![]));

        let mut i = intent(json!({
            "action": "transfer_to_contact",
            "sender_wallet": JUAN,
            "contact_name": "carl",
            "amount": 1
        }));
        resolver.resolve(&mut i).await;
        assert_eq!(i.str_field("recipient_name").as_deref(), Some("Carla"));

        let mut i = intent(json!({
            "action": "transfer_to_contact",
            "sender_wallet": JUAN,
            "contact_name": "María",
            "amount": 1
        }));
        resolver.resolve(&mut i).await;
        let v = i.into_value();
        assert_eq!(v["action"], "transfer_to_contact");
        assert_eq!(v["error"], "No se encontró el contacto 'María'");
        assert_eq!(v["available_contacts"], json!(["Carla", "Carlos"]));
    }

    #[tokio::test]
    async fn test_unregistered_and_empty_contacts() {
        let store = seeded().await;
        let resolver = resolver_with(store.clone(), StubFeed::new(vec![]));

        let mut i = intent(json!({
            "action": "transfer_to_contact",
            "sender_wallet": CARLOS,
            "contact_name": "Juan",
            "amount": 1
        }));
        resolver.resolve(&mut i).await;
        assert_eq!(i.str_field("error").as_deref(), Some("Tu wallet no está registrada"));

        store
            .inner
            .create_user(NewUser {
                username: "Carlos".to_string(),
                wallet_address: CARLOS.to_string(),
            })
            .await
            .unwrap();
        let mut i = intent(json!({
            "action": "transfer_to_contact",
            "sender_wallet": CARLOS,
            "contact_name": "Juan",
            "amount": 1
        }));
        resolver.resolve(&mut i).await;
        assert_eq!(i.str_field("error").as_deref(), Some("No tienes contactos registrados"));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_generic_error() {
        let store = seeded().await;
        store.fail_next();
        let resolver = resolver_with(store, StubFeed::new(vec![]));

        let mut i = intent(json!({
            "action": "transfer_to_contact",
            "sender_wallet": JUAN,
            "contact_name": "Carlos",
            "amount": 1
        }));
        resolver.resolve(&mut i).await;
        assert!(i
            .str_field("error")
            .unwrap()
            .starts_with("Error al buscar contactos"));
    }

    #[tokio::test]
    async fn test_missing_datastore_is_soft_error() {
        let resolver = Resolver::new(
            None,
            Oracle::new(StubFeed::new(vec![])),
            AddressFormat::Stacks,
        );
        let mut i = intent(json!({"action": "list_users", "message": "usuarios"}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.str_field("error").as_deref(), Some("Datastore no configurado"));
    }

    #[tokio::test]
    async fn test_user_crud_actions() {
        let store = seeded().await;
        let resolver = resolver_with(store, StubFeed::new(vec![]));

        let mut i = intent(json!({"action": "create_user", "username": "Carlos", "wallet_address": CARLOS}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.get("success"), Some(&json!(true)));

        let mut i = intent(json!({"action": "create_user", "username": "Dup", "wallet_address": CARLOS}));
        resolver.resolve(&mut i).await;
        assert!(i.str_field("error").unwrap().contains("duplicate"));

        let mut i = intent(json!({"action": "list_users"}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.get("count"), Some(&json!(2)));

        let mut i = intent(json!({"action": "get_user", "user_id": "999"}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.message(), "Usuario no encontrado");
        assert!(!i.contains("error"));

        let mut i = intent(json!({"action": "create_user", "username": "Bad", "wallet_address": "0xabc"}));
        resolver.resolve(&mut i).await;
        assert!(i.str_field("error").unwrap().starts_with("Dirección inválida"));
    }

    #[tokio::test]
    async fn test_contact_actions_use_sender() {
        let store = seeded().await;
        let resolver = resolver_with(store, StubFeed::new(vec![]));

        let mut i = intent(json!({
            "action": "create_contact",
            "sender_wallet": JUAN,
            "nombre": "Pedro",
            "wallet_address": "st2cy5v39nhdpwsxmw9qdt3hc3gd6q6xx4cfrk9ag"
        }));
        resolver.resolve(&mut i).await;
        assert_eq!(i.get("success"), Some(&json!(true)));
        assert_eq!(
            i.get("contact").unwrap()["wallet_address"],
            "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG"
        );

        let mut i = intent(json!({"action": "get_contacts", "sender_wallet": JUAN}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.get("count"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_price_actions() {
        let feed = StubFeed::new(vec![
            raw("BTC", 50_000_00000000, 10_00000000, -8),
            raw("STX", 2_00000000, 1_000000, -8),
        ]);
        let resolver = resolver_with(CountingStore::new(), feed.clone());

        let mut i = intent(json!({"action": "get_price", "symbol": "btc"}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.get("price_data").unwrap()["symbol"], "BTC");

        let mut i = intent(json!({"action": "get_multiple_prices", "symbols": "BTC, XYZ"}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.get("prices").unwrap().as_array().unwrap().len(), 1);
        assert_eq!(i.get("errors").unwrap()[0]["symbol"], "XYZ");

        let mut i = intent(json!({"action": "transfer_advice", "amount": 10}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.get("price_data").unwrap()["symbol"], "STX");
        assert!((i.number("usd_value").unwrap() - 20.0).abs() < 1e-9);
        assert!(i.contains("recommendation"));

        let mut i = intent(json!({
            "action": "calculate_portfolio",
            "holdings": {"BTC": 0.1, "STX": 500, "NOPE": 3}
        }));
        resolver.resolve(&mut i).await;
        let portfolio = i.get("portfolio").unwrap();
        assert!((portfolio["total_value"].as_f64().unwrap() - 6000.0).abs() < 1e-6);
        assert_eq!(portfolio["items"].as_array().unwrap().len(), 2);

        let mut i = intent(json!({"action": "advice", "message": "consejo"}));
        resolver.resolve(&mut i).await;
        assert_eq!(i.into_value(), json!({"action": "advice", "message": "consejo"}));

        assert_eq!(feed.calls(), 4);
    }

    #[tokio::test]
    async fn test_passthrough_actions_untouched() {
        let store = CountingStore::new();
        let resolver = resolver_with(store.clone(), StubFeed::new(vec![]));
        let original = json!({"action": "transfer", "recipient": JUAN, "amount": 5, "message": "ok"});

        let mut i = intent(original.clone());
        resolver.resolve(&mut i).await;
        assert_eq!(i.into_value(), original);
        assert_eq!(store.calls(), 0);
    }

    #[test]
    fn test_holding_and_symbol_lists() {
        assert_eq!(
            holding_list(Some(&json!([{"symbol": "BTC", "amount": "0.5"}, {"symbol": "ETH"}]))),
            vec![("BTC".to_string(), 0.5)]
        );
        assert_eq!(symbol_list(Some(&json!(["btc", " ", "eth"]))), vec!["btc", "eth"]);
        assert!(symbol_list(None).is_empty());
    }
}
