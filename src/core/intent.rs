//! Intent: the structured command produced from a chat message.
//!
//! An intent is an open JSON object. The interpreter fills `action` and
//! `message` plus whatever parameters the model extracted; the resolver
//! adds fields as it works. The object that comes out is the response body.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Known actions. Anything else is carried through as [`Action::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    TransferToContact,
    Transfer,
    Balance,
    Increment,
    Read,
    NetworkInfo,
    ListUsers,
    GetUser,
    CreateUser,
    GetContacts,
    CreateContact,
    GetPrice,
    GetMultiplePrices,
    TransferAdvice,
    CalculatePortfolio,
    Advice,
    None,
    Other(String),
}

impl Action {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "transfer_to_contact" => Action::TransferToContact,
            "transfer" => Action::Transfer,
            "balance" => Action::Balance,
            "increment" => Action::Increment,
            "read" => Action::Read,
            "network_info" => Action::NetworkInfo,
            "list_users" => Action::ListUsers,
            "get_user" => Action::GetUser,
            "create_user" => Action::CreateUser,
            "get_contacts" => Action::GetContacts,
            "create_contact" => Action::CreateContact,
            "get_price" => Action::GetPrice,
            "get_multiple_prices" => Action::GetMultiplePrices,
            "transfer_advice" => Action::TransferAdvice,
            "calculate_portfolio" => Action::CalculatePortfolio,
            "advice" => Action::Advice,
            "" | "none" => Action::None,
            _ => Action::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::TransferToContact => "transfer_to_contact",
            Action::Transfer => "transfer",
            Action::Balance => "balance",
            Action::Increment => "increment",
            Action::Read => "read",
            Action::NetworkInfo => "network_info",
            Action::ListUsers => "list_users",
            Action::GetUser => "get_user",
            Action::CreateUser => "create_user",
            Action::GetContacts => "get_contacts",
            Action::CreateContact => "create_contact",
            Action::GetPrice => "get_price",
            Action::GetMultiplePrices => "get_multiple_prices",
            Action::TransferAdvice => "transfer_advice",
            Action::CalculatePortfolio => "calculate_portfolio",
            Action::Advice => "advice",
            Action::None => "none",
            Action::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    fields: Map<String, Value>,
    rewritten: bool,
}

impl Intent {
    pub fn new(action: Action, message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("action".to_string(), Value::String(action.as_str().to_string()));
        fields.insert("message".to_string(), Value::String(message.into()));
        Self {
            fields,
            rewritten: false,
        }
    }

    /// Wrap a parsed model reply. A missing or non-string `action` becomes
    /// `none`; `message` is left alone here.
    pub fn from_map(mut fields: Map<String, Value>) -> Self {
        let action = fields
            .get("action")
            .and_then(Value::as_str)
            .map(Action::parse)
            .unwrap_or(Action::None);
        fields.insert("action".to_string(), Value::String(action.as_str().to_string()));
        Self {
            fields,
            rewritten: false,
        }
    }

    pub fn action(&self) -> Action {
        self.fields
            .get("action")
            .and_then(Value::as_str)
            .map(Action::parse)
            .unwrap_or(Action::None)
    }

    pub fn message(&self) -> &str {
        self.fields
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Non-empty trimmed string field. Numbers are accepted and rendered.
    pub fn str_field(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Numeric field, accepting JSON numbers and numeric strings.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .filter(|n: &f64| n.is_finite())
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Set `key` only if it is absent.
    pub fn insert_missing(&mut self, key: &str, value: impl Into<Value>) {
        if !self.fields.contains_key(key) {
            self.insert(key, value);
        }
    }

    /// Replace the action. Allowed once per intent; later calls are refused.
    pub fn rewrite_action(&mut self, action: Action) -> bool {
        if self.rewritten {
            tracing::warn!(
                "Refusing second action rewrite {} -> {}",
                self.action(),
                action
            );
            return false;
        }
        self.rewritten = true;
        self.insert("action", action.as_str());
        true
    }

    /// Record a failure: `error` carries it and `message` shows it.
    pub fn set_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.insert("message", error.clone());
        self.insert("error", error);
    }

    /// Replace the message if the interpreter left it empty.
    pub fn default_message(&mut self, message: impl Into<String>) {
        if self.message().trim().is_empty() {
            self.insert("message", message.into());
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl Serialize for Intent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
