//! Command interpreter: free text to [`Intent`].
//!
//! The text generator is asked for a JSON object. When its reply does not
//! parse, the message is classified locally by keywords and the intent
//! carries no parameters at all; resolution must then fail closed.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::intent::{Action, Intent};
use crate::chain::AddressFormat;
use crate::providers::{Result, TextGenerator};

// Keywords match whole words; a trailing `*` marks a stem matched as a prefix.
const TRANSFER_WORDS: &[&str] = &[
    "transfer*", "transfiere", "send", "envía", "envia", "enviar", "manda", "mandar",
];
const BALANCE_WORDS: &[&str] = &["balance", "saldo", "saldos"];
const INCREMENT_WORDS: &[&str] = &["incrementa*", "aumenta*", "increment*"];
const READ_WORDS: &[&str] = &["contador", "valor", "counter", "value"];
const NETWORK_WORDS: &[&str] = &["red", "network", "info", "informaci*", "chain", "bloque*", "block*"];
const USER_WORDS: &[&str] = &["usuario*", "user", "users"];
const CONTACT_WORDS: &[&str] = &["contacto*", "contact", "contacts"];
const CREATE_WORDS: &[&str] = &[
    "crea*", "registr*", "nuevo", "nueva", "agreg*", "añad*", "create", "register", "add", "new",
];
const SEARCH_WORDS: &[&str] = &["busca*", "encuentr*", "obten*", "search", "find", "get"];

/// Build the instruction prompt for one address family.
pub fn system_prompt(format: AddressFormat) -> String {
    let (chain, unit, example_address, chain_actions) = match format {
        AddressFormat::Stacks => (
            "Stacks",
            "STX",
            "ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6",
            "'increment' (incrementar el contador), 'read' (leer el contador)",
        ),
        AddressFormat::Evm => (
            "Ethereum",
            "ETH",
            "0x52908400098527886E0F7030069857D2E4169EE7",
            "'network_info' (información de la red)",
        ),
    };

    format!(
        "Eres un asistente para interpretar comandos hacia contratos inteligentes en la blockchain de {chain}. \
Analiza el mensaje del usuario y devuelve SIEMPRE un único objeto JSON, sin texto adicional, con las claves:\n\
- 'action': una de 'transfer', 'transfer_to_contact', 'balance', {chain_actions}, 'list_users', 'get_user', \
'create_user', 'get_contacts', 'create_contact', 'get_price', 'get_multiple_prices', 'transfer_advice', \
'calculate_portfolio', 'advice' o 'none'\n\
- 'message': explicación breve de lo que se hará\n\
- 'recipient' y 'amount' para 'transfer' (dirección y cantidad de {unit})\n\
- 'contact_name' y 'amount' para 'transfer_to_contact' (cuando el destinatario es un nombre)\n\
- 'address' para 'balance'\n\
- 'username' y 'wallet_address' para 'create_user'; 'user_id' o 'wallet_address' para 'get_user'\n\
- 'nombre' y 'wallet_address' para 'create_contact'\n\
- 'symbol' para 'get_price', 'transfer_advice' y 'advice'; 'symbols' (lista) para 'get_multiple_prices'\n\
- 'holdings' (objeto símbolo -> cantidad) para 'calculate_portfolio'\n\n\
Ejemplos:\n\
Usuario: 'Transfiere 50 {unit} a {example_address}'\n\
Respuesta: {{\"action\": \"transfer\", \"recipient\": \"{example_address}\", \"amount\": 50, \"message\": \"Transferir 50 {unit} a la wallet {example_address}\"}}\n\n\
Usuario: 'Envía 5 {unit} a Carlos'\n\
Respuesta: {{\"action\": \"transfer_to_contact\", \"contact_name\": \"Carlos\", \"amount\": 5, \"message\": \"Transferir 5 {unit} a Carlos\"}}\n\n\
Usuario: '¿Cuánto vale BTC?'\n\
Respuesta: {{\"action\": \"get_price\", \"symbol\": \"BTC\", \"message\": \"Consultando el precio de BTC\"}}"
    )
}

/// Remove a fenced-code wrapper from a model reply.
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        trimmed
            .replace("```json", "")
            .replace("```", "")
            .trim()
            .to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse a cleaned reply as a JSON object.
pub fn parse_reply(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn matches_keyword(word: &str, keyword: &str) -> bool {
    match keyword.strip_suffix('*') {
        Some(stem) => word.starts_with(stem),
        None => word == keyword,
    }
}

/// True if any word of the message matches one of `keywords`.
fn has_keyword(words: &[&str], keywords: &[&str]) -> bool {
    words
        .iter()
        .any(|w| keywords.iter().any(|k| matches_keyword(w, k)))
}

/// Classify a message by keywords, in fixed priority order.
pub fn classify(message: &str, format: AddressFormat) -> Action {
    let lower = message.to_lowercase();
    let words = words(&lower);

    if has_keyword(&words, TRANSFER_WORDS) {
        return if format.find_in(message).is_some() {
            Action::Transfer
        } else {
            Action::TransferToContact
        };
    }
    if has_keyword(&words, BALANCE_WORDS) {
        return Action::Balance;
    }

    match format {
        AddressFormat::Stacks => {
            if has_keyword(&words, INCREMENT_WORDS) {
                return Action::Increment;
            }
            if has_keyword(&words, READ_WORDS) {
                return Action::Read;
            }
        }
        AddressFormat::Evm => {
            if has_keyword(&words, NETWORK_WORDS) {
                return Action::NetworkInfo;
            }
        }
    }

    if has_keyword(&words, USER_WORDS) {
        return if has_keyword(&words, CREATE_WORDS) {
            Action::CreateUser
        } else if has_keyword(&words, SEARCH_WORDS) {
            Action::GetUser
        } else {
            Action::ListUsers
        };
    }
    if has_keyword(&words, CONTACT_WORDS) {
        return if has_keyword(&words, CREATE_WORDS) {
            Action::CreateContact
        } else {
            Action::GetContacts
        };
    }

    Action::None
}

/// Turns chat messages into intents using a text generator.
#[derive(Clone)]
pub struct Interpreter {
    generator: Arc<dyn TextGenerator>,
    format: AddressFormat,
    prompt: String,
}

impl Interpreter {
    pub fn new(generator: Arc<dyn TextGenerator>, format: AddressFormat) -> Self {
        Self {
            generator,
            format,
            prompt: system_prompt(format),
        }
    }

    /// Interpret one message. Fails only when the generator call fails.
    pub async fn interpret(&self, message: &str, sender_wallet: Option<&str>) -> Result<Intent> {
        let reply = self.generator.complete(&self.prompt, message).await?;
        let text = strip_fences(&reply);

        let mut intent = match parse_reply(&text) {
            Some(map) => Intent::from_map(map),
            None => {
                let action = classify(message, self.format);
                tracing::debug!("Unparseable model reply, keyword fallback chose '{}'", action);
                Intent::new(action, text)
            }
        };

        if let Some(sender) = sender_wallet.filter(|s| !s.is_empty()) {
            intent.insert_missing("sender_wallet", sender);
        }
        intent.insert_missing("message", "");

        tracing::info!("Interpreted message as '{}'", intent.action());
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::StubGenerator;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_fences(" {\"a\": \"```\"} "), "{\"a\": \"```\"}");
    }

    #[test]
    fn test_parse_reply_only_objects() {
        assert!(parse_reply("{\"action\": \"read\"}").is_some());
        assert!(parse_reply("[1, 2]").is_none());
        assert!(parse_reply("Claro, te ayudo").is_none());
    }

    #[test]
    fn test_classify_priority_stacks() {
        let f = AddressFormat::Stacks;
        assert_eq!(classify("Envía 5 a Carlos", f), Action::TransferToContact);
        assert_eq!(
            classify("Transfiere 5 STX a ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6", f),
            Action::Transfer
        );
        assert_eq!(classify("envía mi saldo a Pedro", f), Action::TransferToContact);
        assert_eq!(classify("¿Cuál es mi SALDO?", f), Action::Balance);
        assert_eq!(classify("Incrementa el contador", f), Action::Increment);
        assert_eq!(classify("¿Qué valor tiene el contador?", f), Action::Read);
        assert_eq!(classify("info de la red", f), Action::None);
        assert_eq!(classify("hola", f), Action::None);
    }

    #[test]
    fn test_classify_evm_and_records() {
        let f = AddressFormat::Evm;
        assert_eq!(
            classify("send 1 ETH to 0x52908400098527886e0f7030069857d2e4169ee7", f),
            Action::Transfer
        );
        assert_eq!(classify("send 1 ETH to ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6", f), Action::TransferToContact);
        assert_eq!(classify("info de la red", f), Action::NetworkInfo);
        assert_eq!(classify("incrementa el contador", f), Action::None);
        assert_eq!(classify("lista los usuarios", f), Action::ListUsers);
        assert_eq!(classify("crear usuario Juan", f), Action::CreateUser);
        assert_eq!(classify("busca el usuario 3", f), Action::GetUser);
        assert_eq!(classify("mis contactos", f), Action::GetContacts);
        assert_eq!(classify("agrega un contacto", f), Action::CreateContact);
    }

    #[test]
    fn test_classify_short_keywords_are_whole_words() {
        let f = AddressFormat::Evm;
        assert_eq!(
            classify("find the user with address 0x52908400098527886e0f7030069857d2e4169ee7", f),
            Action::GetUser
        );
        assert_eq!(classify("show my contacts by address", f), Action::GetContacts);
        assert_eq!(classify("who is the sender of my last tx", f), Action::None);
        assert_eq!(classify("reduce the fee", f), Action::None);
        assert_eq!(classify("any news for this user?", f), Action::ListUsers);
        assert_eq!(classify("getting my contacts", f), Action::GetContacts);
        assert_eq!(classify("registrar usuario Ana", f), Action::CreateUser);
        assert_eq!(classify("transferir 3 a Luis", f), Action::TransferToContact);
    }

    #[tokio::test]
    async fn test_json_reply_with_fences() {
        let generator = StubGenerator::replying(
            "```json\n{\"action\": \"transfer_to_contact\", \"contact_name\": \"Carlos\", \"amount\": 5, \"message\": \"Transferir 5 STX a Carlos\"}\n```",
        );
        let interpreter = Interpreter::new(generator.clone(), AddressFormat::Stacks);

        let intent = interpreter
            .interpret("Envía 5 a Carlos", Some("ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6"))
            .await
            .unwrap();

        assert_eq!(generator.calls(), 1);
        assert_eq!(intent.action(), Action::TransferToContact);
        assert_eq!(intent.str_field("contact_name").as_deref(), Some("Carlos"));
        assert_eq!(
            intent.str_field("sender_wallet").as_deref(),
            Some("ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6")
        );
    }

    #[tokio::test]
    async fn test_model_sender_is_not_overwritten() {
        let generator =
            StubGenerator::replying("{\"action\": \"balance\", \"sender_wallet\": \"SPMODEL\"}");
        let interpreter = Interpreter::new(generator, AddressFormat::Stacks);

        let intent = interpreter.interpret("mi saldo", Some("STUSER")).await.unwrap();
        assert_eq!(intent.str_field("sender_wallet").as_deref(), Some("SPMODEL"));
        assert_eq!(intent.message(), "");
    }

    #[tokio::test]
    async fn test_fallback_fabricates_nothing() {
        let generator = StubGenerator::replying("Claro, enviaré 5 STX a Carlos.");
        let interpreter = Interpreter::new(generator, AddressFormat::Stacks);

        let intent = interpreter.interpret("Envía 5 a Carlos", None).await.unwrap();
        let value = intent.into_value();
        assert_eq!(
            value,
            serde_json::json!({
                "action": "transfer_to_contact",
                "message": "Claro, enviaré 5 STX a Carlos."
            })
        );
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        let interpreter = Interpreter::new(StubGenerator::failing(), AddressFormat::Evm);
        assert!(interpreter.interpret("hola", None).await.is_err());
    }

    #[test]
    fn test_prompt_lists_family_actions() {
        assert!(system_prompt(AddressFormat::Stacks).contains("'increment'"));
        assert!(!system_prompt(AddressFormat::Stacks).contains("'network_info'"));
        assert!(system_prompt(AddressFormat::Evm).contains("'network_info'"));
    }
}
