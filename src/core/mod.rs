//! Chat pipeline.
//!
//! A message goes through the [`Interpreter`] (text generator, keyword
//! fallback), then the [`Resolver`] (contacts, records, prices). The
//! resulting [`Intent`] is the response body.

pub mod contacts;
pub mod intent;
pub mod interpreter;
pub mod resolver;

pub use intent::{Action, Intent};
pub use interpreter::Interpreter;
pub use resolver::Resolver;

use crate::providers;

/// Run one chat message through both stages.
pub async fn handle_chat(
    interpreter: &Interpreter,
    resolver: &Resolver,
    message: &str,
    sender_wallet: Option<&str>,
) -> providers::Result<Intent> {
    let mut intent = interpreter.interpret(message, sender_wallet).await?;
    resolver.resolve(&mut intent).await;
    Ok(intent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::AddressFormat;
    use crate::oracle::tests::StubFeed;
    use crate::oracle::Oracle;
    use crate::providers::tests::StubGenerator;
    use crate::store::tests::CountingStore;

    #[tokio::test]
    async fn test_fallback_transfer_without_sender_fails_closed() {
        let generator = StubGenerator::replying("No entendí");
        let store = CountingStore::new();
        let interpreter = Interpreter::new(generator, AddressFormat::Stacks);
        let resolver = Resolver::new(
            Some(store.clone()),
            Oracle::new(StubFeed::new(vec![])),
            AddressFormat::Stacks,
        );

        let intent = handle_chat(&interpreter, &resolver, "Envía 5 a Carlos", None)
            .await
            .unwrap();

        assert_eq!(intent.action(), Action::TransferToContact);
        assert!(intent
            .str_field("error")
            .unwrap()
            .contains("Se requiere sender_wallet"));
        assert_eq!(store.calls(), 0);
    }
}
