//! Contact name resolution.

use crate::store::Contact;

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Find the contact a user meant by `term`.
///
/// An exact match (trimmed, case-insensitive) wins even when other names
/// contain the term; otherwise the first contact whose name contains the
/// term is chosen. Contacts are scanned in the order given.
pub fn resolve_contact<'a>(contacts: &'a [Contact], term: &str) -> Option<&'a Contact> {
    let term = normalize(term);
    if term.is_empty() {
        return None;
    }

    contacts
        .iter()
        .find(|c| normalize(&c.nombre) == term)
        .or_else(|| contacts.iter().find(|c| normalize(&c.nombre).contains(&term)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contacts(names: &[&str]) -> Vec<Contact> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Contact {
                id: i as i64 + 1,
                user_id: 1,
                nombre: n.to_string(),
                wallet_address: format!("ST{:038}", i),
                created_at: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_exact_match_beats_earlier_substring() {
        let list = contacts(&["Andrés García", "Andrés"]);
        assert_eq!(resolve_contact(&list, "  ANDRÉS ").map(|c| c.id), Some(2));
    }

    #[test]
    fn test_substring_takes_first() {
        let list = contacts(&["Pedro", "Carlos Ruiz", "Carlos Pérez"]);
        assert_eq!(resolve_contact(&list, "carlos").map(|c| c.id), Some(2));
        assert_eq!(resolve_contact(&list, "pérez").map(|c| c.id), Some(3));
    }

    #[test]
    fn test_no_match() {
        let list = contacts(&["Pedro"]);
        assert!(resolve_contact(&list, "María").is_none());
        assert!(resolve_contact(&list, "   ").is_none());
        assert!(resolve_contact(&[], "Pedro").is_none());
    }
}
