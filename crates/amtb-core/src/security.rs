use crate::{domain::User, errors::Error, Result};

// ============== Authorization ==============

/// Check a sender against the configured allow-list.
///
/// Entries that parse as integers match the numeric user id, every other entry
/// matches the username (case-insensitive, optional leading `@`). An empty
/// allow-list rejects everyone.
pub fn is_authorized(user: Option<&User>, allowed_users: &[String]) -> bool {
    let Some(user) = user else {
        return false;
    };
    if allowed_users.is_empty() {
        return false;
    }

    allowed_users.iter().any(|entry| {
        let entry = entry.trim();
        if let Ok(id) = entry.parse::<i64>() {
            return id == user.id.0;
        }
        let wanted = entry.trim_start_matches('@');
        user.username
            .as_deref()
            .is_some_and(|name| name.eq_ignore_ascii_case(wanted))
            || (user.username.is_none() && user.full_name == entry)
    })
}

/// [`is_authorized`] as a `Result`, failing with [`Error::Unauthorized`].
pub fn authorize(user: Option<&User>, allowed_users: &[String]) -> Result<()> {
    if is_authorized(user, allowed_users) {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}
