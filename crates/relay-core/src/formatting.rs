//! HTML helpers for operator notices (Telegram HTML parse mode).

use crate::messaging::types::Sender;

/// Escape text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// "First Last", or just "First" when no last name is set.
pub fn display_name(sender: &Sender) -> String {
    match sender.last_name.as_deref().map(str::trim) {
        Some(last) if !last.is_empty() => format!("{} {}", sender.first_name.trim(), last),
        _ => sender.first_name.trim().to_string(),
    }
}

/// `@handle`, or a placeholder for users without a public username.
pub fn handle(sender: &Sender) -> String {
    match sender.username.as_deref() {
        Some(u) if !u.is_empty() => format!("@{u}"),
        _ => "no handle".to_string(),
    }
}
