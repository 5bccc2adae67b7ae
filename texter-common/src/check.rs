//! Recipient and body validation shared by all transports.

use crate::{Message, Result, TexterError};

/// Normalizes the recipients of `message` and validates it is sendable.
///
/// Recipients are trimmed, blank entries dropped and duplicates removed while
/// keeping the first occurrence. The recipient check runs against the raw
/// `to` list rather than the normalized one, so a list holding only
/// whitespace passes with no normalized recipients while an empty list fails.
///
/// # Errors
/// - [`TexterError::MissingRecipient`] if the raw recipient list is empty
/// - [`TexterError::MissingBody`] if the body is absent or only whitespace
pub fn check_delivery_params(message: &Message) -> Result<(Vec<String>, &str)> {
    let mut recipients: Vec<String> = Vec::with_capacity(message.to().len());
    for recipient in message.to().iter().map(|r| r.trim()) {
        if !recipient.is_empty() && !recipients.iter().any(|seen| seen == recipient) {
            recipients.push(recipient.to_string());
        }
    }

    if message.to().is_empty() {
        return Err(TexterError::MissingRecipient);
    }

    match message.body() {
        Some(body) if !body.trim().is_empty() => Ok((recipients, body)),
        _ => Err(TexterError::MissingBody),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn message(to: &[&str], body: Option<&str>) -> Message {
        let mut message = Message::new();
        message.set_to(to.to_vec());
        if let Some(body) = body {
            message.set_body(body);
        }
        message
    }

    #[test]
    fn test_empty_recipients_rejected() {
        let msg = message(&[], Some("x"));
        let result = check_delivery_params(&msg);
        assert!(matches!(result, Err(TexterError::MissingRecipient)));
    }

    #[test]
    fn test_blank_body_rejected() {
        for body in [None, Some(""), Some("  \n")] {
            let msg = message(&["+1"], body);
            let result = check_delivery_params(&msg);
            assert!(matches!(result, Err(TexterError::MissingBody)), "{body:?}");
        }
    }

    #[test]
    fn test_recipients_normalized() {
        let msg = message(&[" a ", "a", ""], Some("x"));
        let (recipients, body) = check_delivery_params(&msg).unwrap();

        assert_eq!(recipients, vec!["a".to_string()]);
        assert_eq!(body, "x");
    }

    #[test]
    fn test_first_seen_order_kept() {
        let msg = message(&["+2", " +1", "+2 ", "+3"], Some("x"));
        let (recipients, _) = check_delivery_params(&msg).unwrap();

        assert_eq!(recipients, vec!["+2", "+1", "+3"]);
    }

    #[test]
    fn test_whitespace_only_recipients_pass_raw_check() {
        let msg = message(&["  "], Some("x"));
        let (recipients, _) = check_delivery_params(&msg).unwrap();

        assert!(recipients.is_empty());
    }

    #[test]
    fn test_recipient_checked_before_body() {
        let msg = message(&[], None);
        let result = check_delivery_params(&msg);
        assert!(matches!(result, Err(TexterError::MissingRecipient)));
    }

    #[test]
    fn test_message_not_mutated() {
        let msg = message(&[" a "], Some("x"));
        let _ = check_delivery_params(&msg).unwrap();

        assert_eq!(msg.to(), [" a ".to_string()]);
    }
}
