//! Addressing for property, permission and command requests.

use serde_json::Value;

use crate::error::ScopeError;

/// Restricts an operation to a network, and optionally a channel or user.
///
/// A scope with no fields set is universal: it covers everything the bot
/// knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Network name.
    pub network: Option<String>,
    /// Channel (or other receiving entity).
    pub receiver: Option<String>,
    /// User that sent the message.
    pub sender: Option<String>,
}

impl Scope {
    /// The universal scope.
    pub fn universal() -> Self {
        Self::default()
    }

    /// Scope covering a whole network.
    pub fn network(network: impl Into<String>) -> Self {
        Self {
            network: Some(network.into()),
            ..Self::default()
        }
    }

    /// Restricts the scope to a receiver.
    #[must_use]
    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    /// Restricts the scope to a sender.
    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Whether no field is set.
    pub fn is_universal(&self) -> bool {
        self.network.is_none() && self.receiver.is_none() && self.sender.is_none()
    }

    /// Scope as sent with property and permission requests.
    ///
    /// Fields are emitted in network, receiver, sender order and stop at the
    /// first missing one, so a sender without a receiver is dropped.
    pub fn to_address_list(&self) -> Vec<String> {
        [&self.network, &self.receiver, &self.sender]
            .into_iter()
            .map_while(|field| field.clone())
            .collect()
    }

    /// Scope as appended to a command subscription.
    ///
    /// A receiver is tagged with `false`, a sender with `true`.
    pub fn to_command_list(&self) -> Result<Vec<Value>, ScopeError> {
        if self.receiver.is_some() && self.sender.is_some() {
            return Err(ScopeError::SenderAndReceiver);
        }

        let mut list = Vec::new();
        if let Some(network) = &self.network {
            list.push(Value::from(network.as_str()));
            if let Some(receiver) = &self.receiver {
                list.push(Value::Bool(false));
                list.push(Value::from(receiver.as_str()));
            }
            if let Some(sender) = &self.sender {
                list.push(Value::Bool(true));
                list.push(Value::from(sender.as_str()));
            }
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn universal_scope() {
        assert!(Scope::universal().is_universal());
        assert!(!Scope::network("n").is_universal());
        assert!(!Scope::default().with_sender("u").is_universal());
        assert!(Scope::universal().to_address_list().is_empty());
        assert!(Scope::universal().to_command_list().unwrap().is_empty());
    }

    #[test]
    fn address_list_follows_field_order() {
        assert_eq!(Scope::network("n").to_address_list(), vec!["n"]);
        assert_eq!(
            Scope::network("n").with_receiver("c").to_address_list(),
            vec!["n", "c"]
        );
        assert_eq!(
            Scope::network("n")
                .with_receiver("c")
                .with_sender("u")
                .to_address_list(),
            vec!["n", "c", "u"]
        );
    }

    #[test]
    fn address_list_skips_fields_after_a_gap() {
        assert_eq!(Scope::network("n").with_sender("u").to_address_list(), vec!["n"]);
        assert!(Scope::default().with_receiver("c").to_address_list().is_empty());
    }

    #[test]
    fn command_list_tags_receiver_and_sender() {
        assert_eq!(
            Scope::network("n").to_command_list().unwrap(),
            vec![json!("n")]
        );
        assert_eq!(
            Scope::network("n").with_receiver("c").to_command_list().unwrap(),
            vec![json!("n"), json!(false), json!("c")]
        );
        assert_eq!(
            Scope::network("n").with_sender("u").to_command_list().unwrap(),
            vec![json!("n"), json!(true), json!("u")]
        );
    }

    #[test]
    fn command_list_needs_a_network_before_sentinels() {
        assert!(
            Scope::default()
                .with_receiver("c")
                .to_command_list()
                .unwrap()
                .is_empty()
        );
        assert!(
            Scope::default()
                .with_sender("u")
                .to_command_list()
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn command_list_rejects_sender_and_receiver() {
        let scope = Scope::default().with_receiver("c").with_sender("u");
        assert_eq!(scope.to_command_list(), Err(ScopeError::SenderAndReceiver));

        let scope = Scope::network("n").with_receiver("c").with_sender("u");
        assert_eq!(scope.to_command_list(), Err(ScopeError::SenderAndReceiver));
    }
}
