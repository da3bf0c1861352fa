//! Per-chat conversation state.
//!
//! The transition function is pure: it only decides what should happen.
//! Executing the resulting actions is the controller's job.

use std::collections::HashMap;

/// Label of the menu entry that re-opens the currency keyboard.
pub const MENU_LABEL: &str = "Currency rates";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Normal,
    /// The admin ran /send; their next text is broadcast.
    AwaitingBroadcastText,
}

/// Inbound user event, already decoded from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    MenuLabel,
    CurrencyPressed(String),
    BroadcastCommand,
    Text(String),
}

impl Event {
    /// Classify a plain text message.
    pub fn from_text(text: &str) -> Self {
        if text.trim() == MENU_LABEL {
            Event::MenuLabel
        } else {
            Event::Text(text.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RegisterIdentity,
    ShowCurrencies,
    LookupPrice(String),
    PromptBroadcastText,
    DenyAccess,
    Broadcast(String),
}

/// Decide the next state and the actions for one event.
pub fn transition(
    state: ConversationState,
    event: Event,
    is_admin: bool,
) -> (ConversationState, Vec<Action>) {
    use ConversationState::*;

    match (state, event) {
        (state, Event::Start) => (state, vec![Action::RegisterIdentity, Action::ShowCurrencies]),
        (state, Event::CurrencyPressed(symbol)) => (state, vec![Action::LookupPrice(symbol)]),
        (_, Event::BroadcastCommand) if is_admin => {
            (AwaitingBroadcastText, vec![Action::PromptBroadcastText])
        }
        (state, Event::BroadcastCommand) => (state, vec![Action::DenyAccess]),
        (AwaitingBroadcastText, Event::MenuLabel) => {
            (Normal, vec![Action::Broadcast(MENU_LABEL.to_string())])
        }
        (AwaitingBroadcastText, Event::Text(text)) => (Normal, vec![Action::Broadcast(text)]),
        (Normal, Event::MenuLabel) => (Normal, vec![Action::ShowCurrencies]),
        (Normal, Event::Text(_)) => (Normal, vec![]),
    }
}

/// In-memory state of every chat that has left the default state.
#[derive(Debug, Default)]
pub struct Conversations {
    states: HashMap<i64, ConversationState>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, identity: i64) -> ConversationState {
        self.states.get(&identity).copied().unwrap_or_default()
    }

    /// Apply one event for `identity` and return the actions to run.
    pub fn advance(&mut self, identity: i64, event: Event, is_admin: bool) -> Vec<Action> {
        let (next, actions) = transition(self.state(identity), event, is_admin);
        match next {
            ConversationState::Normal => {
                self.states.remove(&identity);
            }
            other => {
                self.states.insert(identity, other);
            }
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::ConversationState::*;
    use super::*;

    #[test]
    fn test_start_registers_and_shows_keyboard() {
        let (state, actions) = transition(Normal, Event::Start, false);
        assert_eq!(state, Normal);
        assert_eq!(actions, vec![Action::RegisterIdentity, Action::ShowCurrencies]);
    }

    #[test]
    fn test_menu_label_shows_keyboard() {
        assert_eq!(Event::from_text("  Currency rates "), Event::MenuLabel);
        let (state, actions) = transition(Normal, Event::MenuLabel, false);
        assert_eq!(state, Normal);
        assert_eq!(actions, vec![Action::ShowCurrencies]);
    }

    #[test]
    fn test_currency_press_looks_up_payload_verbatim() {
        let (_, actions) = transition(Normal, Event::CurrencyPressed("eth".into()), false);
        assert_eq!(actions, vec![Action::LookupPrice("eth".into())]);
    }

    #[test]
    fn test_non_admin_broadcast_is_denied() {
        let (state, actions) = transition(Normal, Event::BroadcastCommand, false);
        assert_eq!(state, Normal);
        assert_eq!(actions, vec![Action::DenyAccess]);
    }

    #[test]
    fn test_admin_broadcast_flow() {
        let (state, actions) = transition(Normal, Event::BroadcastCommand, true);
        assert_eq!(state, AwaitingBroadcastText);
        assert_eq!(actions, vec![Action::PromptBroadcastText]);

        let (state, actions) = transition(state, Event::Text("Hello all".into()), true);
        assert_eq!(state, Normal);
        assert_eq!(actions, vec![Action::Broadcast("Hello all".into())]);
    }

    #[test]
    fn test_menu_label_while_awaiting_is_broadcast_text() {
        let (state, actions) = transition(AwaitingBroadcastText, Event::MenuLabel, true);
        assert_eq!(state, Normal);
        assert_eq!(actions, vec![Action::Broadcast(MENU_LABEL.into())]);
    }

    #[test]
    fn test_plain_text_in_normal_state_is_ignored() {
        let (state, actions) = transition(Normal, Event::Text("hi".into()), false);
        assert_eq!(state, Normal);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_waiting_is_scoped_to_the_admin() {
        let mut conversations = Conversations::new();
        conversations.advance(100, Event::BroadcastCommand, true);
        assert_eq!(conversations.state(100), AwaitingBroadcastText);

        // Another chat's text is not captured as the broadcast.
        let actions = conversations.advance(200, Event::Text("not for everyone".into()), false);
        assert!(actions.is_empty());
        assert_eq!(conversations.state(100), AwaitingBroadcastText);

        let actions = conversations.advance(100, Event::Text("news".into()), true);
        assert_eq!(actions, vec![Action::Broadcast("news".into())]);
        assert_eq!(conversations.state(100), Normal);
    }

    #[test]
    fn test_denied_command_never_changes_state() {
        let mut conversations = Conversations::new();
        for _ in 0..3 {
            let actions = conversations.advance(200, Event::BroadcastCommand, false);
            assert_eq!(actions, vec![Action::DenyAccess]);
            assert_eq!(conversations.state(200), Normal);
        }
    }
}
