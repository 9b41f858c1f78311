use super::*;

fn conversation() -> AppState {
    let mut state = AppState::default();
    state.messages.push(Message::user(MessageId(1), "first"));
    state.messages.push(Message::assistant_placeholder(MessageId(2)));
    state.messages.push(Message::user(MessageId(3), "second"));
    state.messages.push(Message::assistant_placeholder(MessageId(4)));
    state
}

#[test]
fn default_state_starts_on_welcome_panel() {
    let state = AppState::default();
    assert_eq!(state.panel, Panel::Welcome);
    assert_eq!(state.phase, Phase::Idle);
    assert!(state.messages.is_empty());
    assert!(!state.polling);
}

#[test]
fn last_assistant_is_most_recent_assistant_message() {
    let state = conversation();
    assert_eq!(state.last_assistant().map(|m| m.id), Some(MessageId(4)));
    assert_eq!(state.pending_replies(), 2);
}

#[test]
fn replace_content_targets_exact_message() {
    let mut state = conversation();
    assert!(state.replace_content(MessageId(2), "older reply"));

    assert_eq!(state.message(MessageId(2)).unwrap().content, "older reply");
    assert!(state.message(MessageId(4)).unwrap().is_pending());
    assert_eq!(state.message(MessageId(1)).unwrap().content, "first");
    assert_eq!(state.message(MessageId(3)).unwrap().content, "second");
}

#[test]
fn replace_content_reports_missing_message() {
    let mut state = conversation();
    state.messages.clear();
    assert!(!state.replace_content(MessageId(2), "late reply"));
    assert!(state.messages.is_empty());
}
