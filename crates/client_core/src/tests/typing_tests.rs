use super::*;

fn names(aggregator: &TypingAggregator) -> Vec<String> {
    aggregator.typists()
}

#[test]
fn renders_one_and_many_typists() {
    let now = Instant::now();
    let mut aggregator = TypingAggregator::new();
    assert_eq!(aggregator.indicator(), None);

    aggregator.set_typing("U1", true, now);
    aggregator.set_typing("U2", true, now);
    aggregator.set_typing("U1", false, now);
    assert_eq!(aggregator.indicator().as_deref(), Some("U2 is typing"));

    let mut aggregator = TypingAggregator::new();
    for user in ["U1", "U2", "U3"] {
        aggregator.set_typing(user, true, now);
    }
    assert_eq!(
        aggregator.indicator().as_deref(),
        Some("U1, U2, U3 are typing")
    );
}

#[test]
fn reactivation_moves_typist_to_the_end() {
    let now = Instant::now();
    let mut aggregator = TypingAggregator::new();
    assert!(aggregator.set_typing("alice", true, now));
    assert!(aggregator.set_typing("bob", true, now));
    assert!(aggregator.set_typing("alice", true, now + Duration::from_millis(10)));

    assert_eq!(names(&aggregator), vec!["bob", "alice"]);
    assert_eq!(
        aggregator.indicator().as_deref(),
        Some("bob, alice are typing")
    );

    // Refreshing the most recent typist changes nothing visible.
    assert!(!aggregator.set_typing("alice", true, now + Duration::from_millis(20)));
    assert_eq!(names(&aggregator), vec!["bob", "alice"]);
}

#[test]
fn removing_absent_user_is_a_no_op() {
    let mut aggregator = TypingAggregator::new();
    assert!(!aggregator.set_typing("ghost", false, Instant::now()));
    assert!(aggregator.is_empty());
}

#[test]
fn expiry_drops_only_stale_entries() {
    let start = Instant::now();
    let ttl = Duration::from_secs(3);
    let mut aggregator = TypingAggregator::new();
    aggregator.set_typing("alice", true, start);
    aggregator.set_typing("bob", true, start + Duration::from_secs(2));

    assert_eq!(aggregator.next_expiry(ttl), Some(start + ttl));
    assert!(aggregator
        .expire(start + Duration::from_secs(1), ttl)
        .is_empty());

    let removed = aggregator.expire(start + ttl, ttl);
    assert_eq!(removed, vec!["alice".to_string()]);
    assert_eq!(names(&aggregator), vec!["bob"]);
    assert_eq!(
        aggregator.next_expiry(ttl),
        Some(start + Duration::from_secs(5))
    );
}

#[test]
fn refresh_postpones_expiry() {
    let start = Instant::now();
    let ttl = Duration::from_secs(3);
    let mut aggregator = TypingAggregator::new();
    aggregator.set_typing("alice", true, start);
    aggregator.set_typing("alice", true, start + Duration::from_secs(2));

    assert!(aggregator.expire(start + ttl, ttl).is_empty());
}

#[test]
fn debounce_emits_start_once_and_stop_after_last_keystroke() {
    let window = Duration::from_millis(1000);
    let start = Instant::now();
    let mut debounce = TypingDebounce::new(window);

    assert_eq!(
        debounce.keystroke(start),
        Some(ClientRequest::Typing { is_typing: true })
    );
    let mut last = start;
    for step in 1..=5 {
        last = start + Duration::from_millis(step * 300);
        assert_eq!(debounce.keystroke(last), None);
        assert_eq!(debounce.poll(last), None);
    }

    assert_eq!(debounce.deadline(), Some(last + window));
    assert_eq!(debounce.poll(last + Duration::from_millis(999)), None);
    assert_eq!(
        debounce.poll(last + window),
        Some(ClientRequest::Typing { is_typing: false })
    );
    assert_eq!(debounce.poll(last + window * 2), None);
    assert!(!debounce.is_typing());
}

#[test]
fn cancel_discards_pending_stop() {
    let now = Instant::now();
    let mut debounce = TypingDebounce::new(Duration::from_millis(1000));
    debounce.keystroke(now);
    debounce.cancel();

    assert_eq!(debounce.deadline(), None);
    assert_eq!(debounce.poll(now + Duration::from_secs(5)), None);
    assert_eq!(
        debounce.keystroke(now + Duration::from_secs(6)),
        Some(ClientRequest::Typing { is_typing: true })
    );
}
