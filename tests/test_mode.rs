use writegate::channel::gate::ReadinessGate;
use writegate::channel::mode::{Mode, ModeGuard};
use writegate::error::{ChannelError, ErrorKind};

#[test]
fn test_first_write_selects_blocking() {
    let mut guard = ModeGuard::new();
    assert_eq!(guard.mode(), Mode::Undecided);
    assert_eq!(guard.begin_write().unwrap(), Mode::Blocking);
    assert_eq!(guard.begin_write().unwrap(), Mode::Blocking);
}

#[test]
fn test_listener_selects_nonblocking() {
    let mut guard = ModeGuard::new();
    guard.register_listener().unwrap();
    assert_eq!(guard.mode(), Mode::NonBlocking);
    assert_eq!(guard.begin_write().unwrap(), Mode::NonBlocking);
}

#[test]
fn test_listener_after_blocking_write_is_violation() {
    let mut guard = ModeGuard::new();
    guard.begin_write().unwrap();
    let err = guard.register_listener().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    assert_eq!(guard.mode(), Mode::Blocking);
}

#[test]
fn test_second_listener_is_violation() {
    let mut guard = ModeGuard::new();
    guard.register_listener().unwrap();
    let err = guard.register_listener().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[test]
fn test_blocking_write_after_listener_is_violation() {
    let mut guard = ModeGuard::new();
    guard.register_listener().unwrap();
    let err = guard.begin_blocking_write().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    assert_eq!(guard.mode(), Mode::NonBlocking);
}

#[test]
fn test_explicit_blocking_write_from_undecided() {
    let mut guard = ModeGuard::new();
    guard.begin_blocking_write().unwrap();
    assert_eq!(guard.mode(), Mode::Blocking);
}

#[test]
fn test_close_is_terminal() {
    let mut guard = ModeGuard::new();
    guard.register_listener().unwrap();
    assert!(guard.close());
    assert!(!guard.close());
    assert!(guard.is_closed());

    assert_eq!(guard.begin_write().unwrap_err(), ChannelError::AlreadyClosed);
    assert_eq!(guard.begin_blocking_write().unwrap_err(), ChannelError::AlreadyClosed);
    assert_eq!(guard.register_listener().unwrap_err(), ChannelError::AlreadyClosed);
}

#[test]
fn test_gate_duplicate_ready_signals() {
    let gate = ReadinessGate::new();
    gate.mark_not_ready();

    let transitions = (0..3).filter(|_| gate.mark_ready()).count();
    assert_eq!(transitions, 1);
    assert!(gate.is_ready());
}
