use std::io;

use writegate::channel::buffer::{Drain, OutputBuffer};
use writegate::error::{ChannelError, ErrorKind};
use writegate::transport::MemoryTransport;

#[test]
fn test_offer_accepts_up_to_capacity() {
    let mut buffer = OutputBuffer::new(8);
    assert_eq!(buffer.offer(b"abcde"), 5);
    assert_eq!(buffer.offer(b"fghij"), 3);
    assert_eq!(buffer.len(), 8);
    assert_eq!(buffer.remaining(), 0);
    assert_eq!(buffer.offer(b"k"), 0);
}

#[test]
fn test_offer_all_rejects_without_mutation() {
    let mut buffer = OutputBuffer::new(8);
    buffer.offer_all(b"abc").unwrap();

    let err = buffer.offer_all(b"defghi").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    assert_eq!(
        err,
        ChannelError::CapacityExceeded {
            requested: 6,
            available: 5,
            capacity: 8,
        }
    );
    assert_eq!(buffer.len(), 3);
}

#[test]
fn test_offer_all_exact_fit() {
    let mut buffer = OutputBuffer::new(4);
    buffer.offer_all(b"abcd").unwrap();
    assert_eq!(buffer.remaining(), 0);
}

#[test]
fn test_drain_complete() {
    let transport = MemoryTransport::unbounded();
    let mut buffer = OutputBuffer::new(16);
    buffer.offer_all(b"hello").unwrap();

    assert_eq!(buffer.drain_to(&transport).unwrap(), Drain::Complete);
    assert!(buffer.is_empty());
    assert_eq!(transport.sent(), b"hello");
}

#[test]
fn test_drain_stops_at_blocked_send() {
    let transport = MemoryTransport::with_budget(3);
    let mut buffer = OutputBuffer::new(16);
    buffer.offer_all(b"abcdefgh").unwrap();

    assert_eq!(buffer.drain_to(&transport).unwrap(), Drain::Blocked);
    assert_eq!(buffer.len(), 5);
    assert_eq!(transport.sent(), b"abc");

    transport.grant(2);
    assert_eq!(buffer.drain_to(&transport).unwrap(), Drain::Blocked);
    assert_eq!(transport.sent(), b"abcde");

    transport.set_budget(None);
    assert_eq!(buffer.drain_to(&transport).unwrap(), Drain::Complete);
    assert_eq!(transport.sent(), b"abcdefgh");
}

#[test]
fn test_drain_zero_budget_is_blocked() {
    let transport = MemoryTransport::with_budget(0);
    let mut buffer = OutputBuffer::new(4);
    buffer.offer_all(b"ab").unwrap();

    assert_eq!(buffer.drain_to(&transport).unwrap(), Drain::Blocked);
    assert_eq!(buffer.len(), 2);
}

#[test]
fn test_drain_empty_buffer_is_complete() {
    let transport = MemoryTransport::with_budget(0);
    let mut buffer = OutputBuffer::new(4);
    assert_eq!(buffer.drain_to(&transport).unwrap(), Drain::Complete);
}

#[test]
fn test_drain_propagates_transport_error() {
    let transport = MemoryTransport::unbounded();
    transport.fail_with(io::ErrorKind::ConnectionReset);
    let mut buffer = OutputBuffer::new(4);
    buffer.offer_all(b"ab").unwrap();

    let err = buffer.drain_to(&transport).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    assert_eq!(buffer.len(), 2);
}

#[test]
fn test_clear_discards_pending() {
    let mut buffer = OutputBuffer::new(4);
    buffer.offer_all(b"abcd").unwrap();
    buffer.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer.remaining(), buffer.capacity());
}

#[test]
fn test_zero_capacity_is_raised() {
    let mut buffer = OutputBuffer::new(0);
    assert_eq!(buffer.capacity(), 1);
    assert_eq!(buffer.offer(b"ab"), 1);
}
