//! Unit tests for the bus error taxonomy.

use std::io;
use std::time::Duration;

use nix::errno::Errno;
use rstest::rstest;

use super::*;

#[rstest]
#[case(BusError::LineTooLong { limit: 1024 }, ErrorKind::Protocol)]
#[case(BusError::EmptyCommand, ErrorKind::Protocol)]
#[case(BusError::Truncated { position: "inside a request line" }, ErrorKind::Protocol)]
#[case(BusError::ShortWrite { expected: 5 }, ErrorKind::Transport)]
#[case(BusError::Multiplex { source: Errno::EBADF }, ErrorKind::Transport)]
#[case(BusError::CapacityExceeded { name: "vcl".into(), capacity: 2 }, ErrorKind::Capacity)]
#[case(BusError::Timeout { timeout: Duration::from_secs(2) }, ErrorKind::Timeout)]
#[case(BusError::ProviderNotFound { name: "vcl".into() }, ErrorKind::Programming)]
fn errors_report_their_kind(#[case] error: BusError, #[case] expected: ErrorKind) {
    assert_eq!(error.kind(), expected);
}

#[test]
fn only_timeouts_are_confined_to_the_call() {
    assert!(!BusError::Timeout { timeout: Duration::from_millis(5) }.is_fatal());
    assert!(BusError::EmptyCommand.is_fatal());
    assert!(BusError::EndpointClosed.is_fatal());
}

#[rstest]
#[case(io::ErrorKind::WouldBlock, true)]
#[case(io::ErrorKind::TimedOut, true)]
#[case(io::ErrorKind::BrokenPipe, false)]
fn read_timeouts_are_recognised(#[case] kind: io::ErrorKind, #[case] expected: bool) {
    let error = BusError::transport("read reply", io::Error::from(kind));
    assert_eq!(error.is_io_timeout(), expected);
}

#[test]
fn messages_name_the_failing_operation() {
    let error = BusError::transport("write request", io::Error::from(io::ErrorKind::BrokenPipe));
    assert!(error.to_string().starts_with("write request failed"));
    let error = BusError::CapacityExceeded {
        name: "vcl".into(),
        capacity: 3,
    };
    assert_eq!(error.to_string(), "provider 'vcl' accepts at most 3 consumers");
}

#[rstest]
#[case(BusError::transport("write reply", io::Error::from(io::ErrorKind::BrokenPipe)), true)]
#[case(BusError::transport("read request", io::Error::from(io::ErrorKind::ConnectionReset)), true)]
#[case(BusError::transport("read request", io::Error::from(io::ErrorKind::PermissionDenied)), false)]
#[case(BusError::ShortWrite { expected: 16 }, false)]
fn departed_peers_are_recognised(#[case] error: BusError, #[case] expected: bool) {
    assert_eq!(error.is_peer_gone(), expected);
}
