//! Unit tests for provider definition and consumer registration.

use std::io::Read;

use rstest::{fixture, rstest};

use super::*;
use crate::status::CallResult;

fn echo(command: &str) -> CallResult {
    CallResult::ok(command)
}

#[fixture]
fn context() -> BusContext {
    let config = Config::default().with_max_listeners(3);
    let mut context = BusContext::new(config).expect("valid config");
    context.provide("cache", echo).expect("define provider");
    context
}

#[rstest]
fn registrations_fill_slots_up_to_capacity(mut context: BusContext) {
    for expected in 0..3 {
        let endpoint = context.register("cache").expect("free slot");
        assert_eq!(endpoint.slot(), expected);
        assert_eq!(endpoint.provider(), "cache");
    }
    assert_eq!(context.listener_count("cache"), Some(3));

    let error = context.register("cache").expect_err("no free slot");
    assert!(matches!(
        error,
        BusError::CapacityExceeded { ref name, capacity: 3 } if name == "cache"
    ));
    assert!(error.is_fatal());
    assert_eq!(context.listener_count("cache"), Some(3));
}

#[rstest]
fn each_consumer_is_paired_with_its_own_listener(mut context: BusContext) {
    let _first = context.register("cache").expect("first");
    let mut second = context.register("cache").expect("second");
    assert_eq!(second.slot(), 1);

    second.close();

    let mut byte = [0_u8; 1];
    let mut closed = context.listener("cache", 1).expect("second listener");
    assert_eq!(closed.read(&mut byte).expect("read"), 0);

    let mut open = context.listener("cache", 0).expect("first listener");
    open.set_nonblocking(true).expect("non-blocking");
    let error = open.read(&mut byte).expect_err("nothing to read");
    assert_eq!(error.kind(), std::io::ErrorKind::WouldBlock);
}

#[rstest]
fn configured_timeout_reaches_consumers() {
    let config = Config::default().with_call_timeout(std::time::Duration::from_millis(750));
    let mut context = BusContext::new(config).expect("valid config");
    context.provide("vcl", echo).expect("define provider");
    let endpoint = context.register("vcl").expect("register");
    assert_eq!(endpoint.timeout(), std::time::Duration::from_millis(750));
}

#[rstest]
fn unknown_provider_is_reported(mut context: BusContext) {
    let registered = context.register("storage").expect_err("unknown name");
    assert!(matches!(registered, BusError::ProviderNotFound { ref name } if name == "storage"));
    let started = context.start("storage").expect_err("unknown name");
    assert!(matches!(started, BusError::ProviderNotFound { .. }));
    assert_eq!(context.listener_count("storage"), None);
}

#[rstest]
fn provider_names_are_unique(mut context: BusContext) {
    let error = context.provide("cache", echo).expect_err("duplicate");
    assert!(matches!(error, BusError::DuplicateProvider { ref name } if name == "cache"));
    assert_eq!(error.kind(), crate::error::ErrorKind::Programming);
}

#[rstest]
fn started_providers_refuse_registration(mut context: BusContext) {
    let endpoint = context.register("cache").expect("register");
    let handle = context.start("cache").expect("start");
    assert!(context.is_dispatching("cache"));
    assert_eq!(context.listener_count("cache"), None);

    let registered = context.register("cache").expect_err("already started");
    assert!(matches!(registered, BusError::ProviderStarted { .. }));
    let restarted = context.start("cache").expect_err("already started");
    assert!(matches!(restarted, BusError::ProviderStarted { .. }));

    drop(endpoint);
    handle.shutdown().expect("shutdown");
    handle.join().expect("clean stop");
}

#[rstest]
#[case(Config::default().with_max_listeners(0))]
#[case(Config::default().with_max_line_bytes(1))]
#[case(Config::default().with_call_timeout(std::time::Duration::ZERO))]
fn invalid_configuration_is_rejected(#[case] config: Config) {
    let Err(error) = BusContext::new(config) else {
        panic!("configuration should be rejected");
    };
    assert!(matches!(error, BusError::Config { .. }));
}
