//! Tests for the crate's exported API surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::rstest;

use crate::{
    BusContext, CallResult, Config, ErrorKind, FatalPolicy, LogFormat, Status, telemetry,
    with_private,
};

#[rstest]
fn telemetry_initialisation_is_idempotent() {
    let config = Config::default()
        .with_log_format(LogFormat::Compact)
        .with_log_filter("cmdbus=debug");
    telemetry::initialise(&config).expect("first initialisation");
    telemetry::initialise(&config).expect("repeat initialisation");
}

#[rstest]
fn private_data_is_shared_with_the_provider() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = with_private(Arc::clone(&calls), |calls: &AtomicUsize, command| {
        let count = calls.fetch_add(1, Ordering::SeqCst) + 1;
        CallResult::new(Status::OK, format!("{command} #{count}"))
    });
    let mut context =
        BusContext::new(Config::default().with_on_fatal(FatalPolicy::Stop)).expect("context");
    context.provide("counter", handler).expect("provide");
    let mut endpoint = context.register("counter").expect("register");
    let handle = context.start("counter").expect("start");

    let first = crate::call!(endpoint, "hit {}", "a").expect("first call");
    let second = crate::call!(endpoint, "hit {}", "b").expect("second call");

    assert_eq!(first.answer(), "hit a #1");
    assert_eq!(second.into_answer(), "hit b #2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    handle.shutdown().expect("shutdown");
    handle.join().expect("clean stop");
}

#[rstest]
fn non_success_statuses_are_delivered_as_replies() {
    let mut context =
        BusContext::new(Config::default().with_on_fatal(FatalPolicy::Stop)).expect("context");
    context
        .provide("strict", |command: &str| {
            CallResult::new(Status::UNKNOWN, format!("Unknown request: {command}"))
        })
        .expect("provide");
    let mut endpoint = context.register("strict").expect("register");
    let handle = context.start("strict").expect("start");

    let result = endpoint.call("bogus").expect("call");

    assert_eq!(result.status(), Status::UNKNOWN);
    assert!(!result.status().is_success());
    assert_eq!(result.answer(), "Unknown request: bogus");
    assert!(!endpoint.is_closed());
    handle.shutdown().expect("shutdown");
    handle.join().expect("clean stop");
}

#[rstest]
fn registration_errors_are_programming_errors() {
    let mut context = BusContext::new(Config::default()).expect("context");
    let error = context.register("absent").expect_err("no provider");
    assert_eq!(error.kind(), ErrorKind::Programming);
    assert!(error.is_fatal());
}
