//! Integration Tests for the Reactive System
//!
//! These tests verify that reactive containers, effects, watchers and the
//! scheduler work together correctly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use lattice_runtime::reactive::graph::subscriber_count;
use lattice_runtime::reactive::{
    effect, reactive, untracked, watch, Effect, Object, ReactiveContext, TrackKey, Value,
    WatchOptions, WatchSource,
};
use lattice_runtime::scheduler::{self, flush_all, flush_jobs, has_pending_jobs};
use lattice_runtime::{RuntimeConfig, RuntimeError};

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (count.clone(), count)
}

/// Test that a write re-runs a reader exactly once after the flush.
#[test]
fn effect_reruns_once_after_flush() {
    let state = reactive(&Object::new().with("count", 0));
    let (runs, sink) = counter();

    let reader = state.clone();
    effect(move || {
        reader.get("count");
        sink.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    state.set("count", 1);
    // Deferred until the flush
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    flush_jobs().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that writing the same value does not re-run anything.
#[test]
fn same_value_write_is_silent() {
    let state = reactive(&Object::new().with("name", "lattice").with("nan", f64::NAN));
    let (runs, sink) = counter();

    let reader = state.clone();
    effect(move || {
        reader.get("name");
        reader.get("nan");
        sink.fetch_add(1, Ordering::SeqCst);
    });

    state.set("name", "lattice");
    state.set("nan", f64::NAN);
    assert!(!has_pending_jobs());
    flush_all().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Test that many writes in one turn cause a single re-run.
#[test]
fn writes_in_one_turn_are_batched() {
    let state = reactive(&Object::new().with("a", 0).with("b", 0).with("c", 0));
    let (runs, sink) = counter();
    let total = Arc::new(Mutex::new(0.0));

    let reader = state.clone();
    let seen = total.clone();
    effect(move || {
        let sum: f64 = ["a", "b", "c"]
            .iter()
            .filter_map(|k| reader.get(k).as_f64())
            .sum();
        *seen.lock() = sum;
        sink.fetch_add(1, Ordering::SeqCst);
    });

    for round in 1..=5 {
        state.set("a", round);
        state.set("b", round * 10);
        state.set("c", round * 100);
    }
    flush_all().unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(*total.lock(), 555.0);
}

/// Test that a stopped effect never runs again, even with a re-run queued.
#[test]
fn stopped_effect_never_reruns() {
    let state = reactive(&Object::new().with("x", 1));
    let (runs, sink) = counter();

    let reader = state.clone();
    let handle = effect(move || {
        reader.get("x");
        sink.fetch_add(1, Ordering::SeqCst);
    });

    state.set("x", 2);
    handle.stop();
    flush_all().unwrap();
    state.set("x", 3);
    flush_all().unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(subscriber_count(state.raw(), &TrackKey::field("x")), 0);
}

/// Test that nested effects restore the outer computation's identity.
#[test]
fn nested_effects_track_independently() {
    let state = reactive(&Object::new().with("outer", 0).with("inner", 0));
    let (outer_runs, outer_sink) = counter();
    let (inner_runs, inner_sink) = counter();

    let inner_state = state.clone();
    let inner = Effect::new(move || {
        inner_state.get("inner");
        inner_sink.fetch_add(1, Ordering::SeqCst);
    });

    let outer_state = state.clone();
    let nested = inner.clone();
    let outer = Effect::new(move || {
        nested.run();
        // Attributed to the outer effect again after the inner run
        outer_state.get("outer");
        outer_sink.fetch_add(1, Ordering::SeqCst);
    });
    outer.run();
    assert_eq!(ReactiveContext::depth(), 0);

    state.set("inner", 1);
    assert_eq!(inner_runs.load(Ordering::SeqCst), 2);
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);

    state.set("outer", 1);
    assert_eq!(outer_runs.load(Ordering::SeqCst), 2);
}

/// Test that nested containers become reactive when read.
#[test]
fn nested_containers_are_reactive_on_read() {
    let inner = Object::new().with("street", "Main");
    let state = reactive(&Object::new().with("address", inner.clone()));
    let (runs, sink) = counter();

    let reader = state.clone();
    effect(move || {
        if let Some(address) = reader.get("address").as_reactive() {
            address.get("street");
        }
        sink.fetch_add(1, Ordering::SeqCst);
    });

    reactive(&inner).set("street", "Elm");
    flush_all().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that adding fields re-runs key iteration.
#[test]
fn key_iteration_sees_new_fields() {
    let state = reactive(&Object::new());
    let keys = Arc::new(Mutex::new(Vec::new()));

    let reader = state.clone();
    let sink = keys.clone();
    effect(move || {
        *sink.lock() = reader.keys().iter().map(|k| k.to_string()).collect::<Vec<_>>();
    });

    state.set("first", 1);
    state.set("second", 2);
    flush_all().unwrap();
    assert_eq!(*keys.lock(), vec!["first".to_owned(), "second".to_owned()]);

    state.remove("first");
    flush_all().unwrap();
    assert_eq!(*keys.lock(), vec!["second".to_owned()]);
}

/// Test that deep watch fires on nested changes and survives cycles.
#[test]
fn deep_watch_fires_on_nested_change_with_cycles() {
    let leaf = Object::new().with("value", 1);
    let middle = Object::new().with("leaf", leaf.clone());
    let root = Object::new().with("middle", middle.clone());
    // root -> middle -> root
    middle.insert("back", root.clone());

    let state = reactive(&root);
    let (fired, sink) = counter();
    let handle = watch(
        &state,
        move |_new, _old| {
            sink.fetch_add(1, Ordering::SeqCst);
        },
        WatchOptions::default(),
    );
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    reactive(&leaf).set("value", 2);
    flush_all().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    handle.stop();
    reactive(&leaf).set("value", 3);
    flush_all().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Break the cycle so the containers can be freed.
    middle.remove("back");
}

/// Test that a getter watch reports new and old values.
#[test]
fn getter_watch_reports_old_and_new() {
    let state = reactive(&Object::new().with("n", 1));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let reader = state.clone();
    let sink = seen.clone();
    watch(
        WatchSource::getter(move || reader.get("n")),
        move |new, old| sink.lock().push((new.to_text(), old.to_text())),
        WatchOptions::immediate(),
    );

    state.set("n", 2);
    flush_all().unwrap();
    state.set("n", 2);
    flush_all().unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            ("1".to_owned(), "null".to_owned()),
            ("2".to_owned(), "1".to_owned())
        ]
    );
}

/// Test that watch callbacks run before effects queued in the same turn.
#[test]
fn watch_callbacks_run_before_effects() {
    let state = reactive(&Object::new().with("n", 0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let reader = state.clone();
    let log = order.clone();
    effect(move || {
        reader.get("n");
        log.lock().push("effect");
    });

    let reader = state.clone();
    let log = order.clone();
    watch(
        WatchSource::getter(move || reader.get("n")),
        move |_, _| log.lock().push("watch"),
        WatchOptions::default(),
    );

    order.lock().clear();
    state.set("n", 1);
    flush_all().unwrap();
    assert_eq!(*order.lock(), vec!["watch", "effect"]);
}

/// Test that a value that is not reactive makes an inert watcher.
#[test]
fn watching_a_plain_value_is_inert() {
    let (fired, sink) = counter();
    let handle = watch(
        Value::from(5),
        move |_, _| {
            sink.fetch_add(1, Ordering::SeqCst);
        },
        WatchOptions::default(),
    );
    flush_all().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(handle.is_active());
}

/// Test that untracked reads do not subscribe.
#[test]
fn untracked_reads_do_not_subscribe() {
    let state = reactive(&Object::new().with("hidden", 0));
    let (runs, sink) = counter();

    let reader = state.clone();
    effect(move || {
        untracked(|| reader.get("hidden"));
        sink.fetch_add(1, Ordering::SeqCst);
    });

    state.set("hidden", 1);
    flush_all().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Test that a watcher feeding itself is cut off by the recursion limit.
#[test]
fn self_feeding_watch_hits_recursion_limit() {
    scheduler::configure(RuntimeConfig {
        recursion_limit: 5,
        ..RuntimeConfig::default()
    });

    let state = reactive(&Object::new().with("n", 0));
    let reader = state.clone();
    let writer = state.clone();
    watch(
        WatchSource::getter(move || reader.get("n")),
        move |new, _| writer.set("n", new.as_f64().unwrap_or_default() + 1.0),
        WatchOptions::default(),
    );

    state.set("n", 1);
    let err = flush_all().unwrap_err();
    assert!(matches!(err, RuntimeError::RecursionLimit { limit: 5, .. }));

    scheduler::configure(RuntimeConfig::default());
}

/// Test that effects bumping each other forever make `flush_all` give up.
#[test]
fn ping_pong_effects_hit_flush_limit() {
    scheduler::configure(RuntimeConfig {
        max_flush_cycles: 50,
        ..RuntimeConfig::default()
    });

    let a = reactive(&Object::new().with("n", 0));
    let b = reactive(&Object::new().with("n", 0));

    let (ra, wa) = (a.clone(), b.clone());
    let first = effect(move || {
        let n = ra.get("n").as_f64().unwrap_or_default();
        wa.set("n", n + 1.0);
    });
    let (rb, wb) = (b.clone(), a.clone());
    let second = effect(move || {
        let n = rb.get("n").as_f64().unwrap_or_default();
        wb.set("n", n + 1.0);
    });

    let err = flush_all().unwrap_err();
    assert!(matches!(err, RuntimeError::FlushLimit { cycles: 50 }));

    first.stop();
    second.stop();
    scheduler::configure(RuntimeConfig::default());
}

/// Test that `next_tick` drains everything queued so far.
#[tokio::test]
async fn next_tick_flushes_pending_work() {
    let state = reactive(&Object::new().with("ready", false));
    let (runs, sink) = counter();

    let reader = state.clone();
    effect(move || {
        reader.get("ready");
        sink.fetch_add(1, Ordering::SeqCst);
    });

    state.set("ready", true);
    scheduler::next_tick().await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert!(!has_pending_jobs());
}
