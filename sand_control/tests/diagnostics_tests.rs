//! Diagnostics bus under concurrent producers and subscribers.

use std::sync::Arc;
use std::thread;

use sand_common::config::LogLevel;
use sand_control::diagnostics::{DiagnosticsBus, LogEvent};

#[test]
fn concurrent_producers_keep_per_subscriber_order() {
    let bus = Arc::new(DiagnosticsBus::new(50, 10_000));
    let sub = bus.subscribe();

    let producers: Vec<_> = (0..4u32)
        .map(|p| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                for n in 0..500u32 {
                    bus.emit(LogEvent::new(LogLevel::Info, format!("producer{p}"), n, "tick"));
                }
            })
        })
        .collect();
    for handle in producers {
        handle.join().unwrap();
    }

    assert_eq!(bus.len(), 50);
    let events = sub.drain();
    assert_eq!(events.len(), 2000);

    // Each producer's lines arrive strictly increasing.
    for p in 0..4 {
        let source = format!("producer{p}");
        let lines: Vec<u32> = events
            .iter()
            .filter(|e| e.source == source)
            .map(|e| e.line)
            .collect();
        assert_eq!(lines, (0..500).collect::<Vec<_>>());
    }
}

#[test]
fn slow_subscriber_does_not_affect_others() {
    let bus = DiagnosticsBus::new(100, 4);
    let slow = bus.subscribe();
    let fast = bus.subscribe();

    for n in 0..10 {
        bus.emit(LogEvent::new(LogLevel::Debug, "t", n, "x"));
        // The fast subscriber keeps up.
        assert_eq!(fast.drain().len(), 1);
    }
    assert_eq!(slow.drain().len(), 4);
    assert_eq!(bus.dropped_deliveries(), 6);
    assert_eq!(bus.len(), 10);
}

#[test]
fn subscriber_on_another_thread_receives_live_events() {
    let bus = Arc::new(DiagnosticsBus::new(10, 100));
    let sub = bus.subscribe();
    let consumer = thread::spawn(move || {
        let mut seen = Vec::new();
        while let Ok(event) = sub.receiver().recv() {
            seen.push(event.message);
            if seen.len() == 3 {
                break;
            }
        }
        seen
    });

    for msg in ["connected", "homing", "streaming"] {
        bus.emit(LogEvent::new(LogLevel::Info, "sand_control::link", 1, msg));
    }
    assert_eq!(consumer.join().unwrap(), vec!["connected", "homing", "streaming"]);
}
