//! Turns the raw event stream into rerun decisions.
//!
//! Events are gathered until none has arrived for a full quiescence window.
//! The burst then yields at most one decision, and only if one of its events
//! is a write or creation of a file the filter accepts.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::filter::FilterChain;
use crate::pathop::PathOp;
use crate::watcher::Event;

/// Default quiet period ending a burst.
pub const QUIESCENCE: Duration = Duration::from_millis(300);

pub struct Debouncer {
    rx: Receiver<Event>,
    filter: FilterChain,
    quiescence: Duration,
}

/// What was seen during one burst.
#[derive(Debug, Default)]
struct Burst {
    events: usize,
    trigger: Option<PathOp>,
}

impl Debouncer {
    pub fn new(rx: Receiver<Event>, filter: FilterChain, quiescence: Duration) -> Self {
        Self {
            rx,
            filter,
            quiescence,
        }
    }

    /// Blocks until a burst contains a qualifying change and returns its
    /// first qualifying path. Returns `None` once the event source is gone.
    pub fn next_rerun(&self) -> Option<PathOp> {
        loop {
            debug!("Waiting for filesystem activity");
            let first = self.rx.recv().ok()?;

            let burst = self.settle(first);
            if let Some(pathop) = burst.trigger {
                debug!("Path updated: {:?} ({} events in burst)", pathop.path, burst.events);
                return Some(pathop);
            }

            debug!("No qualifying change in burst of {} events", burst.events);
        }
    }

    /// Keeps receiving until the source goes quiet for a whole window.
    fn settle(&self, first: Event) -> Burst {
        let mut burst = Burst::default();
        self.record(&mut burst, first);

        loop {
            match self.rx.recv_timeout(self.quiescence) {
                Ok(event) => self.record(&mut burst, event),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        burst
    }

    fn record(&self, burst: &mut Burst, event: Event) {
        burst.events += 1;

        let op = match event.op {
            Ok(op) => op,
            Err(err) => {
                match event.path {
                    Some(path) => error!("Watch error on {:?}: {}", path, err),
                    None => error!("Watch error: {}", err),
                }
                return;
            }
        };

        let path = match event.path {
            Some(path) => path,
            None => return,
        };

        if burst.trigger.is_some() {
            return;
        }

        let pathop = PathOp::new(&path, op);
        trace!("Event {:?} on {:?}", pathop.kind, pathop.path);
        if pathop.kind.is_trigger() && self.filter.should_rerun_file(&pathop.path) {
            burst.trigger = Some(pathop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Debouncer;
    use crate::filter::FilterChain;
    use crate::watcher::Event;
    use notify::op::{self, Op};
    use std::path::PathBuf;
    use std::sync::mpsc::{channel, Sender};
    use std::thread;
    use std::time::{Duration, Instant};

    const WINDOW: Duration = Duration::from_millis(100);

    fn event(path: &str, op_: Op) -> Event {
        Event {
            path: Some(PathBuf::from(path)),
            op: Ok(op_),
            cookie: None,
        }
    }

    fn debouncer() -> (Sender<Event>, Debouncer) {
        let (tx, rx) = channel();
        (tx, Debouncer::new(rx, FilterChain::defaults().unwrap(), WINDOW))
    }

    #[test]
    fn burst_yields_one_decision() {
        let (tx, debouncer) = debouncer();

        for _ in 0..10 {
            tx.send(event("/proj/main.go", op::WRITE)).unwrap();
        }
        tx.send(event("/proj/util.go", op::CREATE)).unwrap();
        drop(tx);

        let change = debouncer.next_rerun().unwrap();
        assert_eq!(change.path, PathBuf::from("/proj/main.go"));
        assert!(debouncer.next_rerun().is_none());
    }

    #[test]
    fn events_inside_window_extend_the_burst() {
        let (tx, debouncer) = debouncer();

        let sender = thread::spawn(move || {
            for _ in 0..5 {
                tx.send(event("/proj/main.go", op::WRITE)).unwrap();
                thread::sleep(WINDOW / 4);
            }
        });

        let start = Instant::now();
        assert!(debouncer.next_rerun().is_some());
        assert!(start.elapsed() >= WINDOW);
        sender.join().unwrap();
        assert!(debouncer.next_rerun().is_none());
    }

    #[test]
    fn separated_events_yield_two_decisions() {
        let (tx, debouncer) = debouncer();

        let sender = thread::spawn(move || {
            tx.send(event("/proj/main.go", op::WRITE)).unwrap();
            thread::sleep(WINDOW * 4);
            tx.send(event("/proj/app.conf", op::WRITE)).unwrap();
        });

        assert_eq!(debouncer.next_rerun().unwrap().path, PathBuf::from("/proj/main.go"));
        assert_eq!(debouncer.next_rerun().unwrap().path, PathBuf::from("/proj/app.conf"));
        sender.join().unwrap();
        assert!(debouncer.next_rerun().is_none());
    }

    #[test]
    fn qualifying_event_anywhere_in_burst() {
        let (tx, debouncer) = debouncer();

        tx.send(event("/proj/.#main.go", op::CREATE)).unwrap();
        tx.send(event("/proj/main.go~", op::WRITE)).unwrap();
        tx.send(event("/proj/main.go", op::WRITE)).unwrap();
        tx.send(event("/proj/.#main.go", op::REMOVE)).unwrap();
        drop(tx);

        assert_eq!(debouncer.next_rerun().unwrap().path, PathBuf::from("/proj/main.go"));
    }

    #[test]
    fn uninteresting_bursts_are_dropped() {
        let (tx, debouncer) = debouncer();

        tx.send(event("/proj/.#scratch.go", op::WRITE)).unwrap();
        tx.send(event("/proj/README.md", op::WRITE)).unwrap();
        tx.send(event("/proj/main.go", op::REMOVE)).unwrap();
        drop(tx);

        assert!(debouncer.next_rerun().is_none());
    }

    #[test]
    fn watch_errors_do_not_stop_the_loop() {
        let (tx, debouncer) = debouncer();

        let sender = thread::spawn(move || {
            tx.send(Event {
                path: None,
                op: Err(notify::Error::Generic("queue overflow".into())),
                cookie: None,
            })
            .unwrap();
            thread::sleep(WINDOW * 4);
            tx.send(event("/proj/main.go", op::CLOSE_WRITE)).unwrap();
        });

        assert_eq!(debouncer.next_rerun().unwrap().path, PathBuf::from("/proj/main.go"));
        sender.join().unwrap();
    }
}
