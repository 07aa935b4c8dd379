#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use moodbot::gateway::ClockGateway;
use moodbot::scheduler::{Scheduler, Wake};
use moodbot::{ContentItem, SessionClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scheduler that never waits; it records each requested pause instead
pub struct RecordingScheduler {
    sleeps: Arc<Mutex<Vec<Duration>>>,
    stop_after: Option<usize>,
    stopped: AtomicBool,
}

/// Shared view of the pauses a `RecordingScheduler` was asked for
#[derive(Clone)]
pub struct SleepLog(Arc<Mutex<Vec<Duration>>>);

impl SleepLog {
    pub fn durations(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

impl RecordingScheduler {
    /// Never reports a stop
    pub fn unbounded() -> (Self, SleepLog) {
        Self::build(None)
    }

    /// Reports a stop on the `n`th sleep
    pub fn stopping_after(n: usize) -> (Self, SleepLog) {
        Self::build(Some(n))
    }

    fn build(stop_after: Option<usize>) -> (Self, SleepLog) {
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Self {
            sleeps: sleeps.clone(),
            stop_after,
            stopped: AtomicBool::new(false),
        };
        (scheduler, SleepLog(sleeps))
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn sleep(&self, duration: Duration) -> Wake {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };
        tokio::task::yield_now().await;

        if self.stop_after.is_some_and(|n| count >= n) {
            self.stopped.store(true, Ordering::SeqCst);
            Wake::Stopped
        } else {
            Wake::Elapsed
        }
    }

    fn stop_requested(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Clock backend that accepts the request and never answers
pub struct HungClock;

#[async_trait]
impl ClockGateway for HungClock {
    async fn snapshot(&self) -> moodbot::Result<SessionClock> {
        std::future::pending().await
    }
}

pub fn open_clock(minutes_to_close: i64) -> SessionClock {
    let now = Utc::now();
    SessionClock {
        is_open: true,
        now,
        next_close: now + ChronoDuration::minutes(minutes_to_close),
        next_open: None,
    }
}

pub fn closed_clock() -> SessionClock {
    let now = Utc::now();
    SessionClock {
        is_open: false,
        now,
        next_close: now + ChronoDuration::hours(20),
        next_open: Some(now + ChronoDuration::hours(13)),
    }
}

pub fn tracks(count: usize) -> Vec<ContentItem> {
    (1..=count)
        .map(|n| ContentItem {
            name: format!("Track {}", n),
            uri: format!("spotify:track:{}", n),
            artist: Some(format!("Artist {}", n)),
        })
        .collect()
}
