//! Shared fixtures for bridge tests.

use crate::bridge::adapters::ScriptedBridgeTransport;
use crate::bridge::domain::EndpointResolver;
use crate::bridge::services::{CommandDispatcher, DispatcherSettings};
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use std::sync::{Arc, Mutex};

/// Clock that advances by a fixed step every time it is read.
#[derive(Debug)]
pub struct SteppingClock {
    now: Mutex<DateTime<Utc>>,
    step: TimeDelta,
}

impl SteppingClock {
    pub fn starting_at(start: DateTime<Utc>, step: TimeDelta) -> Self {
        Self {
            now: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().expect("clock lock");
        let current = *now;
        *now = current + self.step;
        current
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn loopback_resolver() -> EndpointResolver {
    EndpointResolver::new("http://127.0.0.1:4312/run", "/run", None)
}

pub fn dispatcher(
    transport: &Arc<ScriptedBridgeTransport>,
) -> Arc<CommandDispatcher<ScriptedBridgeTransport>> {
    Arc::new(
        CommandDispatcher::new(
            Arc::clone(transport),
            &loopback_resolver(),
            DispatcherSettings::default(),
        )
        .expect("endpoint resolves"),
    )
}
