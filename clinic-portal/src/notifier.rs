//! Arrival Notifier
//!
//! Listens on the arrivals channel and raises a one-shot alert (modal plus a
//! short tone) when an arrival names the viewing faculty member. Matching is
//! on the trimmed, lowercased display identity. Arrivals that reach a session
//! before its identity has resolved are dropped, not queued.

use async_trait::async_trait;
use clinic_common::events::{ArrivalSnapshot, ClinicEvent};
use clinic_common::identity::IdentityState;
use clinic_common::Result;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::realtime::Subscription;
use crate::task::TaskHandle;

/// Modal title shown for every arrival
pub const ALERT_TITLE: &str = "Patient arrived";

/// Arrivals remembered for duplicate suppression
pub const DEDUPE_WINDOW: usize = 512;

/// Longest the notifier waits on the audio output
pub const TONE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
}

/// Synthesized alert tone: exponential attack to peak, exponential decay to
/// the floor, then silence at `stop`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneSpec {
    pub waveform: Waveform,
    pub frequency_hz: f32,
    pub floor_gain: f32,
    pub peak_gain: f32,
    #[serde(with = "millis")]
    pub attack: Duration,
    #[serde(with = "millis")]
    pub decay_end: Duration,
    #[serde(with = "millis")]
    pub stop: Duration,
}

impl ToneSpec {
    pub const ARRIVAL: ToneSpec = ToneSpec {
        waveform: Waveform::Sine,
        frequency_hz: 880.0,
        floor_gain: 0.001,
        peak_gain: 1.0,
        attack: Duration::from_millis(20),
        decay_end: Duration::from_millis(600),
        stop: Duration::from_millis(620),
    };

    /// Envelope gain `t` after the tone starts
    pub fn gain_at(&self, t: Duration) -> f32 {
        if t >= self.stop {
            return 0.0;
        }
        if t >= self.decay_end {
            return self.floor_gain;
        }
        if t < self.attack {
            let progress = t.as_secs_f32() / self.attack.as_secs_f32();
            return exp_ramp(self.floor_gain, self.peak_gain, progress);
        }
        let span = (self.decay_end - self.attack).as_secs_f32();
        let progress = (t - self.attack).as_secs_f32() / span;
        exp_ramp(self.peak_gain, self.floor_gain, progress)
    }
}

fn exp_ramp(from: f32, to: f32, progress: f32) -> f32 {
    from * (to / from).powf(progress.clamp(0.0, 1.0))
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Modal contents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalAlert {
    pub title: String,
    pub snapshot: ArrivalSnapshot,
}

impl ArrivalAlert {
    pub fn new(snapshot: ArrivalSnapshot) -> Self {
        Self {
            title: ALERT_TITLE.to_string(),
            snapshot,
        }
    }

    /// One-line summary for logs and plain-text sinks
    pub fn summary(&self) -> String {
        let s = &self.snapshot;
        format!(
            "{} ({}) arrived for {} {} {}, resident {}",
            s.patient_name, s.clinic_number, s.day, s.clinic_time, s.appointment_time, s.resident_name
        )
    }
}

/// Where alerts are rendered
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn show_modal(&self, alert: &ArrivalAlert) -> Result<()>;
    async fn play_tone(&self, tone: &ToneSpec) -> Result<()>;
}

/// Trim and lowercase both sides; blank never matches
pub fn faculty_matches(viewer: &str, faculty_name: &str) -> bool {
    let viewer = viewer.trim().to_lowercase();
    !viewer.is_empty() && viewer == faculty_name.trim().to_lowercase()
}

/// What the notifier did with one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Alerted,
    /// Addressed to someone else
    NotForViewer,
    /// Identity unresolved or without a display name
    NoIdentity,
    Duplicate,
    NotAnArrival,
}

pub struct ArrivalNotifier {
    sink: Arc<dyn AlertSink>,
    tone: ToneSpec,
    tone_timeout: Duration,
    recent: VecDeque<(String, chrono::DateTime<chrono::Utc>)>,
    recent_set: HashSet<(String, chrono::DateTime<chrono::Utc>)>,
}

impl ArrivalNotifier {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self {
            sink,
            tone: ToneSpec::ARRIVAL,
            tone_timeout: TONE_TIMEOUT,
            recent: VecDeque::new(),
            recent_set: HashSet::new(),
        }
    }

    pub fn with_tone(mut self, tone: ToneSpec) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_tone_timeout(mut self, timeout: Duration) -> Self {
        self.tone_timeout = timeout;
        self
    }

    /// Handle one event for the given viewer
    pub async fn handle(&mut self, event: &ClinicEvent, viewer: &IdentityState) -> NotifyOutcome {
        let ClinicEvent::Arrival { snapshot } = event else {
            return NotifyOutcome::NotAnArrival;
        };
        let Some(identity) = viewer.display_identity() else {
            debug!("Dropping arrival for {}: viewer identity unresolved", snapshot.entry_id);
            return NotifyOutcome::NoIdentity;
        };
        if !faculty_matches(&identity, &snapshot.faculty_name) {
            return NotifyOutcome::NotForViewer;
        }
        if !self.remember(snapshot.arrival_key()) {
            debug!("Suppressing duplicate arrival for {}", snapshot.entry_id);
            return NotifyOutcome::Duplicate;
        }

        let alert = ArrivalAlert::new(snapshot.clone());
        info!("Arrival alert for {}: {}", identity, alert.summary());

        // Visual first; audio must never hold it up
        if let Err(e) = self.sink.show_modal(&alert).await {
            warn!("Failed to show arrival modal: {}", e);
        }
        match tokio::time::timeout(self.tone_timeout, self.sink.play_tone(&self.tone)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Arrival tone failed: {}", e),
            Err(_) => warn!("Arrival tone timed out after {:?}", self.tone_timeout),
        }
        NotifyOutcome::Alerted
    }

    fn remember(&mut self, key: (String, chrono::DateTime<chrono::Utc>)) -> bool {
        if !self.recent_set.insert(key.clone()) {
            return false;
        }
        self.recent.push_back(key);
        if self.recent.len() > DEDUPE_WINDOW {
            if let Some(oldest) = self.recent.pop_front() {
                self.recent_set.remove(&oldest);
            }
        }
        true
    }

    /// Run against an arrivals subscription until the handle is dropped.
    ///
    /// `viewer` is read per event, so sign-in and sign-out apply to the
    /// next arrival without restarting.
    pub fn spawn(
        mut self,
        mut arrivals: Subscription,
        viewer: watch::Receiver<IdentityState>,
    ) -> TaskHandle {
        TaskHandle::spawn("arrival-notifier", move |token| async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = arrivals.recv() => match event {
                        Some(event) => {
                            let state = viewer.borrow().clone();
                            self.handle(&event, &state).await;
                        }
                        None => break,
                    },
                }
            }
            debug!("Arrival notifier stopped");
        })
    }
}
