//! Ringing playback.
//!
//! At most one alarm rings at a time. Starting playback acquires a
//! background-execution token and, when requested, a vibration pulse task;
//! stopping releases both. Every start is paired with exactly one release,
//! whether the alarm is stopped explicitly or displaced by another alarm.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmId;
use crate::tracing::prelude::*;

/// Played when the alarm's own sound can't be.
pub const FALLBACK_SOUND: &str = "system-alarm";

#[derive(Debug, thiserror::Error)]
pub enum SoundError {
    #[error("Sound not found: {0}")]
    NotFound(String),

    #[error("Audio device error: {0}")]
    Device(String),
}

pub trait AudioOutput: Send + Sync {
    fn play(&self, sound: &str, looping: bool) -> Result<(), SoundError>;

    fn stop(&self);

    /// One vibration pulse.
    fn vibrate(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

/// Keeps the process running while an alarm rings in the background.
pub trait BackgroundExecution: Send + Sync {
    fn begin(&self, name: &str) -> BackgroundTaskId;

    fn end(&self, id: BackgroundTaskId);
}

/// Audio output that only logs.
#[derive(Debug, Default)]
pub struct LogAudioOutput;

impl AudioOutput for LogAudioOutput {
    fn play(&self, sound: &str, looping: bool) -> Result<(), SoundError> {
        info!(sound, looping, "Playing alarm sound");
        Ok(())
    }

    fn stop(&self) {
        info!("Alarm sound stopped");
    }

    fn vibrate(&self) {
        trace!("Vibration pulse");
    }
}

/// Background tokens handed out from a counter, logged on begin and end.
#[derive(Debug, Default)]
pub struct LogBackgroundExecution {
    next: AtomicU64,
}

impl BackgroundExecution for LogBackgroundExecution {
    fn begin(&self, name: &str) -> BackgroundTaskId {
        let id = BackgroundTaskId(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        debug!(task = id.0, name, "Background task started");
        id
    }

    fn end(&self, id: BackgroundTaskId) {
        debug!(task = id.0, "Background task ended");
    }
}

struct Playback {
    alarm_id: AlarmId,
    background: BackgroundTaskId,
    vibration: Option<CancellationToken>,
}

pub struct SoundController {
    output: Arc<dyn AudioOutput>,
    background: Arc<dyn BackgroundExecution>,
    vibration_period: Duration,
    active: Mutex<Option<Playback>>,
}

impl SoundController {
    pub fn new(
        output: Arc<dyn AudioOutput>,
        background: Arc<dyn BackgroundExecution>,
        vibration_period: Duration,
    ) -> Self {
        Self {
            output,
            background,
            vibration_period,
            active: Mutex::new(None),
        }
    }

    /// Start ringing for `alarm_id`. A different alarm already ringing is
    /// stopped first; the same alarm keeps its current playback.
    ///
    /// Must be called from within a tokio runtime when `vibrate` is set.
    pub fn start(&self, alarm_id: AlarmId, sound: &str, vibrate: bool) {
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            if current.alarm_id == alarm_id {
                debug!(alarm_id = %alarm_id, "Alarm already ringing");
                return;
            }
        }
        if let Some(previous) = active.take() {
            self.release(previous);
        }

        let background = self.background.begin("alarm-ringing");
        if let Err(e) = self.output.play(sound, true) {
            warn!(alarm_id = %alarm_id, sound, error = %e, "Falling back to system sound");
            if let Err(e) = self.output.play(FALLBACK_SOUND, true) {
                error!(alarm_id = %alarm_id, error = %e, "Fallback sound failed");
            }
        }

        let vibration = vibrate.then(|| self.spawn_vibration());
        info!(alarm_id = %alarm_id, sound, vibrate, "Alarm ringing");
        *active = Some(Playback {
            alarm_id,
            background,
            vibration,
        });
    }

    /// Stop playback if it belongs to `alarm_id`.
    pub fn stop_for(&self, alarm_id: AlarmId) -> bool {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|p| p.alarm_id == alarm_id) {
            if let Some(playback) = active.take() {
                self.release(playback);
                return true;
            }
        }
        false
    }

    /// Stop whatever is playing.
    pub fn stop_all(&self) -> bool {
        match self.active.lock().take() {
            Some(playback) => {
                self.release(playback);
                true
            }
            None => false,
        }
    }

    pub fn ringing_alarm(&self) -> Option<AlarmId> {
        self.active.lock().as_ref().map(|p| p.alarm_id)
    }

    fn release(&self, playback: Playback) {
        if let Some(vibration) = playback.vibration {
            vibration.cancel();
        }
        self.output.stop();
        self.background.end(playback.background);
        debug!(alarm_id = %playback.alarm_id, "Alarm playback released");
    }

    fn spawn_vibration(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let output = Arc::clone(&self.output);
        let period = self.vibration_period;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => output.vibrate(),
                }
            }
        });

        token
    }
}

impl Drop for SoundController {
    fn drop(&mut self) {
        if let Some(playback) = self.active.get_mut().take() {
            self.release(playback);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_pair_background_tokens() {
        let recorder = Arc::new(RecordingAudio::default());
        let sound = controller(&recorder);
        let id = AlarmId::new();

        sound.start(id, "Default", false);
        assert_eq!(sound.ringing_alarm(), Some(id));
        assert_eq!(recorder.open_background_tasks(), 1);

        assert!(sound.stop_for(id));
        assert_eq!(sound.ringing_alarm(), None);
        assert_eq!(recorder.open_background_tasks(), 0);
        assert_eq!(recorder.stops(), 1);

        // Nothing left to stop.
        assert!(!sound.stop_for(id));
        assert!(!sound.stop_all());
        assert_eq!(recorder.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_for_other_alarm_leaves_playback() {
        let recorder = Arc::new(RecordingAudio::default());
        let sound = controller(&recorder);
        let ringing = AlarmId::new();

        sound.start(ringing, "Default", false);
        assert!(!sound.stop_for(AlarmId::new()));
        assert_eq!(sound.ringing_alarm(), Some(ringing));
    }

    #[tokio::test(start_paused = true)]
    async fn new_alarm_displaces_ringing_one() {
        let recorder = Arc::new(RecordingAudio::default());
        let sound = controller(&recorder);
        let first = AlarmId::new();
        let second = AlarmId::new();

        sound.start(first, "Chime", false);
        sound.start(second, "Radar", false);

        assert_eq!(sound.ringing_alarm(), Some(second));
        assert_eq!(recorder.open_background_tasks(), 1);
        assert_eq!(*recorder.played.lock(), vec!["Chime", "Radar"]);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_same_alarm_is_noop() {
        let recorder = Arc::new(RecordingAudio::default());
        let sound = controller(&recorder);
        let id = AlarmId::new();

        sound.start(id, "Default", false);
        sound.start(id, "Default", false);
        assert_eq!(recorder.played.lock().len(), 1);
        assert_eq!(recorder.open_background_tasks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_sound_falls_back() {
        let recorder = Arc::new(RecordingAudio::default());
        recorder.missing.lock().push("Bespoke".into());
        let sound = controller(&recorder);

        sound.start(AlarmId::new(), "Bespoke", false);
        assert_eq!(*recorder.played.lock(), vec![FALLBACK_SOUND]);
    }

    #[tokio::test(start_paused = true)]
    async fn vibration_pulses_until_stopped() {
        let recorder = Arc::new(RecordingAudio::default());
        let sound = controller(&recorder);
        let id = AlarmId::new();

        sound.start(id, "Default", true);
        // First tick is immediate, then one per second.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(recorder.pulses(), 4);

        sound.stop_all();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(recorder.pulses(), 4);
    }
}
