//! Simulated decoder - the guaranteed-available fallback
//!
//! Stands in for the real backend when it is unavailable or crashed, so the
//! rest of the system is oblivious. Advances a virtual playback clock on a
//! fixed 100ms tick and fires the same notification contract as the real
//! decoder. Defined to never fault, which is what makes it a safe recovery
//! target.

use crate::decoder::{Decoder, NotificationSender, PropertyChange};
use crate::error::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Virtual clock tick interval
const TICK: Duration = Duration::from_millis(100);

/// Seconds advanced per tick at speed 1.0
const TICK_SECONDS: f64 = 0.1;

#[derive(Debug)]
struct SimState {
    paused: bool,
    position: f64,
    duration: f64,
    speed: f64,
    volume: f64,
    output_target: Option<i64>,
    /// Makes position/duration reads raise, standing in for a backend whose
    /// core died between calls
    #[cfg(test)]
    fail_reads: bool,
}

/// Decoder variant backed by a virtual playback clock
pub struct SimulatedDecoder {
    state: Arc<Mutex<SimState>>,
    notifications: NotificationSender,
    tick_task: Option<JoinHandle<()>>,
}

impl SimulatedDecoder {
    /// Create a simulated decoder reporting `duration` for every item
    ///
    /// Spawns the tick task immediately; the virtual clock only advances
    /// while unpaused. Must be called from within a tokio runtime.
    pub fn new(duration: f64, notifications: NotificationSender) -> Self {
        // Starts unpaused: the virtual timeline is live from construction,
        // matching the always-live contract of this decoder
        let state = Arc::new(Mutex::new(SimState {
            paused: false,
            position: 0.0,
            duration,
            speed: 1.0,
            volume: 100.0,
            output_target: None,
            #[cfg(test)]
            fail_reads: false,
        }));

        let tick_task = spawn_tick_task(Arc::clone(&state), notifications.clone());

        Self {
            state,
            notifications,
            tick_task: Some(tick_task),
        }
    }

    /// Stop the tick task
    pub fn terminate(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // Tick task never panics while holding the lock
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// (volume, speed, output_target) as currently applied
    #[cfg(test)]
    pub(crate) fn applied_state(&self) -> (f64, f64, Option<i64>) {
        let state = self.lock();
        (state.volume, state.speed, state.output_target)
    }

    /// Make position/duration reads raise a backend fault
    #[cfg(test)]
    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }
}

impl Decoder for SimulatedDecoder {
    fn load(&mut self, path: &str) -> Result<()> {
        let duration = {
            let mut state = self.lock();
            state.position = 0.0;
            state.paused = false;
            state.duration
        };
        info!("[simulated] playing {}", path);

        // Duration is announced immediately; a real backend would deliver it
        // asynchronously once the demuxer knows it
        let _ = self.notifications.send(PropertyChange::Duration(duration));
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<()> {
        self.lock().paused = paused;
        Ok(())
    }

    fn paused(&self) -> Result<bool> {
        Ok(self.lock().paused)
    }

    fn stop(&mut self) -> Result<()> {
        // Silent transition: no notification fires for stop, unlike load
        let mut state = self.lock();
        state.paused = true;
        state.position = 0.0;
        Ok(())
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        // Unconditional assignment, no clamping against duration
        self.lock().position = position;
        Ok(())
    }

    fn set_speed(&mut self, speed: f64) -> Result<()> {
        self.lock().speed = speed;
        Ok(())
    }

    fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.lock().volume = volume;
        Ok(())
    }

    fn set_output_target(&mut self, target: Option<i64>) -> Result<()> {
        self.lock().output_target = target;
        Ok(())
    }

    fn position(&self) -> Result<f64> {
        let state = self.lock();
        #[cfg(test)]
        if state.fail_reads {
            return Err(crate::error::Error::BackendFault(
                "position read refused".to_string(),
            ));
        }
        Ok(state.position)
    }

    fn duration(&self) -> Result<f64> {
        let state = self.lock();
        #[cfg(test)]
        if state.fail_reads {
            return Err(crate::error::Error::BackendFault(
                "duration read refused".to_string(),
            ));
        }
        Ok(state.duration)
    }
}

impl Drop for SimulatedDecoder {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Advance the virtual clock and publish position notifications
///
/// The wrap back to zero happens before the notification is sent, so no
/// listener ever observes a position past the duration. Looping instead of
/// stopping keeps the simulated timeline live without playlist logic here.
fn spawn_tick_task(
    state: Arc<Mutex<SimState>>,
    notifications: NotificationSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let position = {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                if state.paused {
                    None
                } else {
                    state.position += TICK_SECONDS * state.speed;
                    if state.position > state.duration {
                        state.position = 0.0;
                    }
                    Some(state.position)
                }
            };
            if let Some(position) = position {
                if notifications.send(PropertyChange::Position(position)).is_err() {
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn decoder_with_duration(
        duration: f64,
    ) -> (SimulatedDecoder, mpsc::UnboundedReceiver<PropertyChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SimulatedDecoder::new(duration, tx), rx)
    }

    #[tokio::test]
    async fn test_load_emits_duration_immediately() {
        let (mut decoder, mut rx) = decoder_with_duration(100.0);
        decoder.load("clip.mp4").unwrap();

        // Already queued; no waiting on the tick
        let change = rx.try_recv().unwrap();
        assert_eq!(change, PropertyChange::Duration(100.0));
        assert!(!decoder.paused().unwrap());
        assert_eq!(decoder.position().unwrap(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_advances_position_and_notifies() {
        let (mut decoder, mut rx) = decoder_with_duration(100.0);
        decoder.load("clip.mp4").unwrap();
        assert_eq!(rx.recv().await.unwrap(), PropertyChange::Duration(100.0));

        tokio::time::advance(TICK).await;
        match rx.recv().await.unwrap() {
            PropertyChange::Position(p) => assert!((p - 0.1).abs() < 1e-9),
            other => panic!("expected position tick, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_clock_does_not_advance() {
        let (mut decoder, mut rx) = decoder_with_duration(100.0);
        decoder.load("clip.mp4").unwrap();
        let _ = rx.recv().await.unwrap();
        decoder.set_paused(true).unwrap();

        for _ in 0..10 {
            tokio::time::advance(TICK).await;
        }
        tokio::task::yield_now().await;

        assert!(rx.try_recv().is_err());
        assert_eq!(decoder.position().unwrap(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_never_observed_past_duration() {
        // Small duration so the clock wraps quickly
        let (mut decoder, mut rx) = decoder_with_duration(0.5);
        decoder.load("clip.mp4").unwrap();
        let _ = rx.recv().await.unwrap();

        for _ in 0..20 {
            tokio::time::advance(TICK).await;
            match rx.recv().await.unwrap() {
                PropertyChange::Position(p) => {
                    assert!(p <= 0.5, "published position {} exceeds duration", p)
                }
                other => panic!("expected position tick, got {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_scales_tick_increment() {
        let (mut decoder, mut rx) = decoder_with_duration(100.0);
        decoder.load("clip.mp4").unwrap();
        let _ = rx.recv().await.unwrap();
        decoder.set_speed(2.0).unwrap();

        tokio::time::advance(TICK).await;
        match rx.recv().await.unwrap() {
            PropertyChange::Position(p) => assert!((p - 0.2).abs() < 1e-9),
            other => panic!("expected position tick, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_seek_does_not_clamp() {
        let (mut decoder, _rx) = decoder_with_duration(100.0);
        decoder.seek(150.0).unwrap();
        assert_eq!(decoder.position().unwrap(), 150.0);
    }

    #[tokio::test]
    async fn test_stop_resets_silently() {
        let (mut decoder, mut rx) = decoder_with_duration(100.0);
        decoder.load("clip.mp4").unwrap();
        let _ = rx.try_recv().unwrap();

        decoder.stop().unwrap();
        assert!(decoder.paused().unwrap());
        assert_eq!(decoder.position().unwrap(), 0.0);
        // Asymmetric with load: stop publishes nothing
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_volume_and_target_are_plain_state() {
        let (mut decoder, _rx) = decoder_with_duration(100.0);
        decoder.set_volume(40.0).unwrap();
        decoder.set_output_target(Some(77)).unwrap();
        decoder.set_output_target(None).unwrap();
        assert_eq!(decoder.lock().volume, 40.0);
        assert_eq!(decoder.lock().output_target, None);
    }
}
