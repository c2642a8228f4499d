//! Core playback engine - sole owner of the active decoder
//!
//! **Responsibilities:**
//! - Uniform transport surface (load, play, pause, seek, volume, output target)
//!   regardless of which decoder variant is active
//! - Crash detection and recovery: any backend fault during any control
//!   operation replaces the decoder (same variant first, simulated as last
//!   resort, which cannot fail)
//! - Republishing decoder property notifications as engine events
//!
//! Failure semantics: nothing is escalated to callers as a hard error. Every
//! fault is absorbed by the recovery procedure; only `load`'s boolean return
//! is caller-visible. Degradation is observable through `is_mock`,
//! `recoveries` and the DecoderRecovered event rather than silent.

use crate::config::TomlConfig;
use crate::decoder::{
    probe, ActiveDecoder, BackendAvailability, Decoder, NotificationSender, PropertyChange,
    RealDecoder, SimulatedDecoder,
};
use crate::error::Error;
use showdeck_common::events::{EventBus, ShowdeckEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

/// Engine construction parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Extra directories probed for the native backend library
    pub search_dirs: Vec<PathBuf>,

    /// Skip probing entirely and run on the simulated decoder
    pub force_simulated: bool,

    /// Virtual duration reported by the simulated decoder
    pub simulated_duration: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_dirs: Vec::new(),
            force_simulated: false,
            simulated_duration: 100.0,
        }
    }
}

impl From<&TomlConfig> for EngineConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            search_dirs: config.backend.search_dirs.clone(),
            force_simulated: config.backend.force_simulated,
            simulated_duration: config.simulated.duration_secs,
        }
    }
}

/// Playback engine - owns exactly one active decoder instance
///
/// All control operations serialize on the decoder mutex, which is also what
/// makes `toggle_pause` atomic with respect to concurrent fault recovery. No
/// caller ever holds a decoder reference across a recovery; the decoder is
/// reachable only through engine methods.
pub struct PlaybackEngine {
    /// The active decoder; replaced wholesale on fault, never repaired
    decoder: Mutex<ActiveDecoder>,

    /// Event broadcaster shared with SSE listeners
    bus: Arc<EventBus>,

    /// Construction parameters, reused on every recovery attempt
    config: EngineConfig,

    /// Handed to each fresh decoder instance so the forwarder task survives
    /// decoder swaps
    notifications: NotificationSender,

    /// Cached from the decoder variant at swap time, never recomputed per call
    is_mock: AtomicBool,

    /// Total decoder replacements since startup
    recoveries: AtomicU64,

    /// One-time advisory latch for entering degraded mode
    degraded_notice: AtomicBool,

    // Shadow state reapplied whenever decoder identity changes, since a fresh
    // instance starts at defaults
    last_volume: StdMutex<f64>,
    last_speed: StdMutex<f64>,
    last_output_target: StdMutex<Option<i64>>,
}

impl PlaybackEngine {
    /// Create the engine, attempting the real backend first
    ///
    /// Construction cannot fail: if the backend is unavailable or refuses to
    /// initialize, the engine starts on the simulated decoder.
    pub async fn new(config: EngineConfig, bus: Arc<EventBus>) -> Self {
        info!("Creating playback engine");

        let (tx, rx) = mpsc::unbounded_channel();
        spawn_forwarder(Arc::clone(&bus), rx);

        let decoder = Self::build_decoder(&config, &tx);
        let degraded = decoder.is_simulated();
        if degraded {
            warn!("Running in degraded mode: simulated decoder active");
        }

        Self {
            decoder: Mutex::new(decoder),
            bus,
            config,
            notifications: tx,
            is_mock: AtomicBool::new(degraded),
            recoveries: AtomicU64::new(0),
            degraded_notice: AtomicBool::new(degraded),
            last_volume: StdMutex::new(100.0),
            last_speed: StdMutex::new(1.0),
            last_output_target: StdMutex::new(None),
        }
    }

    /// Start playback of a media file
    ///
    /// Returns true on success. Duration is not part of this call's result:
    /// it arrives asynchronously as a DurationChanged event, and callers must
    /// tolerate a transient default until then. A backend fault is absorbed
    /// by recovery and reported as false; an invalid path is a plain false
    /// with no recovery, since the decoder itself is not at fault.
    pub async fn load(&self, path: &str) -> bool {
        let mut decoder = self.decoder.lock().await;
        match decoder.load(path) {
            Ok(()) => {
                self.emit_status(true);
                info!("Started playback for {}", path);
                true
            }
            Err(Error::BackendFault(reason)) => {
                self.recover(&mut decoder, "load", &reason);
                false
            }
            Err(e) => {
                error!("Error loading {}: {}", path, e);
                false
            }
        }
    }

    /// Resume playback
    ///
    /// The status event is emitted optimistically: it fires even when the
    /// underlying decoder had to be silently replaced mid-call.
    pub async fn play(&self) {
        let mut decoder = self.decoder.lock().await;
        if let Err(e) = decoder.set_paused(false) {
            self.absorb_fault(&mut decoder, "play", e);
            let _ = decoder.set_paused(false);
        }
        self.emit_status(true);
    }

    /// Pause playback (status event emitted optimistically, as in `play`)
    pub async fn pause(&self) {
        let mut decoder = self.decoder.lock().await;
        if let Err(e) = decoder.set_paused(true) {
            self.absorb_fault(&mut decoder, "pause", e);
            let _ = decoder.set_paused(true);
        }
        self.emit_status(false);
    }

    /// Flip the paused flag, emitting a status event with the new state
    ///
    /// The read and the write happen under the same decoder lock, so a
    /// concurrent fault recovery can never interleave between them.
    pub async fn toggle_pause(&self) {
        let mut decoder = self.decoder.lock().await;
        let current = match decoder.paused() {
            Ok(paused) => paused,
            Err(e) => {
                self.absorb_fault(&mut decoder, "toggle_pause", e);
                decoder.paused().unwrap_or(false)
            }
        };
        let target = !current;
        if let Err(e) = decoder.set_paused(target) {
            self.absorb_fault(&mut decoder, "toggle_pause", e);
            let _ = decoder.set_paused(target);
        }
        self.emit_status(!target);
    }

    /// Halt playback; emits status=false regardless of decoder outcome
    pub async fn stop(&self) {
        let mut decoder = self.decoder.lock().await;
        if let Err(e) = decoder.stop() {
            self.absorb_fault(&mut decoder, "stop", e);
        }
        self.emit_status(false);
    }

    /// Seek to an absolute position in seconds
    ///
    /// No return value: errors only affect internal decoder-replacement
    /// state, never the caller.
    pub async fn seek(&self, position: f64) {
        let mut decoder = self.decoder.lock().await;
        if let Err(e) = decoder.seek(position) {
            self.absorb_fault(&mut decoder, "seek", e);
        }
    }

    /// Set master volume on the 0-100 scale
    pub async fn set_volume(&self, volume: f64) {
        let volume = volume.clamp(0.0, 100.0);
        *self.shadow(&self.last_volume) = volume;

        let mut decoder = self.decoder.lock().await;
        if let Err(e) = decoder.set_volume(volume) {
            // Recovery reapplies the shadow copy, including this volume
            self.absorb_fault(&mut decoder, "set_volume", e);
        }
        self.bus.emit_lossy(ShowdeckEvent::VolumeChanged {
            volume,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Set the playback speed multiplier
    pub async fn set_speed(&self, speed: f64) {
        *self.shadow(&self.last_speed) = speed;

        let mut decoder = self.decoder.lock().await;
        if let Err(e) = decoder.set_speed(speed) {
            self.absorb_fault(&mut decoder, "set_speed", e);
        }
    }

    /// Attach the decoder to a platform window, or detach with None
    ///
    /// None is a valid detach request; whatever sentinel the active backend
    /// needs for "no target" is the backend adapter's business, never the
    /// caller's.
    pub async fn set_output_target(&self, target: Option<i64>) {
        *self.shadow(&self.last_output_target) = target;

        let mut decoder = self.decoder.lock().await;
        if let Err(e) = decoder.set_output_target(target) {
            self.absorb_fault(&mut decoder, "set_output_target", e);
        }
    }

    /// Current position in seconds; 0.0 when the decoder cannot answer
    pub async fn get_position(&self) -> f64 {
        self.decoder.lock().await.position().unwrap_or(0.0)
    }

    /// Media duration in seconds; 0.0 when the decoder cannot answer
    ///
    /// Pull-based fallback for callers whose DurationChanged event has not
    /// arrived yet.
    pub async fn get_duration(&self) -> f64 {
        self.decoder.lock().await.duration().unwrap_or(0.0)
    }

    /// Master volume as last commanded through the engine
    pub fn get_volume(&self) -> f64 {
        *self.shadow(&self.last_volume)
    }

    /// Whether playback is currently running; false when the decoder cannot
    /// answer
    pub async fn is_playing(&self) -> bool {
        !self.decoder.lock().await.paused().unwrap_or(true)
    }

    /// Whether the simulated decoder is active (for UI degraded-mode warnings)
    pub fn is_mock(&self) -> bool {
        self.is_mock.load(Ordering::Acquire)
    }

    /// Total decoder replacements since startup
    pub fn recoveries(&self) -> u64 {
        self.recoveries.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Construct a fresh decoder: real backend if probeable, simulated
    /// otherwise. The simulated path cannot fail.
    fn build_decoder(config: &EngineConfig, notifications: &NotificationSender) -> ActiveDecoder {
        if config.force_simulated {
            info!("Backend probing disabled by configuration");
            return ActiveDecoder::Simulated(SimulatedDecoder::new(
                config.simulated_duration,
                notifications.clone(),
            ));
        }

        match probe(&config.search_dirs) {
            BackendAvailability::Available { path } => {
                match RealDecoder::new(&path, notifications.clone()) {
                    Ok(decoder) => {
                        info!("Real decoder initialized from {}", path.display());
                        ActiveDecoder::Real(decoder)
                    }
                    Err(e) => {
                        error!("Failed to initialize decoder backend: {}", e);
                        ActiveDecoder::Simulated(SimulatedDecoder::new(
                            config.simulated_duration,
                            notifications.clone(),
                        ))
                    }
                }
            }
            BackendAvailability::Unavailable { reason } => {
                warn!("Decoder backend unavailable: {}", reason);
                ActiveDecoder::Simulated(SimulatedDecoder::new(
                    config.simulated_duration,
                    notifications.clone(),
                ))
            }
        }
    }

    /// Route an operation error: backend faults trigger recovery, anything
    /// else is logged and dropped
    fn absorb_fault(&self, decoder: &mut ActiveDecoder, during: &str, error: Error) {
        match error {
            Error::BackendFault(reason) => self.recover(decoder, during, &reason),
            other => error!("{} failed without backend fault: {}", during, other),
        }
    }

    /// Replace the faulted decoder with a fresh instance
    ///
    /// Best-effort release of the old instance first; release failures are
    /// logged but never mask the re-initialization. The replacement chain
    /// ends at the simulated decoder, which cannot fail to construct, so the
    /// engine always emerges from here with a valid decoder.
    fn recover(&self, decoder: &mut ActiveDecoder, during: &str, reason: &str) {
        error!(
            "Backend fault during {}: {}. Replacing decoder instance.",
            during, reason
        );

        if let Err(e) = decoder.terminate() {
            warn!("Best-effort release of faulted decoder failed: {}", e);
        }

        *decoder = Self::build_decoder(&self.config, &self.notifications);
        self.reapply_shadow_state(decoder);

        let degraded = decoder.is_simulated();
        self.is_mock.store(degraded, Ordering::Release);
        let recoveries = self.recoveries.fetch_add(1, Ordering::AcqRel) + 1;

        if degraded && !self.degraded_notice.swap(true, Ordering::AcqRel) {
            warn!("Running in degraded mode: simulated decoder active");
        }

        self.bus.emit_lossy(ShowdeckEvent::DecoderRecovered {
            degraded,
            recoveries,
            timestamp: chrono::Utc::now(),
        });
        info!(
            "Decoder recovery complete (degraded={}, total recoveries={})",
            degraded, recoveries
        );
    }

    /// Push the engine's shadow state onto a fresh decoder instance
    fn reapply_shadow_state(&self, decoder: &mut ActiveDecoder) {
        let volume = *self.shadow(&self.last_volume);
        let speed = *self.shadow(&self.last_speed);
        let target = *self.shadow(&self.last_output_target);

        if let Err(e) = decoder.set_volume(volume) {
            warn!("Failed to reapply volume after recovery: {}", e);
        }
        if let Err(e) = decoder.set_speed(speed) {
            warn!("Failed to reapply speed after recovery: {}", e);
        }
        if let Err(e) = decoder.set_output_target(target) {
            warn!("Failed to reapply output target after recovery: {}", e);
        }
    }

    fn emit_status(&self, playing: bool) {
        self.bus.emit_lossy(ShowdeckEvent::PlaybackStatusChanged {
            playing,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Lock a shadow-state cell; these mutexes guard plain copies and are
    /// never held across an await
    fn shadow<'a, T>(&self, cell: &'a StdMutex<T>) -> std::sync::MutexGuard<'a, T> {
        cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inject a backend fault, driving the recovery path as if the active
    /// decoder had raised during a control operation
    #[cfg(test)]
    pub(crate) async fn force_fault(&self) {
        let mut decoder = self.decoder.lock().await;
        self.recover(&mut decoder, "injected", "test-forced backend fault");
    }

    /// Make the active simulated decoder refuse position/duration reads
    #[cfg(test)]
    pub(crate) async fn refuse_reads(&self, fail: bool) {
        let decoder = self.decoder.lock().await;
        if let ActiveDecoder::Simulated(d) = &*decoder {
            d.set_fail_reads(fail);
        }
    }

    /// Peek at the active simulated decoder's applied state
    #[cfg(test)]
    pub(crate) async fn simulated_snapshot(&self) -> Option<(f64, f64, Option<i64>)> {
        let decoder = self.decoder.lock().await;
        match &*decoder {
            ActiveDecoder::Simulated(d) => Some(d.applied_state()),
            ActiveDecoder::Real(_) => None,
        }
    }
}

/// Republish decoder property notifications as engine events
///
/// Runs for the life of the process; decoder swaps hand the same sender to
/// each fresh instance, so this task never needs restarting.
fn spawn_forwarder(bus: Arc<EventBus>, mut rx: mpsc::UnboundedReceiver<PropertyChange>) {
    tokio::spawn(async move {
        while let Some(change) = rx.recv().await {
            let event = match change {
                PropertyChange::Position(seconds) => ShowdeckEvent::PositionChanged {
                    seconds,
                    timestamp: chrono::Utc::now(),
                },
                PropertyChange::Duration(seconds) => ShowdeckEvent::DurationChanged {
                    seconds,
                    timestamp: chrono::Utc::now(),
                },
            };
            bus.emit_lossy(event);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::broadcast::Receiver;

    fn simulated_config() -> EngineConfig {
        EngineConfig {
            search_dirs: Vec::new(),
            force_simulated: true,
            simulated_duration: 100.0,
        }
    }

    async fn engine_with_bus() -> (PlaybackEngine, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new(100));
        let engine = PlaybackEngine::new(simulated_config(), Arc::clone(&bus)).await;
        (engine, bus)
    }

    /// Drain events until one matches, with a hard timeout
    async fn expect_event<F>(rx: &mut Receiver<ShowdeckEvent>, mut matches: F) -> ShowdeckEvent
    where
        F: FnMut(&ShowdeckEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = rx.recv().await.expect("event bus closed");
                if matches(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn test_forced_simulated_mode_is_mock() {
        let (engine, _bus) = engine_with_bus().await;
        assert!(engine.is_mock());
        assert_eq!(engine.recoveries(), 0);
    }

    #[tokio::test]
    async fn test_load_returns_true_and_announces_duration() {
        let (engine, bus) = engine_with_bus().await;
        let mut rx = bus.subscribe();

        assert!(engine.load("clip.mp4").await);
        assert!(engine.is_mock());

        expect_event(&mut rx, |e| {
            matches!(e, ShowdeckEvent::PlaybackStatusChanged { playing: true, .. })
        })
        .await;
        let event = expect_event(&mut rx, |e| {
            matches!(e, ShowdeckEvent::DurationChanged { .. })
        })
        .await;
        match event {
            ShowdeckEvent::DurationChanged { seconds, .. } => assert_eq!(seconds, 100.0),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_position_tick_arrives_after_load() {
        let (engine, bus) = engine_with_bus().await;
        let mut rx = bus.subscribe();

        assert!(engine.load("clip.mp4").await);
        let event = expect_event(&mut rx, |e| {
            matches!(e, ShowdeckEvent::PositionChanged { .. })
        })
        .await;
        match event {
            ShowdeckEvent::PositionChanged { seconds, .. } => {
                assert!(seconds > 0.0 && seconds <= 1.0, "unexpected first tick {}", seconds)
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_toggle_twice_returns_to_paused() {
        let (engine, bus) = engine_with_bus().await;
        engine.pause().await;
        assert!(!engine.is_playing().await);

        let mut rx = bus.subscribe();
        engine.toggle_pause().await;
        engine.toggle_pause().await;

        let first = expect_event(&mut rx, |e| {
            matches!(e, ShowdeckEvent::PlaybackStatusChanged { .. })
        })
        .await;
        let second = expect_event(&mut rx, |e| {
            matches!(e, ShowdeckEvent::PlaybackStatusChanged { .. })
        })
        .await;

        match (first, second) {
            (
                ShowdeckEvent::PlaybackStatusChanged { playing: p1, .. },
                ShowdeckEvent::PlaybackStatusChanged { playing: p2, .. },
            ) => {
                assert!(p1, "first toggle should report playing");
                assert!(!p2, "second toggle should report paused");
            }
            _ => unreachable!(),
        }
        assert!(!engine.is_playing().await);
    }

    #[tokio::test]
    async fn test_stop_emits_paused_status() {
        let (engine, bus) = engine_with_bus().await;
        engine.load("clip.mp4").await;

        let mut rx = bus.subscribe();
        engine.stop().await;
        expect_event(&mut rx, |e| {
            matches!(e, ShowdeckEvent::PlaybackStatusChanged { playing: false, .. })
        })
        .await;
        assert_eq!(engine.get_position().await, 0.0);
        assert!(!engine.is_playing().await);
    }

    #[tokio::test]
    async fn test_seek_does_not_clamp_past_duration() {
        let (engine, _bus) = engine_with_bus().await;
        engine.load("clip.mp4").await;
        // Park the virtual clock so the assertion cannot race a tick
        engine.pause().await;

        engine.seek(150.0).await;
        assert_eq!(engine.get_position().await, 150.0);
        assert_eq!(engine.get_duration().await, 100.0);
    }

    #[tokio::test]
    async fn test_recovery_always_yields_a_working_decoder() {
        let (engine, bus) = engine_with_bus().await;
        let mut rx = bus.subscribe();

        for expected in 1..=5u64 {
            engine.force_fault().await;
            let event = expect_event(&mut rx, |e| {
                matches!(e, ShowdeckEvent::DecoderRecovered { .. })
            })
            .await;
            match event {
                ShowdeckEvent::DecoderRecovered {
                    degraded,
                    recoveries,
                    ..
                } => {
                    assert!(degraded);
                    assert_eq!(recoveries, expected);
                }
                _ => unreachable!(),
            }
        }

        assert_eq!(engine.recoveries(), 5);
        assert!(engine.is_mock());

        // The replacement is fully operational
        assert!(engine.load("clip.mp4").await);
        assert_eq!(engine.get_duration().await, 100.0);
    }

    #[tokio::test]
    async fn test_shadow_state_survives_recovery() {
        let (engine, _bus) = engine_with_bus().await;
        engine.set_volume(55.0).await;
        engine.set_speed(2.0).await;
        engine.set_output_target(Some(42)).await;

        engine.force_fault().await;

        let (volume, speed, target) = engine
            .simulated_snapshot()
            .await
            .expect("forced-simulated engine");
        assert_eq!(volume, 55.0);
        assert_eq!(speed, 2.0);
        assert_eq!(target, Some(42));
        assert_eq!(engine.get_volume(), 55.0);
    }

    #[tokio::test]
    async fn test_detach_request_is_accepted() {
        let (engine, _bus) = engine_with_bus().await;
        engine.set_output_target(Some(7)).await;
        engine.set_output_target(None).await;

        let (_, _, target) = engine.simulated_snapshot().await.unwrap();
        assert_eq!(target, None);
    }

    #[tokio::test]
    async fn test_volume_is_clamped_to_scale() {
        let (engine, bus) = engine_with_bus().await;
        let mut rx = bus.subscribe();

        engine.set_volume(250.0).await;
        let event = expect_event(&mut rx, |e| {
            matches!(e, ShowdeckEvent::VolumeChanged { .. })
        })
        .await;
        match event {
            ShowdeckEvent::VolumeChanged { volume, .. } => assert_eq!(volume, 100.0),
            _ => unreachable!(),
        }
        assert_eq!(engine.get_volume(), 100.0);
    }

    #[tokio::test]
    async fn test_getters_default_to_zero_when_reads_fault() {
        let (engine, _bus) = engine_with_bus().await;
        engine.load("clip.mp4").await;
        engine.refuse_reads(true).await;

        // Faulting reads degrade to zero, never to an error or a recovery
        assert_eq!(engine.get_position().await, 0.0);
        assert_eq!(engine.get_duration().await, 0.0);
        assert_eq!(engine.recoveries(), 0);

        engine.refuse_reads(false).await;
        assert_eq!(engine.get_duration().await, 100.0);
    }

    #[tokio::test]
    async fn test_getters_default_before_any_load() {
        let (engine, _bus) = engine_with_bus().await;
        // Duration is the configured virtual value, position starts at zero
        // (allow for a tick or two of virtual clock on a slow runner)
        assert!(engine.get_position().await < 1.0);
        assert_eq!(engine.get_duration().await, 100.0);
        assert_eq!(engine.get_volume(), 100.0);
    }
}
