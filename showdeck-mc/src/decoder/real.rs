//! Real decoder driving the native media backend
//!
//! The backend library (libmpv) is resolved at runtime via `libloading`,
//! never linked: the controller must start and run on hosts that do not have
//! it installed. A dedicated event thread drains the backend's event queue
//! and forwards `time-pos`/`duration` property changes onto the decoder
//! notification channel.
//!
//! Fault model: a negative status code or a core-shutdown event marks this
//! instance dead. Dead instances fail every subsequent call with
//! `Error::BackendFault`; the engine responds by replacing the instance, so
//! no repair logic lives here.

use crate::decoder::{Decoder, NotificationSender, PropertyChange};
use crate::error::{Error, Result};
use libloading::Library;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_int, c_void};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

const MPV_FORMAT_FLAG: c_int = 3;
const MPV_FORMAT_INT64: c_int = 4;
const MPV_FORMAT_DOUBLE: c_int = 5;

const MPV_EVENT_NONE: c_int = 0;
const MPV_EVENT_SHUTDOWN: c_int = 1;
const MPV_EVENT_PROPERTY_CHANGE: c_int = 22;

/// The backend's detach sentinel: its window-id property is numeric and has
/// no absence value, so "no window" is spelled 0.
const DETACHED_TARGET: i64 = 0;

#[repr(C)]
struct MpvEvent {
    event_id: c_int,
    error: c_int,
    reply_userdata: u64,
    data: *mut c_void,
}

#[repr(C)]
struct MpvEventProperty {
    name: *const c_char,
    format: c_int,
    data: *mut c_void,
}

/// Resolved backend entry points
///
/// Function pointers are copied out of the library once at load time; the
/// `Library` itself is kept alive alongside them.
struct BackendApi {
    create: unsafe extern "C" fn() -> *mut c_void,
    initialize: unsafe extern "C" fn(*mut c_void) -> c_int,
    terminate_destroy: unsafe extern "C" fn(*mut c_void),
    wakeup: unsafe extern "C" fn(*mut c_void),
    command: unsafe extern "C" fn(*mut c_void, *mut *const c_char) -> c_int,
    set_option_string:
        unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> c_int,
    set_property:
        unsafe extern "C" fn(*mut c_void, *const c_char, c_int, *mut c_void) -> c_int,
    get_property:
        unsafe extern "C" fn(*mut c_void, *const c_char, c_int, *mut c_void) -> c_int,
    observe_property: unsafe extern "C" fn(*mut c_void, u64, *const c_char, c_int) -> c_int,
    wait_event: unsafe extern "C" fn(*mut c_void, c_double) -> *mut MpvEvent,
    error_string: unsafe extern "C" fn(c_int) -> *const c_char,
    _lib: Library,
}

impl BackendApi {
    fn resolve(lib: Library) -> Result<Self> {
        macro_rules! sym {
            ($name:literal, $ty:ty) => {
                unsafe {
                    *lib.get::<$ty>($name).map_err(|e| {
                        Error::BackendUnavailable(format!(
                            "missing symbol {}: {}",
                            String::from_utf8_lossy(&$name[..$name.len() - 1]),
                            e
                        ))
                    })?
                }
            };
        }

        Ok(Self {
            create: sym!(b"mpv_create\0", unsafe extern "C" fn() -> *mut c_void),
            initialize: sym!(b"mpv_initialize\0", unsafe extern "C" fn(*mut c_void) -> c_int),
            terminate_destroy: sym!(
                b"mpv_terminate_destroy\0",
                unsafe extern "C" fn(*mut c_void)
            ),
            wakeup: sym!(b"mpv_wakeup\0", unsafe extern "C" fn(*mut c_void)),
            command: sym!(
                b"mpv_command\0",
                unsafe extern "C" fn(*mut c_void, *mut *const c_char) -> c_int
            ),
            set_option_string: sym!(
                b"mpv_set_option_string\0",
                unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> c_int
            ),
            set_property: sym!(
                b"mpv_set_property\0",
                unsafe extern "C" fn(*mut c_void, *const c_char, c_int, *mut c_void) -> c_int
            ),
            get_property: sym!(
                b"mpv_get_property\0",
                unsafe extern "C" fn(*mut c_void, *const c_char, c_int, *mut c_void) -> c_int
            ),
            observe_property: sym!(
                b"mpv_observe_property\0",
                unsafe extern "C" fn(*mut c_void, u64, *const c_char, c_int) -> c_int
            ),
            wait_event: sym!(
                b"mpv_wait_event\0",
                unsafe extern "C" fn(*mut c_void, c_double) -> *mut MpvEvent
            ),
            error_string: sym!(
                b"mpv_error_string\0",
                unsafe extern "C" fn(c_int) -> *const c_char
            ),
            _lib: lib,
        })
    }

    /// Human-readable form of a backend status code
    fn describe(&self, rc: c_int) -> String {
        let ptr = unsafe { (self.error_string)(rc) };
        if ptr.is_null() {
            format!("error {}", rc)
        } else {
            unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
        }
    }
}

/// Raw backend client handle
///
/// The backend documents its client handles as safe to use from any thread;
/// the bare pointer is all that blocks auto-Send.
struct ClientHandle(*mut c_void);

unsafe impl Send for ClientHandle {}

/// Decoder variant backed by the native library
pub struct RealDecoder {
    api: Arc<BackendApi>,
    handle: ClientHandle,
    /// Set by the event thread on core shutdown, or by any call that sees a
    /// fatal status code
    dead: Arc<AtomicBool>,
    /// Tells the event thread to exit during teardown
    stop_events: Arc<AtomicBool>,
    event_thread: Option<JoinHandle<()>>,
    destroyed: bool,
}

impl RealDecoder {
    /// Construct a new backend client from the probed library path
    ///
    /// Initializes the core with the presentation profile (GPU output,
    /// auto hardware decode, keep-open at end of media), subscribes to the
    /// two observed properties, and starts the event-drain thread.
    pub fn new(library_path: &Path, notifications: NotificationSender) -> Result<Self> {
        let lib = unsafe { Library::new(library_path) }.map_err(|e| {
            Error::BackendUnavailable(format!("{}: {}", library_path.display(), e))
        })?;
        let api = Arc::new(BackendApi::resolve(lib)?);

        let handle = unsafe { (api.create)() };
        if handle.is_null() {
            return Err(Error::BackendUnavailable(
                "backend core creation returned null".to_string(),
            ));
        }

        // Options must be set before initialize; individual failures are
        // tolerable (an option unknown to this backend build is not fatal)
        for (name, value) in [
            ("vo", "gpu"),
            ("hwdec", "auto"),
            ("keep-open", "yes"),
            ("osc", "yes"),
            ("input-default-bindings", "yes"),
        ] {
            set_option(&api, handle, name, value);
        }

        let rc = unsafe { (api.initialize)(handle) };
        if rc < 0 {
            let reason = api.describe(rc);
            unsafe { (api.terminate_destroy)(handle) };
            return Err(Error::BackendUnavailable(format!(
                "backend initialize failed: {}",
                reason
            )));
        }

        for prop in ["time-pos", "duration"] {
            let name = CString::new(prop).expect("static property name");
            let rc = unsafe {
                (api.observe_property)(handle, 0, name.as_ptr(), MPV_FORMAT_DOUBLE)
            };
            if rc < 0 {
                warn!("Failed to observe {}: {}", prop, api.describe(rc));
            }
        }

        let dead = Arc::new(AtomicBool::new(false));
        let stop_events = Arc::new(AtomicBool::new(false));
        let event_thread = spawn_event_thread(
            Arc::clone(&api),
            ClientHandle(handle),
            Arc::clone(&dead),
            Arc::clone(&stop_events),
            notifications,
        )?;

        debug!("Real decoder initialized from {}", library_path.display());
        Ok(Self {
            api,
            handle: ClientHandle(handle),
            dead,
            stop_events,
            event_thread: Some(event_thread),
            destroyed: false,
        })
    }

    /// Tear down the backend core
    ///
    /// Joins the event thread first so nothing races `terminate_destroy`.
    pub fn terminate(&mut self) -> Result<()> {
        self.stop_events.store(true, Ordering::Release);
        if !self.destroyed {
            unsafe { (self.api.wakeup)(self.handle.0) };
        }
        if let Some(thread) = self.event_thread.take() {
            thread
                .join()
                .map_err(|_| Error::Internal("decoder event thread panicked".to_string()))?;
        }
        if !self.destroyed {
            unsafe { (self.api.terminate_destroy)(self.handle.0) };
            self.destroyed = true;
        }
        Ok(())
    }

    /// Fail fast once the core has shut down
    fn guard(&self) -> Result<()> {
        if self.dead.load(Ordering::Acquire) {
            return Err(Error::BackendFault("decoder core has shut down".to_string()));
        }
        Ok(())
    }

    /// Map a backend status code onto the fault taxonomy
    fn check(&self, rc: c_int, what: &str) -> Result<()> {
        if rc >= 0 {
            return Ok(());
        }
        Err(Error::BackendFault(format!(
            "{} failed: {}",
            what,
            self.api.describe(rc)
        )))
    }

    fn run_command(&self, what: &str, args: &[&str]) -> Result<c_int> {
        self.guard()?;
        let owned: Vec<CString> = args
            .iter()
            .map(|a| CString::new(*a).map_err(|_| Error::InvalidInput(format!("{}: embedded NUL", what))))
            .collect::<Result<_>>()?;
        let mut ptrs: Vec<*const c_char> = owned.iter().map(|c| c.as_ptr()).collect();
        ptrs.push(std::ptr::null());
        Ok(unsafe { (self.api.command)(self.handle.0, ptrs.as_mut_ptr()) })
    }

    fn set_property_raw(&self, name: &str, format: c_int, data: *mut c_void) -> Result<()> {
        self.guard()?;
        let cname = CString::new(name).expect("static property name");
        let rc = unsafe { (self.api.set_property)(self.handle.0, cname.as_ptr(), format, data) };
        self.check(rc, name)
    }

    fn get_double(&self, name: &str) -> Result<f64> {
        self.guard()?;
        let cname = CString::new(name).expect("static property name");
        let mut value: f64 = 0.0;
        let rc = unsafe {
            (self.api.get_property)(
                self.handle.0,
                cname.as_ptr(),
                MPV_FORMAT_DOUBLE,
                &mut value as *mut f64 as *mut c_void,
            )
        };
        self.check(rc, name)?;
        Ok(value)
    }
}

impl Decoder for RealDecoder {
    fn load(&mut self, path: &str) -> Result<()> {
        let rc = self.run_command("loadfile", &["loadfile", path])?;
        if rc < 0 {
            // Core is alive but rejected the input; not a recovery case
            return Err(Error::InvalidInput(format!(
                "loadfile {}: {}",
                path,
                self.api.describe(rc)
            )));
        }
        self.set_paused(false)
    }

    fn set_paused(&mut self, paused: bool) -> Result<()> {
        let mut flag: c_int = paused as c_int;
        self.set_property_raw("pause", MPV_FORMAT_FLAG, &mut flag as *mut c_int as *mut c_void)
    }

    fn paused(&self) -> Result<bool> {
        self.guard()?;
        let cname = CString::new("pause").expect("static property name");
        let mut flag: c_int = 0;
        let rc = unsafe {
            (self.api.get_property)(
                self.handle.0,
                cname.as_ptr(),
                MPV_FORMAT_FLAG,
                &mut flag as *mut c_int as *mut c_void,
            )
        };
        self.check(rc, "pause")?;
        Ok(flag != 0)
    }

    fn stop(&mut self) -> Result<()> {
        let rc = self.run_command("stop", &["stop"])?;
        self.check(rc, "stop")
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        let target = format!("{}", position);
        let rc = self.run_command("seek", &["seek", &target, "absolute"])?;
        self.check(rc, "seek")
    }

    fn set_speed(&mut self, speed: f64) -> Result<()> {
        let mut value = speed;
        self.set_property_raw("speed", MPV_FORMAT_DOUBLE, &mut value as *mut f64 as *mut c_void)
    }

    fn set_volume(&mut self, volume: f64) -> Result<()> {
        let mut value = volume;
        self.set_property_raw("volume", MPV_FORMAT_DOUBLE, &mut value as *mut f64 as *mut c_void)
    }

    fn set_output_target(&mut self, target: Option<i64>) -> Result<()> {
        // The numeric detach sentinel stays inside this backend adapter
        let mut wid: i64 = target.unwrap_or(DETACHED_TARGET);
        self.set_property_raw("wid", MPV_FORMAT_INT64, &mut wid as *mut i64 as *mut c_void)
    }

    fn position(&self) -> Result<f64> {
        self.get_double("time-pos")
    }

    fn duration(&self) -> Result<f64> {
        self.get_double("duration")
    }
}

impl Drop for RealDecoder {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!("Decoder teardown on drop failed: {}", e);
        }
    }
}

fn set_option(api: &BackendApi, handle: *mut c_void, name: &str, value: &str) {
    let cname = CString::new(name).expect("static option name");
    let cvalue = CString::new(value).expect("static option value");
    let rc = unsafe { (api.set_option_string)(handle, cname.as_ptr(), cvalue.as_ptr()) };
    if rc < 0 {
        warn!("Backend option {}={} rejected: {}", name, value, api.describe(rc));
    }
}

/// Drain the backend event queue, forwarding observed property changes
///
/// Exits when teardown raises the stop flag, when the core announces
/// shutdown, or when the notification receiver has gone away.
fn spawn_event_thread(
    api: Arc<BackendApi>,
    handle: ClientHandle,
    dead: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    notifications: NotificationSender,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("decoder-events".to_string())
        .spawn(move || {
            let handle = handle;
            while !stop.load(Ordering::Acquire) {
                let event = unsafe { (api.wait_event)(handle.0, 0.25) };
                if event.is_null() {
                    continue;
                }
                let event = unsafe { &*event };
                match event.event_id {
                    MPV_EVENT_NONE => {}
                    MPV_EVENT_SHUTDOWN => {
                        warn!("Decoder core announced shutdown");
                        dead.store(true, Ordering::Release);
                        break;
                    }
                    MPV_EVENT_PROPERTY_CHANGE => {
                        let prop = event.data as *const MpvEventProperty;
                        if prop.is_null() {
                            continue;
                        }
                        let prop = unsafe { &*prop };
                        if prop.format != MPV_FORMAT_DOUBLE || prop.data.is_null() {
                            // Property currently unavailable (e.g. duration
                            // before the demuxer knows it); skip
                            continue;
                        }
                        let value = unsafe { *(prop.data as *const f64) };
                        let name = unsafe { CStr::from_ptr(prop.name) }.to_string_lossy();
                        let change = match name.as_ref() {
                            "time-pos" => Some(PropertyChange::Position(value)),
                            "duration" => Some(PropertyChange::Duration(value)),
                            _ => None,
                        };
                        if let Some(change) = change {
                            if notifications.send(change).is_err() {
                                break;
                            }
                        }
                    }
                    _ => {}
                }
            }
        })
        .map_err(|e| Error::Internal(format!("failed to spawn decoder event thread: {}", e)))
}
