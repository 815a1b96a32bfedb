// C ABI over a process-wide sound player

use chime_backend::{Backend, BackendConfig};
use chime_core::{EndReason, VolumeStep};
use chime_sounds::{PlayError, SoundCallback, SoundPlayer};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::ffi::{c_char, c_void, CStr, CString};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::time::Duration;

/// End-of-playback callback: `reason` is 0 (done), 1 (error) or 2 (revoked)
pub type ChimeSoundEndCallback = extern "C" fn(reason: u32, param: *mut c_void);

static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder()
            .is_test(false)
            .filter_level(log::LevelFilter::Info)
            .try_init();
    });
}

static PLAYER: Lazy<Mutex<SoundPlayer<Backend>>> = Lazy::new(|| {
    init_logging();
    Mutex::new(SoundPlayer::new(Backend::new(BackendConfig::default())))
});

/// Set while a thread is between entering and leaving `chime_sound_play`
static PLAY_IN_FLIGHT: AtomicBool = AtomicBool::new(false);

/// Releases `PLAY_IN_FLIGHT` on every exit from `chime_sound_play`
struct InFlight;

impl InFlight {
    fn claim() -> Option<Self> {
        PLAY_IN_FLIGHT
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        PLAY_IN_FLIGHT.store(false, Ordering::Release);
    }
}

/// Diagnostic handed out through `error_out`; replaced on the next failure
static LAST_ERROR: Lazy<Mutex<CString>> = Lazy::new(|| Mutex::new(CString::default()));

/// Caller parameter carried to the callback thread untouched
struct SendPtr(*mut c_void);

// The pointer is never dereferenced on our side
unsafe impl Send for SendPtr {}

impl SendPtr {
    fn get(&self) -> *mut c_void {
        self.0
    }
}

fn store_error(err: &PlayError) -> *const c_char {
    // Diagnostics carry file paths; an interior NUL ends the message early
    let text = err.diagnostic();
    let text = match text.find('\0') {
        Some(end) => &text[..end],
        None => text.as_str(),
    };
    let mut slot = LAST_ERROR.lock();
    *slot = CString::new(text).unwrap_or_default();
    slot.as_ptr()
}

fn to_code(result: Result<(), PlayError>, error_out: *mut *const c_char) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            let message = store_error(&err);
            if !error_out.is_null() {
                unsafe { *error_out = message };
            }
            err.status_code()
        }
    }
}

#[cfg(unix)]
fn path_from_c(file: &CStr) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(file.to_bytes()))
}

#[cfg(not(unix))]
fn path_from_c(file: &CStr) -> PathBuf {
    PathBuf::from(file.to_string_lossy().into_owned())
}

fn wrap_callback(callback: Option<ChimeSoundEndCallback>, param: *mut c_void) -> Option<SoundCallback> {
    let callback = callback?;
    let param = SendPtr(param);
    Some(Box::new(move |reason: EndReason| callback(reason.code(), param.get())))
}

/// Play a wave file and return once its first frame has been rendered.
///
/// Returns 0 on success or a negative status. On failure `*error_out`
/// (when not null) points at a NUL-terminated diagnostic that stays valid
/// until the next failing call; on success it is set to null. `callback`
/// runs exactly once, on an audio thread, when playback ends. It must not
/// call `chime_sound_stop`. A call made while another thread is still
/// inside `chime_sound_play` fails with the in-progress status.
///
/// # Safety
/// `file` must be null or a valid NUL-terminated string. `error_out` must be
/// null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn chime_sound_play(
    file: *const c_char,
    timeout_s: u8,
    volume_step: i8,
    error_out: *mut *const c_char,
    callback: Option<ChimeSoundEndCallback>,
    param: *mut c_void,
) -> i32 {
    if !error_out.is_null() {
        *error_out = std::ptr::null();
    }
    if file.is_null() {
        return to_code(Err(PlayError::NullArgument), error_out);
    }
    let path = path_from_c(CStr::from_ptr(file));

    // Only a concurrent play is refused here; stop and the volume calls
    // hold the player briefly and are waited out
    let Some(_in_flight) = InFlight::claim() else {
        return to_code(Err(PlayError::AlreadyPlaying), error_out);
    };
    let result = PLAYER.lock().play(
        &path,
        Duration::from_secs(u64::from(timeout_s)),
        volume_step,
        wrap_callback(callback, param),
    );
    to_code(result, error_out)
}

/// Stop the current sound, if any. Idempotent.
#[no_mangle]
pub extern "C" fn chime_sound_stop() {
    PLAYER.lock().stop();
}

/// Raise the volume one step; returns the maximum plus one when saturated
#[no_mangle]
pub extern "C" fn chime_sound_volume_up() -> VolumeStep {
    PLAYER.lock().volume_up()
}

/// Lower the volume one step; returns the minimum minus one when saturated
#[no_mangle]
pub extern "C" fn chime_sound_volume_down() -> VolumeStep {
    PLAYER.lock().volume_down()
}
