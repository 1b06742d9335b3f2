//! Utility functions shared by the on-disk layers.

use std::mem::size_of;
use std::slice;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns the current timestamp since the Unix epoch.
pub(crate) fn get_timestamp() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}

/// Reinterprets an on-disk record as its raw bytes.
///
/// `T` must be a plain `repr(C)` record without padding.
pub(crate) fn reinterpret<T>(obj: &T) -> &[u8] {
    unsafe { slice::from_raw_parts(obj as *const T as *const u8, size_of::<T>()) }
}

/// Reinterprets an on-disk record as its raw bytes, mutably.
///
/// `T` must be a plain `repr(C)` record without padding, for which every
/// bit pattern is a valid value.
pub(crate) fn reinterpret_mut<T>(obj: &mut T) -> &mut [u8] {
    unsafe { slice::from_raw_parts_mut(obj as *mut T as *mut u8, size_of::<T>()) }
}

/// Reinterprets a slice of on-disk records as raw bytes.
pub(crate) fn reinterpret_slice<T>(objs: &[T]) -> &[u8] {
    unsafe { slice::from_raw_parts(objs.as_ptr() as *const u8, objs.len() * size_of::<T>()) }
}

/// Reinterprets a slice of on-disk records as raw bytes, mutably.
pub(crate) fn reinterpret_slice_mut<T>(objs: &mut [T]) -> &mut [u8] {
    unsafe {
        slice::from_raw_parts_mut(objs.as_mut_ptr() as *mut u8, objs.len() * size_of::<T>())
    }
}
