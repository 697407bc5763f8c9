//! Device Path Encoding
//!
//! The device firmware stores content paths with a colon as the hierarchy
//! separator; hosts use slashes. Conversion is purely syntactic (no
//! filesystem access) and the two transforms are inverses for any path
//! that uses only its own separator (colon is reserved by the firmware and
//! never appears in portable file names).

/// Separator used inside the on-device database.
pub const DEVICE_SEPARATOR: char = ':';

/// Separator used by host filesystems.
pub const PORTABLE_SEPARATOR: char = '/';

/// Convert a portable (slash-separated) path to the device encoding.
pub fn to_device_format(path: &str) -> String {
    path.replace(PORTABLE_SEPARATOR, ":")
}

/// Convert a device (colon-separated) path back to portable form.
pub fn to_portable_format(path: &str) -> String {
    path.replace(DEVICE_SEPARATOR, "/")
}
