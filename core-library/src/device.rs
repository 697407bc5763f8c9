//! Device Identity
//!
//! Best-effort parsing of the `Control/Device/SysInfo` file: `Key: Value`
//! lines written once by the factory or by the pairing setup tool. Absence
//! of the file, or of individual keys, is logged and never fatal.

use bridge_traits::volume::VolumeAccess;
use tracing::{debug, info, warn};

use crate::layout;
use crate::sanitize::sanitize_lossy;

/// Whether the device firmware validates the database against a pairing
/// identifier before accepting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumKind {
    /// Database accepted as-is.
    #[default]
    None,
    /// Database must carry the hash derived from the pairing identifier.
    Paired,
}

/// Identity metadata read from SysInfo
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    pub board_type: Option<String>,
    pub build_id: Option<String>,
    /// Stable identifier produced by the one-time hardware pairing setup.
    pub pairing_id: Option<String>,
    pub checksum_kind: ChecksumKind,
}

impl DeviceInfo {
    /// Parse SysInfo text. Unknown keys are ignored; duplicate keys keep
    /// the first occurrence.
    pub fn parse(text: &str) -> Self {
        let mut info = DeviceInfo::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key {
                "ModelNumStr" => info.model_number.get_or_insert_with(|| value.to_string()),
                "SerialNumber" => info.serial_number.get_or_insert_with(|| value.to_string()),
                "BoardType" => info.board_type.get_or_insert_with(|| value.to_string()),
                "BuildID" => info.build_id.get_or_insert_with(|| value.to_string()),
                "PairingGuid" => info.pairing_id.get_or_insert_with(|| value.to_string()),
                "ChecksumType" => {
                    if value != "0" {
                        info.checksum_kind = ChecksumKind::Paired;
                    }
                    continue;
                }
                _ => continue,
            };
        }

        info
    }

    /// Read SysInfo from the volume. Returns `None` when the file is
    /// missing or unreadable.
    pub async fn read(volume: &dyn VolumeAccess) -> Option<Self> {
        match volume.read_file(&layout::sysinfo_path()).await {
            Ok(bytes) => {
                let info = Self::parse(&sanitize_lossy(&bytes));
                info!(
                    model = info.model_number.as_deref().unwrap_or("(unknown)"),
                    serial = info.serial_number.as_deref().unwrap_or("(unknown)"),
                    paired = info.pairing_id.is_some(),
                    "Read device SysInfo"
                );
                Some(info)
            }
            Err(e) if e.is_not_found() => {
                debug!("No SysInfo on device, identity unknown");
                None
            }
            Err(e) => {
                warn!("Could not read SysInfo: {}", e);
                None
            }
        }
    }

    /// Whether this model refuses databases written without pairing.
    pub fn requires_pairing(&self) -> bool {
        self.checksum_kind == ChecksumKind::Paired
    }

    /// Whether the one-time pairing setup has been completed.
    pub fn is_paired(&self) -> bool {
        self.pairing_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSINFO: &str = "\
ModelNumStr: PL450
SerialNumber: ZQ619PODX
BoardType: 7
BuildID: 0x51d204
ChecksumType: 1
PairingGuid: 0xF5D4C1B2A3908172
";

    #[test]
    fn test_parse_full_sysinfo() {
        let info = DeviceInfo::parse(SYSINFO);
        assert_eq!(info.model_number.as_deref(), Some("PL450"));
        assert_eq!(info.serial_number.as_deref(), Some("ZQ619PODX"));
        assert_eq!(info.checksum_kind, ChecksumKind::Paired);
        assert!(info.requires_pairing());
        assert!(info.is_paired());
    }

    #[test]
    fn test_parse_unpaired_device() {
        let info = DeviceInfo::parse("ModelNumStr: PL450\nChecksumType: 1\n");
        assert!(info.requires_pairing());
        assert!(!info.is_paired());
    }

    #[test]
    fn test_parse_legacy_model_no_checksum() {
        let info = DeviceInfo::parse("ModelNumStr: PL120\nChecksumType: 0\n");
        assert!(!info.requires_pairing());
    }

    #[test]
    fn test_parse_garbage_lines_ignored() {
        let info = DeviceInfo::parse("no separator here\n: empty key\nModelNumStr: X\n");
        assert_eq!(info.model_number.as_deref(), Some("X"));
    }

    #[test]
    fn test_parse_empty() {
        let info = DeviceInfo::parse("");
        assert!(info.model_number.is_none());
        assert!(!info.requires_pairing());
    }
}
