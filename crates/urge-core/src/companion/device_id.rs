// Identity of this device on the companion link.
// Format: "urge-<uuid>"

use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

use crate::error::SyncError;
use crate::storage::data_dir;

const DEVICE_ID_FILE: &str = "device_id.txt";
pub const DEVICE_ID_PREFIX: &str = "urge-";

/// Read the device id stored in `dir`, creating it on first use.
///
/// A file whose content lacks the prefix is rejected rather than replaced,
/// since the companion keys its sequence watermark on this value.
pub fn get_or_create_device_id_at(dir: &Path) -> Result<String, SyncError> {
    let device_id_path = dir.join(DEVICE_ID_FILE);

    if device_id_path.exists() {
        let device_id = fs::read_to_string(&device_id_path)?.trim().to_string();
        if device_id.starts_with(DEVICE_ID_PREFIX) {
            return Ok(device_id);
        }
        return Err(SyncError::Transport(format!("invalid device id: {device_id}")));
    }

    let device_id = format!("{}{}", DEVICE_ID_PREFIX, Uuid::new_v4());

    fs::create_dir_all(dir)?;
    let mut file = fs::File::create(&device_id_path)?;
    writeln!(file, "{device_id}")?;

    Ok(device_id)
}

/// Device id in the default data directory.
pub fn get_or_create_device_id() -> Result<String, SyncError> {
    get_or_create_device_id_at(&data_dir()?)
}
