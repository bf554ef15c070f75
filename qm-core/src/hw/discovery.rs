//! hidraw device discovery
//!
//! Finds Quadro controllers by scanning `<sysfs>/class/hidraw/*/device/uevent`
//! for the USB vendor/product pair. The sysfs and /dev roots are parameters
//! so tests can point them at a temporary tree.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::constants::{device, paths};
use crate::error::{QuadroError, Result};

/// A hidraw node belonging to a Quadro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidrawDevice {
    /// Kernel name, e.g. `hidraw3`
    pub name: String,
    /// Device node, e.g. `/dev/hidraw3`
    pub node: PathBuf,
}

/// Bus, vendor and product from a `HID_ID=0003:00000C70:0000F00D` line
fn parse_hid_id(uevent: &str) -> Option<(u16, u16, u16)> {
    let value = uevent
        .lines()
        .find_map(|line| line.trim().strip_prefix("HID_ID="))?;

    let mut parts = value.split(':');
    let bus = u32::from_str_radix(parts.next()?, 16).ok()?;
    let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
    let product = u32::from_str_radix(parts.next()?, 16).ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some((
        u16::try_from(bus).ok()?,
        u16::try_from(vendor).ok()?,
        u16::try_from(product).ok()?,
    ))
}

fn is_quadro(uevent: &str) -> bool {
    parse_hid_id(uevent)
        == Some((device::HID_BUS_USB, device::VENDOR_ID, device::PRODUCT_ID))
}

/// All Quadro hidraw nodes under the given roots, sorted by name
pub fn find_quadro_devices(sysfs_root: &Path, dev_root: &Path) -> Result<Vec<HidrawDevice>> {
    let class_dir = sysfs_root.join("class").join("hidraw");
    let entries = match fs::read_dir(&class_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No hidraw class directory at {:?}", class_dir);
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(QuadroError::FileRead {
                path: class_dir,
                source: e,
            })
        }
    };

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let uevent_path = entry.path().join("device").join("uevent");

        let Ok(uevent) = fs::read_to_string(&uevent_path) else {
            trace!("Skipping {}: no readable uevent", name);
            continue;
        };

        if is_quadro(&uevent) {
            debug!("Found Quadro at {}", name);
            found.push(HidrawDevice {
                node: dev_root.join(&name),
                name,
            });
        }
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// First Quadro on the live system
pub fn find_quadro_device() -> Result<HidrawDevice> {
    find_quadro_devices(Path::new(paths::SYSFS_ROOT), Path::new(paths::DEV_ROOT))?
        .into_iter()
        .next()
        .ok_or_else(|| {
            QuadroError::DeviceNotFound(format!(
                "no hidraw device with USB id {:04x}:{:04x}",
                device::VENDOR_ID,
                device::PRODUCT_ID
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn add_hidraw(root: &Path, name: &str, hid_id: &str) {
        let dir = root.join("class/hidraw").join(name).join("device");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("uevent"),
            format!("DRIVER=hid-generic\nHID_ID={}\nHID_NAME=Test\n", hid_id),
        )
        .unwrap();
    }

    #[test]
    fn test_parse_hid_id() {
        assert_eq!(
            parse_hid_id("HID_ID=0003:00000C70:0000F00D\n"),
            Some((0x0003, 0x0c70, 0xf00d))
        );
        assert_eq!(parse_hid_id("HID_NAME=foo"), None);
        assert_eq!(parse_hid_id("HID_ID=0003:zz:0000F00D"), None);
        assert_eq!(parse_hid_id("HID_ID=0003:100000C70:0000F00D"), None);
    }

    #[test]
    fn test_finds_only_quadro_devices() {
        let tmp = TempDir::new().unwrap();
        add_hidraw(tmp.path(), "hidraw2", "0003:00000C70:0000F00D");
        add_hidraw(tmp.path(), "hidraw0", "0003:0000046D:0000C52B");
        add_hidraw(tmp.path(), "hidraw1", "0003:00000C70:0000F00D");

        let devices = find_quadro_devices(tmp.path(), Path::new("/dev")).unwrap();
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["hidraw1", "hidraw2"]);
        assert_eq!(devices[0].node, PathBuf::from("/dev/hidraw1"));
    }

    #[test]
    fn test_missing_class_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(find_quadro_devices(tmp.path(), Path::new("/dev")).unwrap().is_empty());
    }

    #[test]
    fn test_bluetooth_bus_is_not_matched() {
        assert!(!is_quadro("HID_ID=0005:00000C70:0000F00D"));
        assert!(is_quadro("HID_ID=0003:00000C70:0000F00D"));
    }
}
