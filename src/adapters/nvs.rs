//! Persistent records in NVS flash.
//!
//! The node keeps three records across resets, each in its own namespace:
//! the configuration (a postcard blob), the boot counter (`u32` LE) and a
//! copy of the last uplink.  On the host the records live in a map, so the
//! simulator and the tests go through the same load/save paths.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;
use crate::telemetry::buffer::UPLINK_CAPACITY;

#[cfg(not(target_os = "espidf"))]
use std::{cell::RefCell, collections::HashMap};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "multigas";
const CONFIG_KEY: &str = "syscfg";

const BOOT_NAMESPACE: &str = "boot";
const BOOT_KEY: &str = "count";

const LOG_NAMESPACE: &str = "log";
const LAST_UPLINK_KEY: &str = "uplink";

/// Read buffer for the config blob.
const MAX_CONFIG_BLOB: usize = 256;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    records: RefCell<HashMap<(String, String), Vec<u8>>>,
}

impl NvsAdapter {
    /// Bring up NVS flash.  A full or outdated partition is erased and
    /// initialised again.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS
            // access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            records: RefCell::new(HashMap::new()),
        })
    }

    // ── Node records ──────────────────────────────────────────

    /// Increment and persist the boot counter.  Returns the new count, or
    /// `None` if storage is unusable.
    pub fn next_boot_count(&mut self) -> Option<u32> {
        let mut buf = [0u8; 4];
        let previous = match self.read(BOOT_NAMESPACE, BOOT_KEY, &mut buf) {
            Ok(4) => u32::from_le_bytes(buf),
            Ok(_) | Err(StorageError::NotFound) => 0,
            Err(e) => {
                warn!("NvsAdapter: boot counter unreadable: {}", e);
                return None;
            }
        };
        let count = previous.wrapping_add(1);
        match self.put(BOOT_NAMESPACE, BOOT_KEY, &count.to_le_bytes()) {
            Ok(()) => Some(count),
            Err(e) => {
                warn!("NvsAdapter: boot counter not saved: {}", e);
                None
            }
        }
    }

    /// Persist a copy of the last uplink message.
    pub fn store_last_uplink(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.put(LOG_NAMESPACE, LAST_UPLINK_KEY, bytes)
    }

    /// Read back the last uplink message, if one was stored.
    pub fn last_uplink(&self) -> Option<Vec<u8>> {
        let mut buf = [0u8; UPLINK_CAPACITY];
        let len = self.read(LOG_NAMESPACE, LAST_UPLINK_KEY, &mut buf).ok()?;
        Some(buf[..len].to_vec())
    }

    // ── Backend ───────────────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.records
            .borrow_mut()
            .insert((namespace.to_owned(), key.to_owned()), data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let ret = Self::with_handle(namespace, true, |handle| {
            let key = Self::c_name(key);
            // SAFETY: `key` is NUL-terminated and `data` outlives the call.
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return ret;
            }
            unsafe { nvs_commit(handle) }
        });
        if ret == ESP_OK {
            Ok(())
        } else if ret == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
            Err(StorageError::Full)
        } else {
            Err(StorageError::IoError)
        }
    }

    /// NUL-terminated copy of a namespace or key, truncated to the NVS
    /// limit of 15 characters.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open a namespace, run `f` with the handle, close it again.
    #[cfg(target_os = "espidf")]
    fn with_handle(
        namespace: &str,
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> esp_err_t,
    ) -> esp_err_t {
        let ns = Self::c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return ret;
        }
        let ret = f(handle);
        unsafe { nvs_close(handle) };
        ret
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let mut buf = [0u8; MAX_CONFIG_BLOB];
        match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", len);
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config unreadable ({}), using defaults", e);
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.put(CONFIG_NAMESPACE, CONFIG_KEY, &bytes).map_err(|e| {
            warn!("NvsAdapter: config not saved: {}", e);
            ConfigError::IoError
        })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let records = self.records.borrow();
            let data = records
                .get(&(namespace.to_owned(), key.to_owned()))
                .ok_or(StorageError::NotFound)?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok(len)
        }

        #[cfg(target_os = "espidf")]
        {
            let mut size = buf.len();
            let ret = Self::with_handle(namespace, false, |handle| {
                let key = Self::c_name(key);
                // SAFETY: `size` holds the capacity of `buf`.
                unsafe {
                    nvs_get_blob(
                        handle,
                        key.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                }
            });
            if ret == ESP_OK {
                Ok(size)
            } else if ret == ESP_ERR_NVS_NOT_FOUND {
                Err(StorageError::NotFound)
            } else {
                Err(StorageError::IoError)
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put(namespace, key, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_loads_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.load().unwrap(), SystemConfig::default());
    }

    #[test]
    fn config_round_trip() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = SystemConfig {
            tx_cycle_permanent_secs: 900,
            ..Default::default()
        };
        nvs.save(&cfg).unwrap();
        assert_eq!(nvs.load().unwrap(), cfg);
    }

    #[test]
    fn encoded_config_fits_the_read_buffer() {
        let bytes = postcard::to_allocvec(&SystemConfig::default()).unwrap();
        assert!(bytes.len() <= MAX_CONFIG_BLOB);
    }

    #[test]
    fn invalid_config_is_not_saved() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = SystemConfig {
            tx_cycle_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            nvs.save(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
        assert_eq!(nvs.load().unwrap(), SystemConfig::default());
    }

    #[test]
    fn corrupted_config_is_reported() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.write(CONFIG_NAMESPACE, CONFIG_KEY, &[0xFF; 3]).unwrap();
        assert_eq!(nvs.load(), Err(ConfigError::Corrupted));
    }

    #[test]
    fn boot_counter_increments() {
        let mut nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.next_boot_count(), Some(1));
        assert_eq!(nvs.next_boot_count(), Some(2));
        assert_eq!(nvs.next_boot_count(), Some(3));
    }

    #[test]
    fn last_uplink_round_trip() {
        let mut nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.last_uplink(), None);
        let msg = [0x27, 0x04, 0x15, 0x4D, 0x7A, 0x5E];
        nvs.store_last_uplink(&msg).unwrap();
        assert_eq!(nvs.last_uplink().as_deref(), Some(&msg[..]));
    }

    #[test]
    fn records_do_not_clobber_each_other() {
        let mut nvs = NvsAdapter::new().unwrap();
        let cfg = SystemConfig {
            tx_cycle_permanent_secs: 600,
            ..Default::default()
        };
        nvs.save(&cfg).unwrap();
        nvs.next_boot_count();
        nvs.store_last_uplink(&[0x27, 0x00]).unwrap();

        assert_eq!(nvs.load().unwrap(), cfg);
        assert_eq!(nvs.next_boot_count(), Some(2));
        assert_eq!(nvs.last_uplink().as_deref(), Some(&[0x27, 0x00][..]));
    }

    #[test]
    fn missing_key_is_not_found() {
        let nvs = NvsAdapter::new().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(
            nvs.read(LOG_NAMESPACE, "nope", &mut buf),
            Err(StorageError::NotFound)
        );
    }
}
