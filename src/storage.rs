//! Persistent storage for the configuration document.
//!
//! Uses the nRF52840's internal flash via the `sequential-storage` crate
//! so the last accepted configuration survives a power cycle.
//!
//! Storage layout:
//!   - One key-value map item holding the raw document bytes.
//!   - Writes append; `sequential-storage` handles wear levelling and
//!     garbage collection of the reserved pages.

use alloc::vec;
use alloc::vec::Vec;

use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, remove_item, store_item};

use crate::config::{MAX_STORED_CONFIG, STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Key of the configuration document in the map.
const KEY_CONFIG: u8 = 0x01;

/// Item header, key and word alignment on top of the document.
const ITEM_OVERHEAD: usize = 32;

/// The stored configuration document.
pub struct ConfigStore<F> {
    flash: F,
}

impl<F: NorFlash> ConfigStore<F> {
    pub fn new(flash: F) -> Self {
        Self { flash }
    }

    /// Read the stored document, if there is one.
    pub async fn load(&mut self) -> Option<Vec<u8>> {
        let mut buf = vec![0u8; MAX_STORED_CONFIG + ITEM_OVERHEAD];

        match fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_CONFIG,
        )
        .await
        {
            Ok(Some(document)) => {
                info!("Loaded {} byte configuration from flash", document.len());
                Some(document.to_vec())
            }
            Ok(None) => {
                info!("No configuration in flash");
                None
            }
            Err(e) => {
                error!("Flash read error: {:?}", defmt::Debug2Format(&e));
                None
            }
        }
    }

    /// Persist `document`. Documents over [`MAX_STORED_CONFIG`] are not
    /// stored, and the previous one is erased so it cannot come back on
    /// the next boot. Returns whether `document` is now in flash.
    pub async fn save(&mut self, document: &[u8]) -> bool {
        let mut buf = vec![0u8; MAX_STORED_CONFIG + ITEM_OVERHEAD];

        if document.len() > MAX_STORED_CONFIG {
            warn!(
                "Configuration of {} bytes exceeds {} - kept in RAM only",
                document.len(),
                MAX_STORED_CONFIG
            );
            if let Err(e) = remove_item::<u8, _>(
                &mut self.flash,
                STORAGE_START..STORAGE_END,
                &mut NoCache::new(),
                &mut buf,
                &KEY_CONFIG,
            )
            .await
            {
                error!("Flash erase error: {:?}", defmt::Debug2Format(&e));
            }
            return false;
        }

        match store_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_CONFIG,
            &document,
        )
        .await
        {
            Ok(()) => {
                info!("Saved {} byte configuration to flash", document.len());
                true
            }
            Err(e) => {
                error!("Flash write error: {:?}", defmt::Debug2Format(&e));
                false
            }
        }
    }
}
