//! System Control
//!
//! The restart primitive used by SWAP_AND_REBOOT. The firmware implementation
//! waits for the settle delay on the embassy timer and then resets the core.

/// Platform restart hooks
#[allow(async_fn_in_trait)]
pub trait SystemControl {
    /// Give queued status notifications time to reach the peer.
    async fn settle(&mut self);

    /// Reset the system. Never returns.
    fn reset(&mut self) -> !;
}

/// nRF52840 restart: settle on the RTC-driven timer, then a core reset.
#[cfg(feature = "firmware")]
pub struct NrfSystem;

#[cfg(feature = "firmware")]
impl SystemControl for NrfSystem {
    async fn settle(&mut self) {
        embassy_time::Timer::after_millis(crate::config::REBOOT_SETTLE_MS).await;
    }

    fn reset(&mut self) -> ! {
        defmt::warn!("System: resetting into the bootloader");
        cortex_m::peripheral::SCB::sys_reset()
    }
}
