use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use log::info;

/// Enter deep sleep until the next wake cycle.
///
/// # Note
/// This function does not return - the device resets when the RTC timer
/// fires and the whole wake cycle starts over from `main`.
pub fn enter_deep_sleep_minutes(rtc: Rtc, minutes: u32) -> ! {
    enter_deep_sleep_secs(rtc, minutes as u64 * 60)
}

/// Enter deep sleep mode with timer wakeup
///
/// # Arguments
/// * `rtc` - RTC controller
/// * `sleep_duration_secs` - Sleep duration in seconds
pub fn enter_deep_sleep_secs(mut rtc: Rtc, sleep_duration_secs: u64) -> ! {
    info!("Entering deep sleep for {sleep_duration_secs} secs");

    // Configure timer wakeup source
    let timer = TimerWakeupSource::new(core::time::Duration::from_secs(sleep_duration_secs));

    // Enter deep sleep - this will not return, device will reset on wake
    rtc.sleep_deep(&[&timer]);
}
