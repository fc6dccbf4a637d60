use embassy_net::Runner;
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{
    ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent, WifiStaState,
};
use log::{error, info};

/// Keep the station associated, retrying forever on failure. Credentials
/// come from the startup `Config`; nothing here reads globals.
#[embassy_executor::task]
pub async fn connection(
    mut controller: WifiController<'static>,
    ssid: &'static str,
    password: &'static str,
) {
    info!("Starting connection task");
    info!("Device capabilities {:?}", controller.capabilities());
    loop {
        if esp_radio::wifi::sta_state() == WifiStaState::Connected {
            // wait untill disconnected
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            Timer::after(Duration::from_secs(5)).await;
        }
        if !matches!(controller.is_started(), Ok(true)) {
            info!("Attempting to connect to WiFi network SSID: {}", ssid);
            let client_config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(ssid.into())
                    .with_password(password.into()),
            );
            if let Err(e) = controller.set_config(&client_config) {
                error!("Failed to set WiFi config: {:?}", e);
                Timer::after(Duration::from_secs(5)).await;
                continue;
            }
            info!("Starting Wifi");
            if let Err(e) = controller.start_async().await {
                error!("Failed to start WiFi: {:?}", e);
                Timer::after(Duration::from_secs(5)).await;
                continue;
            }
            info!("Wifi Started");

            info!("About to connect");
            match controller.connect_async().await {
                Ok(_) => info!("Wifi connected!"),
                Err(e) => {
                    error!("Failed to connect to wifi: {e:?}");
                    Timer::after(Duration::from_secs(5)).await;
                }
            }
        }
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
