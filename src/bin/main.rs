#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Duration, Instant, Timer, with_deadline};
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_backtrace as _;
use esp_hal::{
    delay::Delay,
    gpio::{Input, InputConfig, Level, Output, OutputConfig},
    rng::Rng,
    rtc_cntl::Rtc,
    spi::{self, master::Spi},
    time::Rate,
    timer::timg::TimerGroup,
};
use esp_println::logger::init_logger;
use esp_radio::Controller;
use heapless::format;
use log::info;

use epd_weatherframe::{
    config::Config,
    display::{self, show_app_error},
    graphics::{self, FrameContent},
    image::{self, bmp::Bmp},
    network::{connection, net_task},
    scheduler::{DueActions, decide_actions},
    sleep::enter_deep_sleep_minutes,
    state::{self, PersistedState, WeatherSnapshot},
    weather,
};

const HEAP_KB: usize = 128;

esp_bootloader_esp_idf::esp_app_desc!();

// Use https://docs.rs/static_cell/2.1.1/static_cell/macro.make_static.html
// once rust feature(type_alias_impl_trait) is stable
macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

/// Persist the wake counter and go back to sleep for one wake interval.
fn abort_wake(rtc: Rtc, state: PersistedState, wake_interval_min: u32) -> ! {
    state::store(state);
    enter_deep_sleep_minutes(rtc, wake_interval_min)
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // Initialize logger for esp-println
    init_logger(log::LevelFilter::Info);
    esp_alloc::heap_allocator!(size: HEAP_KB * 1024);

    info!("Initialize peripherals");
    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialize RTC for deep sleep
    let rtc = Rtc::new(peripherals.LPWR);

    let config = Config::from_build();
    let wake_interval_min = config.schedule.wake_interval_min.max(1);

    // Iniitialize SPI device and control pins
    let sclk = peripherals.GPIO36;
    let mosi = peripherals.GPIO35;
    let miso = peripherals.GPIO37;
    let spi = match Spi::new(
        peripherals.SPI2,
        spi::master::Config::default().with_frequency(Rate::from_mhz(4)),
    ) {
        Ok(spi) => spi.with_sck(sclk).with_miso(miso).with_mosi(mosi),
        Err(e) => {
            log::error!("Failed to initialize SPI: {:?}", e);
            enter_deep_sleep_minutes(rtc, wake_interval_min);
        }
    };
    let busy = Input::new(peripherals.GPIO5, InputConfig::default());
    let rst = Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default());
    let dc = Output::new(peripherals.GPIO7, Level::High, OutputConfig::default());
    let cs = Output::new(peripherals.GPIO8, Level::High, OutputConfig::default());
    let spi_device = mk_static!(
        ExclusiveDevice<Spi<'static, esp_hal::Blocking>, Output<'static>, Delay>,
        match ExclusiveDevice::new(spi, cs, Delay::new()) {
            Ok(device) => device,
            Err(e) => {
                log::error!("Failed to create SPI device: {:?}", e);
                enter_deep_sleep_minutes(rtc, wake_interval_min);
            }
        }
    );

    // A configuration error is baked into the build; show it instead of
    // silently retrying forever.
    let tz = match config.validate() {
        Ok(tz) => tz,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            let error_msg: heapless::String<192> =
                format!("Configuration error:\n{e}").unwrap_or_default();
            show_app_error(&error_msg, spi_device, busy, dc, rst);
            enter_deep_sleep_minutes(rtc, wake_interval_min);
        }
    };

    // Wake accounting: load the persisted marks and count this cycle
    let (mut persisted, first_boot) = match state::load() {
        Some(persisted) => (persisted, false),
        None => {
            info!("First boot, initializing schedule state");
            (PersistedState::fresh(), true)
        }
    };
    persisted.wake_cycles = persisted.wake_cycles.wrapping_add(1);

    let due = if first_boot {
        // populate the panel right away instead of waiting a full interval
        DueActions {
            fetch_weather: true,
            fetch_image: true,
        }
    } else {
        decide_actions(&config.schedule, &persisted.marks(), persisted.wake_cycles)
    };
    info!(
        "Wake cycle {}: weather due: {}, image due: {}",
        persisted.wake_cycles, due.fetch_weather, due.fetch_image
    );

    // Nothing due: skip radio bring-up entirely and sleep again
    if !due.any() {
        abort_wake(rtc, persisted, wake_interval_min);
    }

    // Initialize and start RTOS timer
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Initialize radio and WiFi controller
    let esp_radio_ctrl = &*mk_static!(
        Controller<'static>,
        match esp_radio::init() {
            Ok(ctrl) => ctrl,
            Err(e) => {
                log::error!("Failed to initialize radio: {:?}", e);
                if first_boot {
                    let error_msg: heapless::String<128> =
                        format!("Failed to initialize radio: {e}").unwrap_or_default();
                    show_app_error(&error_msg, spi_device, busy, dc, rst);
                }
                abort_wake(rtc, persisted, wake_interval_min);
            }
        }
    );
    let (controller, interfaces) =
        match esp_radio::wifi::new(esp_radio_ctrl, peripherals.WIFI, Default::default()) {
            Ok(wifi) => wifi,
            Err(e) => {
                log::error!("Failed to initialize WiFi: {:?}", e);
                if first_boot {
                    let error_msg: heapless::String<128> =
                        format!("Failed to initialize WiFi: {e}").unwrap_or_default();
                    show_app_error(&error_msg, spi_device, busy, dc, rst);
                }
                abort_wake(rtc, persisted, wake_interval_min);
            }
        };
    let wifi_interface = interfaces.sta;

    // init network stack
    let net_config = embassy_net::Config::dhcpv4(Default::default());
    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | (rng.random() as u64);
    let (stack, runner) = embassy_net::new(
        wifi_interface,
        net_config,
        mk_static!(StackResources<3>, StackResources::<3>::new()),
        seed,
    );

    // spawn network tasks
    spawner
        .spawn(connection(controller, config.wifi_ssid, config.wifi_pass))
        .ok();
    spawner.spawn(net_task(runner)).ok();

    // wait for link up (with timeout)
    if with_deadline(Instant::now() + Duration::from_secs(10), async {
        loop {
            if stack.is_link_up() {
                break;
            }
            Timer::after(Duration::from_millis(500)).await;
        }
    })
    .await
    .is_err()
    {
        log::error!("Timed out waiting for link up");
        if first_boot {
            show_app_error("Timed out waiting for link up", spi_device, busy, dc, rst);
        }
        abort_wake(rtc, persisted, wake_interval_min);
    }

    // wait for IP address (with timeout)
    if with_deadline(Instant::now() + Duration::from_secs(20), async {
        loop {
            if let Some(net_config) = stack.config_v4() {
                info!("Got IP: {}", net_config.address);
                break;
            }
            Timer::after(Duration::from_millis(500)).await;
        }
    })
    .await
    .is_err()
    {
        log::error!("Timed out waiting for IP address");
        if first_boot {
            show_app_error(
                "Timed out waiting for IP address",
                spi_device,
                busy,
                dc,
                rst,
            );
        }
        abort_wake(rtc, persisted, wake_interval_min);
    }

    // Weather first, then image. Marks only move after a success, so a
    // failed fetch stays due and the next wake retries it.
    if due.fetch_weather {
        match weather::fetch_current_weather(stack, &config).await {
            Ok(doc) => {
                persisted.weather = WeatherSnapshot::from(&doc);
                persisted.last_weather_mark = persisted.wake_cycles;
            }
            Err(e) => log::error!("Weather fetch failed, retrying next wake: {}", e),
        }
    }

    let mut image_bytes = None;
    if due.fetch_image {
        match image::fetch_image(stack, &config).await {
            Ok(bytes) => image_bytes = Some(bytes),
            Err(e) => log::error!("Image fetch failed, retrying next wake: {}", e),
        }
    }
    let bmp = image_bytes.as_deref().and_then(|bytes| match Bmp::parse(bytes) {
        Ok(bmp) => Some(bmp),
        Err(e) => {
            log::error!("Image decode failed, retrying next wake: {}", e);
            None
        }
    });
    if bmp.is_some() {
        persisted.last_image_mark = persisted.wake_cycles;
    }

    // Redraw only when something new arrived; e-paper keeps the old frame
    // through sleep, so a fully failed wake leaves it untouched.
    let fetched_any = persisted.last_weather_mark == persisted.wake_cycles
        || persisted.last_image_mark == persisted.wake_cycles;
    if fetched_any {
        let content = FrameContent {
            weather: persisted.weather.is_valid().then_some(&persisted.weather),
            image: bmp.as_ref(),
            units: weather::unit_labels(config.owm_units),
        };
        let shown = display::new_frame().and_then(|mut frame| {
            graphics::render_frame(&content, &tz, &mut frame)?;
            display::present(&frame, spi_device, busy, dc, rst)
        });
        match shown {
            Ok(()) => info!("Frame updated"),
            Err(e) => log::error!("Display update failed: {}", e),
        }
    } else {
        log::error!("All fetches failed, keeping previous frame");
    }

    abort_wake(rtc, persisted, wake_interval_min);
}
