use embedded_graphics::{
    mono_font::{MonoTextStyle, ascii::FONT_6X10},
    pixelcolor::Gray2,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
};
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::{
    delay::Delay,
    gpio::{Input, Output},
    spi::master::Spi,
};
use once_cell::sync::Lazy;
use ssd1680::displays::adafruit_thinkink_2in9::{Display2in9Gray2, ThinkInk2in9Gray2};
use ssd1680::prelude::*;

use embedded_text::{
    TextBox,
    alignment::HorizontalAlignment,
    style::{HeightMode, TextBoxStyleBuilder},
};

use crate::error::AppError;

pub const DISPLAY_WIDTH: u32 = 296;
pub const DISPLAY_HEIGHT: u32 = 128;

/// Shared monospace style for body text; `graphics` draws with it too.
pub static CHARACTER_STYLE: Lazy<MonoTextStyle<'static, Gray2>> =
    Lazy::new(|| MonoTextStyle::new(&FONT_6X10, Gray2::BLACK));

pub type EpdSpiDevice = ExclusiveDevice<Spi<'static, esp_hal::Blocking>, Output<'static>, Delay>;

/// Fresh all-white frame buffer for the panel.
pub fn new_frame() -> Result<Display2in9Gray2, AppError> {
    let mut frame = Display2in9Gray2::new();
    Rectangle::new(Point::zero(), Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT))
        .into_styled(PrimitiveStyle::with_fill(Gray2::WHITE))
        .draw(&mut frame)
        .map_err(|e| {
            log::error!("Failed to clear display buffer: {:?}", e);
            AppError::Display
        })?;
    Ok(frame)
}

/// Push a finished frame buffer to the panel.
pub fn present(
    frame: &Display2in9Gray2,
    spi_device: &mut EpdSpiDevice,
    busy: Input<'static>,
    dc: Output<'static>,
    rst: Output<'static>,
) -> Result<(), AppError> {
    let mut epd = match ThinkInk2in9Gray2::new(spi_device, busy, dc, rst) {
        Ok(display) => display,
        Err(e) => {
            log::error!("Failed to create e-paper display: {:?}", e);
            return Err(AppError::Display);
        }
    };

    if let Err(e) = epd.begin(&mut Delay::new()) {
        log::error!("Failed to initialize e-paper display: {:?}", e);
        return Err(AppError::Display);
    }
    log::info!("E-paper display initialized");

    if let Err(e) =
        epd.update_gray2_and_display(frame.high_buffer(), frame.low_buffer(), &mut Delay::new())
    {
        log::error!("Failed to update e-paper display: {:?}", e);
        return Err(AppError::Display);
    }
    Ok(())
}

/// Show plain text across the whole panel.
pub fn show_on_display(
    text: &str,
    spi_device: &mut EpdSpiDevice,
    busy: Input<'static>,
    dc: Output<'static>,
    rst: Output<'static>,
) -> Result<(), AppError> {
    log::info!("Show on display: \n{}", text);
    let mut frame = new_frame()?;

    let textbox_style = TextBoxStyleBuilder::new()
        .height_mode(HeightMode::FitToText)
        .alignment(HorizontalAlignment::Left)
        .paragraph_spacing(2)
        .build();

    // height 0 lets FitToText compute the required height
    let bounds = Rectangle::new(Point::zero(), Size::new(DISPLAY_WIDTH, 0));
    let text_box = TextBox::with_textbox_style(text, bounds, *CHARACTER_STYLE, textbox_style);

    if let Err(e) = text_box.draw(&mut frame) {
        log::error!("Failed to draw text to display buffer: {:?}", e);
        return Err(AppError::Display);
    }

    present(&frame, spi_device, busy, dc, rst)
}

/// Show an error message on the display, ignoring display errors; callers
/// are already on their way to deep sleep.
pub fn show_app_error(
    msg: &str,
    spi_device: &mut EpdSpiDevice,
    busy: Input<'static>,
    dc: Output<'static>,
    rst: Output<'static>,
) {
    let _ = show_on_display(msg, spi_device, busy, dc, rst);
}
