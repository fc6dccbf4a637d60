//! Frame layout for the 296x128 grayscale panel.
//!
//! Two layouts: with a remote image the weather takes the left column and
//! the image the rest; without one the weather panel spans the full width.
//! All drawing goes through a generic `DrawTarget` so the layout is
//! testable without the panel.

use core::fmt::Write as _;

use embedded_graphics::{
    mono_font::{MonoTextStyle, ascii::FONT_10X20},
    pixelcolor::Gray2,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
};
use embedded_text::{
    TextBox,
    alignment::HorizontalAlignment,
    style::{HeightMode, TextBoxStyleBuilder},
};
use heapless::String;

use crate::{
    display::{CHARACTER_STYLE, DISPLAY_HEIGHT, DISPLAY_WIDTH},
    error::AppError,
    image::bmp::Bmp,
    state::WeatherSnapshot,
    time::{TzRule, format_clock, format_date},
};

/// Width of the weather column when an image shares the frame.
const PANEL_WIDTH: u32 = 168;
const MARGIN: i32 = 8;

pub struct FrameContent<'a> {
    pub weather: Option<&'a WeatherSnapshot>,
    pub image: Option<&'a Bmp<'a>>,
    /// Temperature and wind speed labels, see `weather::unit_labels`.
    pub units: (&'static str, &'static str),
}

/// Compose a full frame into `buffer`. The buffer is expected to be cleared
/// to white already.
pub fn render_frame<D>(content: &FrameContent<'_>, tz: &TzRule, buffer: &mut D) -> Result<(), AppError>
where
    D: DrawTarget<Color = Gray2>,
    D::Error: core::fmt::Debug,
{
    let panel_width = if content.image.is_some() {
        PANEL_WIDTH
    } else {
        DISPLAY_WIDTH
    };

    if let Some(bmp) = content.image {
        bmp.draw(Point::new(PANEL_WIDTH as i32, 0), buffer)?;
        draw_divider(buffer)?;
    }

    if let Some(snapshot) = content.weather {
        draw_weather_panel(snapshot, content.units, tz, panel_width, buffer)?;
    }

    Ok(())
}

fn draw_divider<D>(buffer: &mut D) -> Result<(), AppError>
where
    D: DrawTarget<Color = Gray2>,
    D::Error: core::fmt::Debug,
{
    Line::new(
        Point::new(PANEL_WIDTH as i32 - 1, 0),
        Point::new(PANEL_WIDTH as i32 - 1, DISPLAY_HEIGHT as i32 - 1),
    )
    .into_styled(PrimitiveStyle::with_stroke(Gray2::BLACK, 1))
    .draw(buffer)
    .map_err(|e| {
        log::error!("Failed to draw divider: {:?}", e);
        AppError::Display
    })
}

fn draw_weather_panel<D>(
    snapshot: &WeatherSnapshot,
    units: (&'static str, &'static str),
    tz: &TzRule,
    panel_width: u32,
    buffer: &mut D,
) -> Result<(), AppError>
where
    D: DrawTarget<Color = Gray2>,
    D::Error: core::fmt::Debug,
{
    let textbox_style = TextBoxStyleBuilder::new()
        .height_mode(HeightMode::FitToText)
        .alignment(HorizontalAlignment::Left)
        .paragraph_spacing(2)
        .build();
    let column = panel_width - 2 * MARGIN as u32;

    // headline temperature
    let temp_style = MonoTextStyle::new(&FONT_10X20, Gray2::BLACK);
    let mut headline: String<16> = String::new();
    write_tenths(&mut headline, snapshot.temp_dc);
    let _ = write!(headline, " {}", units.0);
    let bounds = Rectangle::new(Point::new(MARGIN, MARGIN), Size::new(column, 0));
    TextBox::with_textbox_style(&headline, bounds, temp_style, textbox_style)
        .draw(buffer)
        .map_err(|e| {
            log::error!("Failed to draw temperature: {:?}", e);
            AppError::Display
        })?;

    // condition, range, humidity, wind, sun
    let mut body: String<224> = String::new();
    let _ = writeln!(body, "{}", snapshot.description());
    let mut low: String<16> = String::new();
    write_tenths(&mut low, snapshot.temp_min_dc);
    let mut high: String<16> = String::new();
    write_tenths(&mut high, snapshot.temp_max_dc);
    let _ = writeln!(body, "{} to {} {}", low, high, units.0);
    let mut wind: String<16> = String::new();
    write_tenths(&mut wind, snapshot.wind_speed_dms as i32);
    let _ = writeln!(
        body,
        "hum {}%  wind {} {} {}",
        snapshot.humidity_pct,
        wind,
        units.1,
        compass(snapshot.wind_deg)
    );
    if let (Some(sunrise), Some(sunset)) = (
        tz.local(snapshot.sunrise as i64),
        tz.local(snapshot.sunset as i64),
    ) {
        let _ = writeln!(body, "sun {} - {}", format_clock(sunrise), format_clock(sunset));
    }
    let bounds = Rectangle::new(Point::new(MARGIN, 40), Size::new(column, 0));
    TextBox::with_textbox_style(&body, bounds, *CHARACTER_STYLE, textbox_style)
        .draw(buffer)
        .map_err(|e| {
            log::error!("Failed to draw weather text: {:?}", e);
            AppError::Display
        })?;

    // footer: date, place and local observation time
    if let Some(observed) = tz.local(snapshot.observed_at as i64) {
        let mut footer: String<96> = String::new();
        let _ = writeln!(footer, "{}", format_date(observed.date()));
        let _ = write!(footer, "{} {}", snapshot.place(), format_clock(observed));
        let bounds = Rectangle::new(
            Point::new(MARGIN, DISPLAY_HEIGHT as i32 - 26),
            Size::new(column, 0),
        );
        TextBox::with_textbox_style(&footer, bounds, *CHARACTER_STYLE, textbox_style)
            .draw(buffer)
            .map_err(|e| {
                log::error!("Failed to draw footer: {:?}", e);
                AppError::Display
            })?;
    }

    Ok(())
}

/// Fixed-point tenths to "12.3" / "-4.5".
fn write_tenths<const N: usize>(out: &mut String<N>, tenths: i32) {
    let magnitude = tenths.unsigned_abs();
    let _ = write!(
        out,
        "{}{}.{}",
        if tenths < 0 { "-" } else { "" },
        magnitude / 10,
        magnitude % 10
    );
}

/// Sixteen-point compass name for a wind bearing.
pub fn compass(deg: u32) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    // 22.5 degree sectors centered on the points
    POINTS[((((deg % 360) * 10 + 112) / 225) % 16) as usize]
}
