//! End-to-end runs over synthetic GRIB2 files.
//!
//! Each test writes a GRIB2 file and a JSON config into a temp directory,
//! runs the extraction and decodes the images it wrote.

use extraction::{run, ExtractionError, OutputFormat, RunOptions};
use serde_json::json;
use test_utils::{
    packed_wind_message, pressure_2x2, temperature, wind_components, Grib2Builder, TestWorkspace,
};

// ============================================================================
// Helper functions
// ============================================================================

fn options(ws: &TestWorkspace, format: OutputFormat, add_exif: bool) -> RunOptions {
    RunOptions::new(ws.join("input.grib2"), "f000", ws.join("config.json"))
        .with_format(format)
        .with_exif(add_exif)
}

fn red_channel(image: &image::RgbImage) -> Vec<u8> {
    image.pixels().map(|p| p.0[0]).collect()
}

// ============================================================================
// Single band
// ============================================================================

#[test]
fn test_single_band_jpeg_without_exif() {
    let ws = TestWorkspace::new();
    ws.write_grib("input.grib2", &[pressure_2x2()]);
    ws.write_config("config.json", &json!({"pressure": {"band": 1}}));

    let summary = run(&options(&ws, OutputFormat::Jpeg, false)).unwrap();

    let expected = ws.join("pressure/pressure_f000.jpeg");
    assert_eq!(summary.written, vec![expected.clone()]);
    assert!(summary.skipped.is_empty());

    let bytes = ws.read("pressure/pressure_f000.jpeg");
    assert_eq!(renderer::read_description(&bytes), None);

    let image = image::load_from_memory(&bytes).unwrap().to_rgb8();
    assert_eq!(image.dimensions(), (2, 2));
}

#[test]
fn test_single_band_png_is_exact() {
    let ws = TestWorkspace::new();
    ws.write_grib("input.grib2", &[pressure_2x2()]);
    ws.write_config("config.json", &json!({"pressure": {"band": "GRIB_ELEMENT=PRES"}}));

    run(&options(&ws, OutputFormat::Png, true)).unwrap();

    let bytes = ws.read("pressure/pressure_f000.png");
    let image = image::load_from_memory(&bytes).unwrap().to_rgb8();
    assert_eq!(red_channel(&image), vec![0, 85, 170, 255]);
    assert!(image.pixels().all(|p| p.0[1] == 0 && p.0[2] == 0));
    assert_eq!(
        renderer::read_description(&bytes).as_deref(),
        Some("0.0,30.0;")
    );
}

#[test]
fn test_temperature_in_fahrenheit() {
    let ws = TestWorkspace::new();
    // 273.15 K and 283.15 K, i.e. 0 C and 10 C
    let tmp = Grib2Builder::new_gfs()
        .with_grid(2, 1)
        .with_data(vec![273.15, 283.15]);
    ws.write_grib("input.grib2", &[tmp]);
    ws.write_config(
        "config.json",
        &json!({"temp": {"band": "GRIB_ELEMENT=TMP", "to_fahrenheit": true}}),
    );

    run(&options(&ws, OutputFormat::Png, true)).unwrap();

    let description = renderer::read_description(&ws.read("temp/temp_f000.png")).unwrap();
    let ranges: Vec<f64> = description
        .trim_end_matches(';')
        .split(',')
        .map(|v| v.parse().unwrap())
        .collect();
    test_utils::assert_approx_eq!(ranges[0], 32.0, 0.01);
    test_utils::assert_approx_eq!(ranges[1], 50.0, 0.01);
}

// ============================================================================
// Wind
// ============================================================================

#[test]
fn test_speed_channel_from_components() {
    let ws = TestWorkspace::new();
    ws.write_grib("input.grib2", &wind_components(1, 1, 3.0, 4.0));
    ws.write_config(
        "config.json",
        &json!({"speed": {"band": [], "calculate_speed": true}}),
    );

    run(&options(&ws, OutputFormat::Png, true)).unwrap();

    let bytes = ws.read("speed/speed_f000.png");
    assert_eq!(renderer::read_description(&bytes).as_deref(), Some("5.0,5.0;"));

    // Constant speed normalizes to zero
    let image = image::load_from_memory(&bytes).unwrap().to_rgb8();
    assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
}

#[test]
fn test_wind_components_and_speed_fill_three_channels() {
    let ws = TestWorkspace::new();
    ws.write_grib("input.grib2", &wind_components(3, 2, 3.0, 4.0));
    ws.write_config(
        "config.json",
        &json!({
            "wind": {
                "band": ["GRIB_ELEMENT=UGRD", "GRIB_ELEMENT=VGRD"],
                "calculate_speed": true,
                "to_kph": true
            }
        }),
    );

    run(&options(&ws, OutputFormat::Png, true)).unwrap();

    let description = renderer::read_description(&ws.read("wind/wind_f000.png")).unwrap();
    assert_eq!(
        description,
        format!(
            "{:?},{:?};{:?},{:?};{:?},{:?};",
            3.0 * 3.6,
            3.0 * 3.6,
            4.0 * 3.6,
            4.0 * 3.6,
            5.0 * 3.6,
            5.0 * 3.6
        )
    );
}

#[test]
fn test_wind_packed_in_one_message() {
    let ws = TestWorkspace::new();
    ws.write_file("input.grib2", &packed_wind_message(2, 2, 3.0, 4.0));
    ws.write_config(
        "config.json",
        &json!({
            "v": {"band": "GRIB_ELEMENT=VGRD"},
            "speed": {"band": [], "calculate_speed": true}
        }),
    );

    let summary = run(&options(&ws, OutputFormat::Png, true)).unwrap();

    assert_eq!(summary.written.len(), 2);
    assert!(summary.skipped.is_empty());
    assert_eq!(
        renderer::read_description(&ws.read("v/v_f000.png")).as_deref(),
        Some("4.0,4.0;")
    );
    assert_eq!(
        renderer::read_description(&ws.read("speed/speed_f000.png")).as_deref(),
        Some("5.0,5.0;")
    );
}

// ============================================================================
// Skips, failures and bounds
// ============================================================================

#[test]
fn test_skipped_parameter_does_not_stop_run() {
    let ws = TestWorkspace::new();
    ws.write_grib("input.grib2", &[pressure_2x2()]);
    ws.write_config(
        "config.json",
        &json!({
            "missing": {"band": "GRIB_ELEMENT=GUST"},
            "invalid": {"band": false},
            "pressure": {"band": 1}
        }),
    );

    let summary = run(&options(&ws, OutputFormat::Jpeg, true)).unwrap();

    assert_eq!(summary.written.len(), 1);
    let skipped: Vec<&str> = summary.skipped.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(skipped, vec!["missing", "invalid"]);
    assert!(ws.exists("pressure/pressure_f000.jpeg"));
    assert!(ws.exists("missing"));
    assert!(!ws.exists("missing/missing_f000.jpeg"));
    assert!(ws.exists("bounds_f000.txt"));
}

#[test]
fn test_bounds_file() {
    let ws = TestWorkspace::new();
    // 0.25 degree grid with its first point at 45N 130W
    let grid = Grib2Builder::new_gfs()
        .with_grid(4, 2)
        .with_origin(45_000_000, 230_000_000, 250_000, 250_000)
        .with_constant_value(1.0);
    ws.write_grib("input.grib2", &[grid]);
    ws.write_config("config.json", &json!({}));

    let summary = run(&options(&ws, OutputFormat::Jpeg, true)).unwrap();

    assert_eq!(summary.bounds_path, ws.join("bounds_f000.txt"));
    assert_eq!(
        ws.read_to_string("bounds_f000.txt"),
        "minx: -130.125\nmaxx: -129.125\nminy: 44.625\nmaxy: 45.125\n"
    );
}

#[test]
fn test_missing_input_is_fatal() {
    let ws = TestWorkspace::new();
    ws.write_config("config.json", &json!({"pressure": {"band": 1}}));

    let result = run(&options(&ws, OutputFormat::Jpeg, true));

    assert!(matches!(result, Err(ExtractionError::SourceOpen { .. })));
    assert!(!ws.exists("pressure"));
    assert!(!ws.exists("bounds_f000.txt"));
}

#[test]
fn test_unreadable_config_is_fatal() {
    let ws = TestWorkspace::new();
    ws.write_grib("input.grib2", &[pressure_2x2()]);
    ws.write_file("config.json", b"{ not json");

    let result = run(&options(&ws, OutputFormat::Jpeg, true));
    assert!(matches!(result, Err(ExtractionError::ConfigRead { .. })));
}

#[test]
fn test_malformed_entry_aborts_after_earlier_outputs() {
    let ws = TestWorkspace::new();
    ws.write_grib("input.grib2", &[temperature(3, 3, 260.0, 300.0)]);
    ws.write_config(
        "config.json",
        &json!({
            "temp": {"band": 1},
            "broken": {"to_fahrenheit": true}
        }),
    );

    let result = run(&options(&ws, OutputFormat::Jpeg, true));

    assert!(matches!(result, Err(ExtractionError::InvalidConfig { .. })));
    assert!(ws.exists("temp/temp_f000.jpeg"));
    assert!(!ws.exists("bounds_f000.txt"));
}

#[test]
fn test_out_of_range_band_is_fatal() {
    let ws = TestWorkspace::new();
    ws.write_grib("input.grib2", &[pressure_2x2()]);
    ws.write_config("config.json", &json!({"pressure": {"band": 9}}));

    let result = run(&options(&ws, OutputFormat::Png, false));
    assert!(matches!(
        result,
        Err(ExtractionError::BandRead { band: 9, .. })
    ));
}

#[test]
fn test_missing_points_use_no_data_value() {
    let ws = TestWorkspace::new();
    let field = Grib2Builder::new_gfs()
        .with_parameter(3, 0)
        .with_grid(2, 2)
        .with_data(vec![0.0, 10.0, 20.0, 30.0])
        .with_missing(&[3]);
    ws.write_grib("input.grib2", &[field]);
    ws.write_config("config.json", &json!({"pressure": {"band": 1}}));

    run(&options(&ws, OutputFormat::Png, true)).unwrap();

    let bytes = ws.read("pressure/pressure_f000.png");
    assert_eq!(
        renderer::read_description(&bytes).as_deref(),
        Some("0.0,9999.0;")
    );
}
