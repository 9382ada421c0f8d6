//! Message-level parsing of synthetic GRIB2 data.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use grib2_parser::{Grib2Reader, Grib2Tables};
use test_utils::{assert_approx_eq, concat_messages, multi_field_message, Grib2Builder};

fn reader(data: Vec<u8>) -> Grib2Reader {
    Grib2Reader::new(Bytes::from(data), Arc::new(Grib2Tables::standard()))
}

#[test]
fn test_parse_gfs_like_message() {
    let data = Grib2Builder::new_gfs()
        .with_reference_time(2024, 6, 1, 18)
        .with_forecast_hour(6)
        .build();

    let mut reader = reader(data);
    let msg = reader.next_message().unwrap().expect("one message");

    assert_eq!(msg.indicator.edition, 2);
    assert_eq!(msg.indicator.discipline, 0);
    assert_eq!(msg.identification.center, 7);
    assert_eq!(
        msg.identification.reference_time,
        Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
    );

    assert_eq!(msg.parameter(), "TMP");
    assert_eq!(msg.level(), "2 m above ground");
    assert_eq!(msg.product_definition.forecast_seconds(), 6 * 3600);
    assert_eq!(msg.grid_dims(), (10, 10));

    assert!(reader.next_message().unwrap().is_none());
}

#[test]
fn test_grid_geometry() {
    let data = Grib2Builder::new_gfs()
        .with_grid(4, 3)
        .with_origin(40_000_000, 250_000_000, 500_000, 250_000)
        .build();
    let msg = reader(data).next_message().unwrap().unwrap();
    let grid = &msg.grid_definition;

    assert!(grid.is_lat_lon());
    assert_eq!(grid.first_latitude(), 40.0);
    assert_eq!(grid.last_latitude(), 39.5);
    assert_eq!(grid.first_longitude(), -110.0);
    assert_eq!(grid.longitude_step(), 0.5);
    assert_eq!(grid.latitude_step(), 0.25);
    assert!(!grid.rows_south_to_north());
    assert_eq!(grid.earth_radius(), Some(6_371_229.0));
}

#[test]
fn test_negative_coordinates() {
    let data = Grib2Builder::new_gfs()
        .with_grid(2, 2)
        .with_origin(-10_000_000, -20_000_000, 1_000_000, 1_000_000)
        .build();
    let msg = reader(data).next_message().unwrap().unwrap();

    assert_eq!(msg.grid_definition.first_latitude(), -10.0);
    assert_eq!(msg.grid_definition.last_latitude(), -11.0);
    assert_eq!(msg.grid_definition.first_longitude(), -20.0);
}

#[test]
fn test_unpack_gradient() {
    let data = Grib2Builder::new_gfs()
        .with_grid(5, 2)
        .with_gradient(250.0, 300.0)
        .build();
    let msg = reader(data).next_message().unwrap().unwrap();
    let values = msg.unpack_data().unwrap();

    assert_eq!(values.len(), 10);
    for (i, v) in values.iter().enumerate() {
        assert_approx_eq!(*v, 250.0 + 5.0 * i as f32, 0.001);
    }
}

#[test]
fn test_unpack_with_bitmap() {
    let data = Grib2Builder::new_gfs()
        .with_grid(3, 1)
        .with_data(vec![1.0, 2.0, 3.0])
        .with_missing(&[1])
        .build();
    let msg = reader(data).next_message().unwrap().unwrap();

    assert!(msg.bitmap.is_some());
    let values = msg.unpack_data().unwrap();
    assert_approx_eq!(values[0], 1.0, 1e-6);
    assert!(values[1].is_nan());
    assert_approx_eq!(values[2], 3.0, 1e-6);
}

#[test]
fn test_multiple_messages() {
    let base = Grib2Builder::new_gfs().with_grid(2, 2);
    let data = concat_messages(&[
        base.clone().with_parameter(2, 2),
        base.clone().with_parameter(2, 3),
        base.with_parameter(3, 0).with_level(1, 0),
    ]);

    let mut reader = reader(data);
    let mut names = Vec::new();
    while let Some(msg) = reader.next_message().unwrap() {
        names.push(msg.parameter().to_string());
    }
    assert_eq!(names, vec!["UGRD", "VGRD", "PRES"]);
}

#[test]
fn test_repeated_fields_in_one_message() {
    let base = Grib2Builder::new_gfs().with_grid(2, 2).with_level(103, 10);
    let data = multi_field_message(&[
        base.clone().with_parameter(2, 2).with_constant_value(-3.0),
        base.with_parameter(2, 3).with_gradient(0.0, 6.0),
    ]);
    let total = data.len();

    let mut reader = reader(data);
    let u = reader.next_message().unwrap().unwrap();
    let v = reader.next_message().unwrap().unwrap();
    assert!(reader.next_message().unwrap().is_none());

    assert_eq!((u.parameter(), u.field), ("UGRD", 0));
    assert_eq!((v.parameter(), v.field), ("VGRD", 1));
    assert_eq!(v.level(), u.level());
    assert_eq!(v.raw.len(), total);
    assert_eq!(u.unpack_data().unwrap(), vec![-3.0; 4]);

    let values = v.unpack_data().unwrap();
    assert_approx_eq!(values[0], 0.0, 1e-3);
    assert_approx_eq!(values[3], 4.5, 1e-3);
}

#[test]
fn test_leading_garbage_is_skipped() {
    let mut data = b"junk before the first message".to_vec();
    data.extend(Grib2Builder::new_gfs().build());

    let msg = reader(data).next_message().unwrap().unwrap();
    assert_eq!(msg.parameter(), "TMP");
}

#[test]
fn test_unknown_parameter_name() {
    let data = Grib2Builder::new_gfs().with_parameter(250, 1).build();
    let msg = reader(data).next_message().unwrap().unwrap();
    assert_eq!(msg.parameter(), "P0_250_1");
}
