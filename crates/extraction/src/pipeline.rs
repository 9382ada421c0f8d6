//! Per-parameter processing and the run as a whole.

use std::fs;
use std::path::{Path, PathBuf};

use renderer::{encode, pack_rgb, OutputFormat};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bands::{resolve_bands, BandResolution};
use crate::bounds::GeoBounds;
use crate::config::{ExtractionConfig, ParameterConfig, RunOptions};
use crate::convert::{vector_magnitude, Conversions};
use crate::error::{ExtractionError, Result};
use crate::normalize::{describe_ranges, normalize, NormalizedBand};
use crate::source::{open_source, RasterSource};

/// Wind components for the derived speed channel are always these bands.
const U_BAND: i64 = 1;
const V_BAND: i64 = 2;

/// What happened to one configured parameter.
#[derive(Debug)]
pub enum ParameterOutcome {
    /// Image written to this path.
    Written(PathBuf),
    /// Band resolution failed; nothing was written.
    Skipped(ExtractionError),
}

/// Result of a complete run.
#[derive(Debug)]
pub struct RunSummary {
    pub written: Vec<PathBuf>,
    /// Skipped parameters and why.
    pub skipped: Vec<(String, ExtractionError)>,
    pub bounds_path: PathBuf,
}

/// Open the input, process every configured parameter and write the bounds.
///
/// Source and config failures abort before any output is produced. Band
/// resolution failures skip only their parameter; any other failure aborts
/// the run without writing bounds.
pub fn run(options: &RunOptions) -> Result<RunSummary> {
    let dataset = open_source(&options.input)?;
    let config = ExtractionConfig::load(&options.config_path)?;

    let pipeline = ParameterPipeline::new(&dataset, options)?;
    let summary = pipeline.run(&config)?;

    info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        bounds = %summary.bounds_path.display(),
        "Run complete"
    );
    Ok(summary)
}

/// Turns parameter configs into images for one raster source.
pub struct ParameterPipeline<'a, S: RasterSource + ?Sized> {
    source: &'a S,
    output_dir: PathBuf,
    suffix: String,
    format: OutputFormat,
    add_exif: bool,
}

impl<'a, S: RasterSource + ?Sized> ParameterPipeline<'a, S> {
    /// Outputs go to the directory holding `options.input`.
    pub fn new(source: &'a S, options: &RunOptions) -> Result<Self> {
        let output_dir = input_directory(&options.input)?;
        Ok(Self::with_output_dir(source, options, output_dir))
    }

    pub fn with_output_dir(source: &'a S, options: &RunOptions, output_dir: PathBuf) -> Self {
        Self {
            source,
            output_dir,
            suffix: options.suffix.clone(),
            format: options.format,
            add_exif: options.add_exif,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<name>/<name>_<suffix>.<ext>`
    pub fn image_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name).join(format!(
            "{}_{}.{}",
            name,
            self.suffix,
            self.format.extension()
        ))
    }

    /// Process every parameter in config order, then write the bounds file.
    pub fn run(&self, config: &ExtractionConfig) -> Result<RunSummary> {
        let mut written = Vec::new();
        let mut skipped = Vec::new();

        for (name, entry) in config.iter() {
            match self.process_parameter(name, entry)? {
                ParameterOutcome::Written(path) => written.push(path),
                ParameterOutcome::Skipped(err) => skipped.push((name.to_string(), err)),
            }
        }

        let bounds = GeoBounds::from_geo_transform(
            &self.source.geo_transform(),
            self.source.width(),
            self.source.height(),
        );
        let bounds_path = bounds.write(&self.output_dir, &self.suffix)?;
        debug!(path = %bounds_path.display(), ?bounds, "Wrote bounds");

        Ok(RunSummary {
            written,
            skipped,
            bounds_path,
        })
    }

    /// Produce the image for one parameter.
    ///
    /// The parameter's directory is created before its config is read, so a
    /// skipped parameter still leaves an empty directory behind.
    pub fn process_parameter(&self, name: &str, entry: &Value) -> Result<ParameterOutcome> {
        let dir = self.output_dir.join(name);
        fs::create_dir_all(&dir).map_err(|source| ExtractionError::Io {
            path: dir.clone(),
            source,
        })?;

        let config = ParameterConfig::from_value(name, entry)?;

        let bands = match resolve_bands(self.source, config.band_specs()) {
            BandResolution::Proceed(bands) => bands,
            BandResolution::Skip(err) => {
                warn!(parameter = %name, error = %err, "Skipping parameter");
                return Ok(ParameterOutcome::Skipped(err));
            }
        };

        let channels = self.build_channels(&config, &bands)?;
        if channels.is_empty() {
            return Err(ExtractionError::NoChannels {
                parameter: name.to_string(),
            });
        }

        let path = self.image_path(name);
        let encoded = self.encode_channels(&channels)?;
        fs::write(&path, encoded).map_err(|source| ExtractionError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(
            parameter = %name,
            ?bands,
            channels = channels.len(),
            path = %path.display(),
            "Wrote parameter image"
        );
        Ok(ParameterOutcome::Written(path))
    }

    /// Read, convert and normalize each band, then the optional speed band.
    fn build_channels(&self, config: &ParameterConfig, bands: &[i64]) -> Result<Vec<NormalizedBand>> {
        let conversions = Conversions::from_config(config);
        let mut channels = Vec::with_capacity(bands.len() + 1);

        for &band in bands {
            let mut values = self.source.read_band(band)?;
            conversions.apply(&mut values);
            channels.push(normalize(&values));
        }

        if config.calculate_speed {
            let u = self.source.read_band(U_BAND)?;
            let v = self.source.read_band(V_BAND)?;
            let mut speed = vector_magnitude(&u, &v);
            conversions.apply_speed(&mut speed);
            channels.push(normalize(&speed));
        }

        Ok(channels)
    }

    fn encode_channels(&self, channels: &[NormalizedBand]) -> Result<Vec<u8>> {
        let planes: Vec<&[u8]> = channels.iter().map(|c| c.values.as_slice()).collect();
        let image = pack_rgb(&planes, self.source.width() as u32, self.source.height() as u32)?;

        // Ranges of every channel, including any beyond the third
        let description = self.add_exif.then(|| describe_ranges(channels));
        Ok(encode(&image, self.format, description.as_deref())?)
    }
}

/// Absolute directory containing `input`.
fn input_directory(input: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(input).map_err(|source| ExtractionError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    Ok(absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grib2_parser::{GeoTransform, Grib2Error};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// In-memory raster of a few bands on a tiny grid.
    struct MemorySource {
        width: usize,
        height: usize,
        bands: Vec<(BTreeMap<String, String>, Vec<f64>)>,
    }

    impl MemorySource {
        fn new(width: usize, height: usize) -> Self {
            Self {
                width,
                height,
                bands: Vec::new(),
            }
        }

        fn with_band(mut self, element: &str, values: Vec<f64>) -> Self {
            let mut metadata = BTreeMap::new();
            metadata.insert("GRIB_ELEMENT".to_string(), element.to_string());
            self.bands.push((metadata, values));
            self
        }
    }

    impl RasterSource for MemorySource {
        fn width(&self) -> usize {
            self.width
        }

        fn height(&self) -> usize {
            self.height
        }

        fn geo_transform(&self) -> GeoTransform {
            [100.0, 0.1, 0.0, 200.0, 0.0, -0.1]
        }

        fn band_count(&self) -> usize {
            self.bands.len()
        }

        fn band_metadata(&self, index: usize) -> Option<&BTreeMap<String, String>> {
            index
                .checked_sub(1)
                .and_then(|i| self.bands.get(i))
                .map(|(metadata, _)| metadata)
        }

        fn read_band(&self, index: i64) -> Result<Vec<f64>> {
            usize::try_from(index)
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| self.bands.get(i))
                .map(|(_, values)| values.clone())
                .ok_or(ExtractionError::BandRead {
                    band: index,
                    source: Grib2Error::BandOutOfRange {
                        index,
                        count: self.bands.len(),
                    },
                })
        }
    }

    fn pipeline<'a>(
        source: &'a MemorySource,
        dir: &TempDir,
        format: OutputFormat,
        add_exif: bool,
    ) -> ParameterPipeline<'a, MemorySource> {
        let options = RunOptions::new(dir.path().join("input.grib2"), "t0", "config.json")
            .with_format(format)
            .with_exif(add_exif);
        ParameterPipeline::new(source, &options).unwrap()
    }

    fn decode(path: &Path) -> image::RgbImage {
        image::open(path).unwrap().to_rgb8()
    }

    #[test]
    fn test_image_path() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(1, 1);
        let pipeline = pipeline(&source, &dir, OutputFormat::Png, false);

        assert_eq!(pipeline.output_dir(), dir.path());
        assert_eq!(
            pipeline.image_path("temp"),
            dir.path().join("temp").join("temp_t0.png")
        );
    }

    #[test]
    fn test_single_band_png() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(2, 2).with_band("PRES", vec![0.0, 10.0, 20.0, 30.0]);
        let pipeline = pipeline(&source, &dir, OutputFormat::Png, true);

        let outcome = pipeline.process_parameter("pres", &json!({"band": 1})).unwrap();
        let path = match outcome {
            ParameterOutcome::Written(path) => path,
            ParameterOutcome::Skipped(err) => panic!("skipped: {}", err),
        };

        let image = decode(&path);
        let red: Vec<u8> = image.pixels().map(|p| p.0[0]).collect();
        assert_eq!(red, vec![0, 85, 170, 255]);
        assert!(image.pixels().all(|p| p.0[1] == 0 && p.0[2] == 0));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(
            renderer::read_description(&bytes).as_deref(),
            Some("0.0,30.0;")
        );
    }

    #[test]
    fn test_speed_only_parameter() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(1, 1)
            .with_band("UGRD", vec![3.0])
            .with_band("VGRD", vec![4.0]);
        let pipeline = pipeline(&source, &dir, OutputFormat::Png, true);

        let outcome = pipeline
            .process_parameter("speed", &json!({"band": [], "calculate_speed": true}))
            .unwrap();
        let ParameterOutcome::Written(path) = outcome else {
            panic!("expected an image");
        };

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(renderer::read_description(&bytes).as_deref(), Some("5.0,5.0;"));
    }

    #[test]
    fn test_wind_with_speed_and_mph() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(2, 1)
            .with_band("UGRD", vec![0.0, 3.0])
            .with_band("VGRD", vec![0.0, 4.0]);
        let pipeline = pipeline(&source, &dir, OutputFormat::Png, true);

        let entry = json!({
            "band": ["GRIB_ELEMENT=UGRD", "GRIB_ELEMENT=VGRD"],
            "calculate_speed": true,
            "to_mph": true,
            "to_kph": true
        });
        let ParameterOutcome::Written(path) = pipeline.process_parameter("wind", &entry).unwrap()
        else {
            panic!("expected an image");
        };

        let image = decode(&path);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 255, 255]);

        let description = renderer::read_description(&std::fs::read(&path).unwrap()).unwrap();
        let expected = format!(
            "0.0,{:?};0.0,{:?};0.0,{:?};",
            3.0 * 2.23694,
            4.0 * 2.23694,
            5.0 * 2.23694
        );
        assert_eq!(description, expected);
    }

    #[test]
    fn test_fourth_channel_dropped_but_described() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(2, 1)
            .with_band("A", vec![0.0, 1.0])
            .with_band("B", vec![1.0, 0.0])
            .with_band("C", vec![0.0, 2.0]);
        let pipeline = pipeline(&source, &dir, OutputFormat::Png, true);

        let entry = json!({"band": [1, 2, 3], "calculate_speed": true});
        let ParameterOutcome::Written(path) = pipeline.process_parameter("many", &entry).unwrap()
        else {
            panic!("expected an image");
        };

        let image = decode(&path);
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 0, 255]);

        let description = renderer::read_description(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(description.matches(';').count(), 4);
    }

    #[test]
    fn test_unresolved_band_skips_after_creating_dir() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(1, 1).with_band("TMP", vec![1.0]);
        let pipeline = pipeline(&source, &dir, OutputFormat::Jpeg, true);

        let outcome = pipeline
            .process_parameter("gust", &json!({"band": "GRIB_ELEMENT=GUST"}))
            .unwrap();

        assert!(matches!(
            outcome,
            ParameterOutcome::Skipped(ExtractionError::BandNotFound(_))
        ));
        assert!(dir.path().join("gust").is_dir());
        assert!(!pipeline.image_path("gust").exists());
    }

    #[test]
    fn test_out_of_range_index_is_fatal() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(1, 1).with_band("TMP", vec![1.0]);
        let pipeline = pipeline(&source, &dir, OutputFormat::Jpeg, false);

        let result = pipeline.process_parameter("bad", &json!({"band": 5}));
        assert!(matches!(
            result,
            Err(ExtractionError::BandRead { band: 5, .. })
        ));
    }

    #[test]
    fn test_empty_band_list_is_fatal() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(1, 1).with_band("TMP", vec![1.0]);
        let pipeline = pipeline(&source, &dir, OutputFormat::Jpeg, false);

        let result = pipeline.process_parameter("nothing", &json!({"band": []}));
        assert!(matches!(result, Err(ExtractionError::NoChannels { .. })));
    }

    #[test]
    fn test_run_writes_bounds_when_everything_skips() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(10, 10).with_band("TMP", vec![0.0; 100]);
        let pipeline = pipeline(&source, &dir, OutputFormat::Jpeg, false);

        let config =
            ExtractionConfig::from_json(r#"{"a": {"band": "GRIB_ELEMENT=X"}, "b": {"band": true}}"#)
                .unwrap();
        let summary = pipeline.run(&config).unwrap();

        assert!(summary.written.is_empty());
        assert_eq!(summary.skipped.len(), 2);
        assert_eq!(summary.skipped[0].0, "a");
        assert!(matches!(
            summary.skipped[1].1,
            ExtractionError::InvalidBandSpec(_)
        ));
        assert_eq!(
            std::fs::read_to_string(&summary.bounds_path).unwrap(),
            "minx: 100.0\nmaxx: 101.0\nminy: 199.0\nmaxy: 200.0\n"
        );
    }

    #[test]
    fn test_input_directory() {
        let dir = input_directory(Path::new("/data/gfs/input.grib2")).unwrap();
        assert_eq!(dir, PathBuf::from("/data/gfs"));

        let dir = input_directory(Path::new("input.grib2")).unwrap();
        assert!(dir.is_absolute());
    }
}
