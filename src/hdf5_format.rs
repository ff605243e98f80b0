//! HDF5 storage for acceleration batches
//!
//! Layout:
//! - `metadata` group with attributes `start_time`, `sample_rate_hz`,
//!   `full_scale_g`, `bit_depth`, `units`, `version`
//! - `acceleration` group with resizable, chunked, compressed 1-D datasets
//!   `timestamps` (f64 seconds since start) and `accel_x/y/z` (f32)

use std::path::Path;

use chrono::{DateTime, Local};
use hdf5::types::VarLenUnicode;
use hdf5::{Dataset, File, Group};

use crate::batcher::Batch;
use crate::config::{BitDepth, Configuration};
use crate::decoder::{Sample, Units};
use crate::error::{Mma8451Error, Result};

const FORMAT_VERSION: &str = "1.0";
const CHUNK_SIZE: usize = 1024;

fn storage(context: impl std::fmt::Display) -> impl FnOnce(hdf5::Error) -> Mma8451Error {
    move |e| Mma8451Error::Storage(format!("{}: {}", context, e))
}

fn unicode(value: &str) -> Result<VarLenUnicode> {
    value
        .parse()
        .map_err(|e| Mma8451Error::Storage(format!("Invalid attribute text {:?}: {:?}", value, e)))
}

/// Metadata stored with every file
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// RFC 3339 wall-clock time of acquisition start
    pub start_time: String,
    pub sample_rate_hz: f64,
    pub full_scale_g: u8,
    pub bit_depth: u8,
    pub units: String,
    pub version: String,
}

impl Metadata {
    pub fn new(config: &Configuration, units: Units, started_at: DateTime<Local>) -> Self {
        Self {
            start_time: started_at.to_rfc3339(),
            sample_rate_hz: config.data_rate().hz(),
            full_scale_g: config.full_scale().g(),
            bit_depth: match config.bit_depth() {
                BitDepth::Bits14 => 14,
                BitDepth::Bits8 => 8,
            },
            units: units.label().to_string(),
            version: FORMAT_VERSION.to_string(),
        }
    }
}

struct DatasetHandles {
    timestamps: Dataset,
    accel_x: Dataset,
    accel_y: Dataset,
    accel_z: Dataset,
}

impl DatasetHandles {
    fn open(group: &Group) -> Result<Self> {
        let open = |name: &str| {
            group
                .dataset(name)
                .map_err(storage(format!("Failed to open {} dataset", name)))
        };
        Ok(Self {
            timestamps: open("timestamps")?,
            accel_x: open("accel_x")?,
            accel_y: open("accel_y")?,
            accel_z: open("accel_z")?,
        })
    }
}

/// Appends batches to an HDF5 file
pub struct Hdf5Writer {
    file: File,
    datasets: DatasetHandles,
    sample_count: usize,
}

impl Hdf5Writer {
    /// Create (truncate) `path` and write its metadata
    pub fn create<P: AsRef<Path>>(path: P, metadata: &Metadata) -> Result<Self> {
        let file = File::create(path).map_err(storage("Failed to create HDF5 file"))?;

        let meta = file
            .create_group("metadata")
            .map_err(storage("Failed to create metadata group"))?;
        Self::write_text(&meta, "start_time", &metadata.start_time)?;
        meta.new_attr::<f64>()
            .create("sample_rate_hz")
            .and_then(|attr| attr.write_scalar(&metadata.sample_rate_hz))
            .map_err(storage("Failed to write sample_rate_hz"))?;
        meta.new_attr::<u8>()
            .create("full_scale_g")
            .and_then(|attr| attr.write_scalar(&metadata.full_scale_g))
            .map_err(storage("Failed to write full_scale_g"))?;
        meta.new_attr::<u8>()
            .create("bit_depth")
            .and_then(|attr| attr.write_scalar(&metadata.bit_depth))
            .map_err(storage("Failed to write bit_depth"))?;
        Self::write_text(&meta, "units", &metadata.units)?;
        Self::write_text(&meta, "version", &metadata.version)?;

        let data = file
            .create_group("acceleration")
            .map_err(storage("Failed to create acceleration group"))?;
        let datasets = DatasetHandles {
            timestamps: Self::create_dataset::<f64>(&data, "timestamps")?,
            accel_x: Self::create_dataset::<f32>(&data, "accel_x")?,
            accel_y: Self::create_dataset::<f32>(&data, "accel_y")?,
            accel_z: Self::create_dataset::<f32>(&data, "accel_z")?,
        };

        Ok(Self {
            file,
            datasets,
            sample_count: 0,
        })
    }

    fn write_text(group: &Group, name: &str, value: &str) -> Result<()> {
        let value = unicode(value)?;
        group
            .new_attr::<VarLenUnicode>()
            .create(name)
            .and_then(|attr| attr.write_scalar(&value))
            .map_err(storage(format!("Failed to write {}", name)))
    }

    fn create_dataset<T: hdf5::H5Type>(group: &Group, name: &str) -> Result<Dataset> {
        group
            .new_dataset::<T>()
            .shape((0..,))
            .chunk((CHUNK_SIZE,))
            .deflate(4)
            .create(name)
            .map_err(storage(format!("Failed to create dataset {}", name)))
    }

    pub fn append_batch(&mut self, batch: &Batch) -> Result<()> {
        self.append_samples(&batch.samples)
    }

    pub fn append_samples(&mut self, samples: &[Sample]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let new_size = self.sample_count + samples.len();

        let timestamps: Vec<f64> = samples.iter().map(|s| s.timestamp).collect();
        let xs: Vec<f32> = samples.iter().map(|s| s.x).collect();
        let ys: Vec<f32> = samples.iter().map(|s| s.y).collect();
        let zs: Vec<f32> = samples.iter().map(|s| s.z).collect();

        Self::append_to(&self.datasets.timestamps, new_size, &timestamps)?;
        Self::append_to(&self.datasets.accel_x, new_size, &xs)?;
        Self::append_to(&self.datasets.accel_y, new_size, &ys)?;
        Self::append_to(&self.datasets.accel_z, new_size, &zs)?;

        self.sample_count = new_size;
        Ok(())
    }

    fn append_to<T: hdf5::H5Type>(dataset: &Dataset, new_size: usize, data: &[T]) -> Result<()> {
        dataset
            .resize((new_size,))
            .map_err(storage("Failed to resize dataset"))?;
        dataset
            .write_slice(data, (new_size - data.len())..)
            .map_err(storage("Failed to write to dataset"))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(storage("Failed to flush HDF5 file"))
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
}

/// Reads a file written by [`Hdf5Writer`]
pub struct Hdf5Reader {
    #[allow(dead_code)]
    file: File,
    datasets: DatasetHandles,
    metadata: Metadata,
}

impl Hdf5Reader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(storage("Failed to open HDF5 file"))?;
        let metadata = Self::read_metadata(&file)?;
        let data = file
            .group("acceleration")
            .map_err(storage("Failed to open acceleration group"))?;
        let datasets = DatasetHandles::open(&data)?;

        Ok(Self {
            file,
            datasets,
            metadata,
        })
    }

    fn read_metadata(file: &File) -> Result<Metadata> {
        let meta = file
            .group("metadata")
            .map_err(storage("Failed to open metadata group"))?;
        let text = |name: &str| {
            meta.attr(name)
                .and_then(|attr| attr.read_scalar::<VarLenUnicode>())
                .map(|s| s.to_string())
                .map_err(storage(format!("Failed to read {}", name)))
        };
        let byte = |name: &str| {
            meta.attr(name)
                .and_then(|attr| attr.read_scalar::<u8>())
                .map_err(storage(format!("Failed to read {}", name)))
        };

        Ok(Metadata {
            start_time: text("start_time")?,
            sample_rate_hz: meta
                .attr("sample_rate_hz")
                .and_then(|attr| attr.read_scalar::<f64>())
                .map_err(storage("Failed to read sample_rate_hz"))?,
            full_scale_g: byte("full_scale_g")?,
            bit_depth: byte("bit_depth")?,
            units: text("units")?,
            version: text("version")?,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn total_samples(&self) -> usize {
        self.datasets.timestamps.size()
    }

    /// Read up to `count` samples starting at index `start`
    pub fn read_range(&self, start: usize, count: usize) -> Result<Vec<Sample>> {
        let total = self.total_samples();
        if start >= total {
            return Ok(Vec::new());
        }
        let end = start + count.min(total - start);

        let timestamps: Vec<f64> = self
            .datasets
            .timestamps
            .read_slice_1d(start..end)
            .map_err(storage("Failed to read timestamps"))?
            .to_vec();
        let axis = |dataset: &Dataset, name: &str| -> Result<Vec<f32>> {
            Ok(dataset
                .read_slice_1d(start..end)
                .map_err(storage(format!("Failed to read {}", name)))?
                .to_vec())
        };
        let xs = axis(&self.datasets.accel_x, "accel_x")?;
        let ys = axis(&self.datasets.accel_y, "accel_y")?;
        let zs = axis(&self.datasets.accel_z, "accel_z")?;

        Ok(timestamps
            .into_iter()
            .zip(xs)
            .zip(ys)
            .zip(zs)
            .map(|(((timestamp, x), y), z)| Sample { timestamp, x, y, z })
            .collect())
    }

    /// Read the most recent `count` samples
    pub fn read_latest(&self, count: usize) -> Result<Vec<Sample>> {
        let total = self.total_samples();
        self.read_range(total.saturating_sub(count), count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FullScale, Setting};

    #[test]
    fn test_write_then_read_back() {
        let path = std::env::temp_dir().join(format!("mma8451-{}.h5", std::process::id()));

        let mut config = Configuration::default();
        config.update(Setting::FullScale(FullScale::G4));
        let metadata = Metadata::new(&config, Units::G, Local::now());

        let samples: Vec<Sample> = (0..2500)
            .map(|i| Sample {
                timestamp: i as f64 * 0.00125,
                x: i as f32,
                y: -(i as f32),
                z: 1.0,
            })
            .collect();

        {
            let mut writer = Hdf5Writer::create(&path, &metadata).unwrap();
            writer.append_samples(&samples[..1000]).unwrap();
            writer.append_samples(&samples[1000..]).unwrap();
            writer.flush().unwrap();
            assert_eq!(writer.sample_count(), 2500);
        }

        let reader = Hdf5Reader::open(&path).unwrap();
        assert_eq!(reader.metadata(), &metadata);
        assert_eq!(reader.total_samples(), 2500);
        assert_eq!(reader.read_range(995, 10).unwrap(), samples[995..1005].to_vec());
        assert_eq!(reader.read_latest(3).unwrap(), samples[2497..].to_vec());
        assert!(reader.read_range(3000, 5).unwrap().is_empty());

        let _ = std::fs::remove_file(&path);
    }
}
