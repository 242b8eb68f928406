//! CSV input and output
//!
//! Series files carry `date,redemption_count` rows; forecast files carry
//! `date,lower,median,upper`.

use csv::{Reader, Writer};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::types::{ForecastInterval, Observation, ObservationSeries};

/// Parse a series, sorting by date and rejecting gaps or duplicates
pub fn read_series<R: Read>(reader: R) -> Result<ObservationSeries> {
    let mut reader = Reader::from_reader(reader);
    let mut observations = Vec::new();
    for record in reader.deserialize() {
        let observation: Observation = record?;
        observations.push(observation);
    }
    ObservationSeries::new(observations)
}

pub fn load_series<P: AsRef<Path>>(path: P) -> Result<ObservationSeries> {
    let series = read_series(File::open(&path)?)?;
    debug!(
        "Loaded {} observations from {:?} ({:?} to {:?})",
        series.len(),
        path.as_ref(),
        series.first_date(),
        series.last_date()
    );
    Ok(series)
}

pub fn save_series<P: AsRef<Path>>(series: &ObservationSeries, path: P) -> Result<()> {
    let mut writer = Writer::from_writer(File::create(path)?);
    for observation in series.iter() {
        writer.serialize(observation)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_forecast<W: Write>(writer: W, intervals: &[ForecastInterval]) -> Result<()> {
    let mut writer = Writer::from_writer(writer);
    for interval in intervals {
        writer.serialize(interval)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_forecast<P: AsRef<Path>>(intervals: &[ForecastInterval], path: P) -> Result<()> {
    write_forecast(File::create(path)?, intervals)
}
