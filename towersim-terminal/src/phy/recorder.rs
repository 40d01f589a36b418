//! Delimited measurement export.
//!
//! Each signal observation and predicted position can be appended to a
//! delimited text stream for offline analysis. Records are one line each;
//! optional fields are left empty rather than invented.

use std::io::Write;

use towersim_common::{Error, SimTime, TerminalId, TowerId};

/// One signal-strength observation row.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub time: SimTime,
    pub terminal: TerminalId,
    pub tower: TowerId,
    pub rssi: f64,
    /// Predicted terminal-to-tower distance, when prediction succeeded.
    pub distance: Option<f64>,
    pub tower_load: u32,
}

/// One predicted-position row.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub time: SimTime,
    pub terminal: TerminalId,
    pub tower: TowerId,
    pub rssi: f64,
    pub x: f64,
    pub y: f64,
}

/// Sink for measurement rows.
pub trait MeasurementSink {
    fn record_observation(&mut self, record: &ObservationRecord) -> Result<(), Error>;
    fn record_position(&mut self, record: &PositionRecord) -> Result<(), Error>;
}

/// Comma-delimited writer over any [`Write`] stream.
#[derive(Debug)]
pub struct DelimitedRecorder<W: Write> {
    writer: W,
}

impl<W: Write> DelimitedRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> Result<W, Error> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> MeasurementSink for DelimitedRecorder<W> {
    fn record_observation(&mut self, record: &ObservationRecord) -> Result<(), Error> {
        let distance = record
            .distance
            .map(|d| format!("{d:.3}"))
            .unwrap_or_default();
        writeln!(
            self.writer,
            "{},{},{},{:.3},{},{}",
            record.time.as_millis(),
            record.terminal.value(),
            record.tower.value(),
            record.rssi,
            distance,
            record.tower_load,
        )?;
        Ok(())
    }

    fn record_position(&mut self, record: &PositionRecord) -> Result<(), Error> {
        writeln!(
            self.writer,
            "{},{},{},{:.3},{:.3},{:.3}",
            record.time.as_millis(),
            record.terminal.value(),
            record.tower.value(),
            record.rssi,
            record.x,
            record.y,
        )?;
        Ok(())
    }
}
