use crate::prelude::{CaptureError, CaptureResult, Sample};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Per-pulse metadata recorded next to each sample block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseRecord {
    pub timestamp: f64,
    pub azimuth_deg: f32,
    pub elevation_deg: f32,
}

impl PulseRecord {
    pub fn new(timestamp: f64, azimuth_deg: f32, elevation_deg: f32) -> Self {
        Self {
            timestamp,
            azimuth_deg,
            elevation_deg,
        }
    }
}

/// Fixed-capacity pulse store, filled exactly once per index in order.
#[derive(Debug, Clone)]
pub struct PulseCaptureBuffer {
    records: Vec<PulseRecord>,
    samples: Array2<Sample>,
    filled: usize,
}

impl PulseCaptureBuffer {
    /// Reserves zeroed storage for `capacity` pulses of `range_gate_count` gates.
    pub fn allocate(capacity: usize, range_gate_count: usize) -> CaptureResult<Self> {
        if capacity == 0 {
            return Err(CaptureError::InvalidConfig(
                "pulse buffer needs at least one pulse".into(),
            ));
        }
        if range_gate_count == 0 {
            return Err(CaptureError::InvalidConfig(
                "pulse buffer needs at least one range gate".into(),
            ));
        }
        Ok(Self {
            records: vec![PulseRecord::default(); capacity],
            samples: Array2::from_elem((capacity, range_gate_count), Sample::default()),
            filled: 0,
        })
    }

    pub fn append(
        &mut self,
        index: usize,
        record: PulseRecord,
        samples: &[Sample],
    ) -> CaptureResult<()> {
        if index >= self.capacity() {
            return Err(CaptureError::ContractViolation(format!(
                "pulse {} is beyond capacity {}",
                index,
                self.capacity()
            )));
        }
        if index != self.filled {
            return Err(CaptureError::ContractViolation(format!(
                "pulse {} appended out of order, expected {}",
                index, self.filled
            )));
        }
        if samples.len() != self.range_gate_count() {
            return Err(CaptureError::ContractViolation(format!(
                "pulse {} carries {} gates, expected {}",
                index,
                samples.len(),
                self.range_gate_count()
            )));
        }

        self.records[index] = record;
        self.samples
            .row_mut(index)
            .iter_mut()
            .zip(samples)
            .for_each(|(slot, sample)| *slot = *sample);
        self.filled += 1;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn range_gate_count(&self) -> usize {
        self.samples.ncols()
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.capacity()
    }

    /// Records of the filled pulses, in capture order.
    pub fn records(&self) -> &[PulseRecord] {
        &self.records[..self.filled]
    }

    pub fn samples(&self) -> ArrayView2<'_, Sample> {
        self.samples.view()
    }

    pub fn pulse(&self, index: usize) -> Option<(PulseRecord, ArrayView1<'_, Sample>)> {
        if index < self.filled {
            Some((self.records[index], self.samples.row(index)))
        } else {
            None
        }
    }

    /// Mean sample power of every filled pulse.
    pub fn mean_power(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        let filled = self.samples.slice(ndarray::s![..self.filled, ..]);
        filled.iter().map(Sample::power).sum::<f32>() / filled.len() as f32
    }
}
