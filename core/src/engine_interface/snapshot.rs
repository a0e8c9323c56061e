use crate::prelude::{CaptureError, CaptureResult};

/// Per-scatterer arrays downloaded from the engine when capture ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    pub position: Vec<[f32; 4]>,
    pub velocity: Vec<[f32; 4]>,
    pub orientation: Vec<[f32; 4]>,
    pub tumble: Vec<[f32; 4]>,
    pub auxiliary: Vec<[f32; 4]>,
    pub cross_section: Vec<[f32; 4]>,
    pub signal: Vec<[f32; 4]>,
    pub random_state: Vec<[u32; 4]>,
}

impl StateSnapshot {
    /// Zeroed snapshot for `count` scatterers.
    pub fn zeroed(count: usize) -> Self {
        Self {
            position: vec![[0.0; 4]; count],
            velocity: vec![[0.0; 4]; count],
            orientation: vec![[0.0; 4]; count],
            tumble: vec![[0.0; 4]; count],
            auxiliary: vec![[0.0; 4]; count],
            cross_section: vec![[0.0; 4]; count],
            signal: vec![[0.0; 4]; count],
            random_state: vec![[0; 4]; count],
        }
    }

    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Float arrays in their on-disk order; random state follows them.
    pub fn float_arrays(&self) -> [(&'static str, &[[f32; 4]]); 7] {
        [
            ("position", self.position.as_slice()),
            ("velocity", self.velocity.as_slice()),
            ("orientation", self.orientation.as_slice()),
            ("tumble", self.tumble.as_slice()),
            ("auxiliary", self.auxiliary.as_slice()),
            ("cross_section", self.cross_section.as_slice()),
            ("signal", self.signal.as_slice()),
        ]
    }

    /// Every array must describe the same scatterer population.
    pub fn validate(&self) -> CaptureResult<()> {
        let count = self.len();
        for (name, array) in self.float_arrays() {
            if array.len() != count {
                return Err(CaptureError::ContractViolation(format!(
                    "snapshot array {} has {} entries, expected {}",
                    name,
                    array.len(),
                    count
                )));
            }
        }
        if self.random_state.len() != count {
            return Err(CaptureError::ContractViolation(format!(
                "snapshot random state has {} entries, expected {}",
                self.random_state.len(),
                count
            )));
        }
        Ok(())
    }
}
