//! Tagged schema for the fixed-size engine-state region of a state file.
//!
//! Instead of dumping engine memory, every value is written as a
//! discriminated record (`kind`, `name`, payload), so the region can be
//! validated on both encode and decode.
//!
//! Region layout (little-endian), zero-padded to [`STATE_REGION_BYTES`]:
//! - `magic[4]` = `"RSST"`
//! - `field_count: u32`
//! - `scatterer_count: u64`
//! - `field_count` entries: `kind: u8`, `name_len: u8`, `name`, payload

use crate::engine_interface::{EngineParams, SimulationEngine, StateSnapshot};
use crate::format::bytes::{ByteSink, ByteSource};
use crate::prelude::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};

/// Fixed size of the state region that follows the session header.
pub const STATE_REGION_BYTES: usize = 63 * 1024;
pub const STATE_REGION_MAGIC: [u8; 4] = *b"RSST";

const KIND_F32: u8 = 1;
const KIND_F64: u8 = 2;
const KIND_U32: u8 = 3;
const KIND_U64: u8 = 4;
const KIND_F32_ARRAY: u8 = 5;
const KIND_U32_ARRAY: u8 = 6;
const KIND_TEXT: u8 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    F32(f32),
    F64(f64),
    U32(u32),
    U64(u64),
    F32Array(Vec<f32>),
    U32Array(Vec<u32>),
    Text(String),
}

impl FieldValue {
    fn kind(&self) -> u8 {
        match self {
            FieldValue::F32(_) => KIND_F32,
            FieldValue::F64(_) => KIND_F64,
            FieldValue::U32(_) => KIND_U32,
            FieldValue::U64(_) => KIND_U64,
            FieldValue::F32Array(_) => KIND_F32_ARRAY,
            FieldValue::U32Array(_) => KIND_U32_ARRAY,
            FieldValue::Text(_) => KIND_TEXT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateField {
    pub name: String,
    pub value: FieldValue,
}

impl StateField {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Engine parameters flattened into named fields.
pub fn params_fields(params: &EngineParams) -> Vec<StateField> {
    let mut fields: Vec<StateField> = params
        .named_values()
        .iter()
        .map(|(name, value)| StateField::new(format!("params.{}", name), FieldValue::F32(*value)))
        .collect();
    fields.push(StateField::new(
        "params.range_count",
        FieldValue::U32(params.range_count),
    ));
    fields
}

pub fn encode_region(fields: &[StateField], scatterer_count: usize) -> CaptureResult<Vec<u8>> {
    let mut sink = ByteSink::with_capacity(STATE_REGION_BYTES);
    sink.put_bytes(&STATE_REGION_MAGIC);
    sink.put_u32(fields.len() as u32);
    sink.put_u64(scatterer_count as u64);

    for field in fields {
        let name = field.name.as_bytes();
        let name_len = u8::try_from(name.len()).map_err(|_| {
            CaptureError::InvalidConfig(format!("state field name '{}' is too long", field.name))
        })?;
        sink.put_u8(field.value.kind());
        sink.put_u8(name_len);
        sink.put_bytes(name);
        match &field.value {
            FieldValue::F32(v) => sink.put_f32(*v),
            FieldValue::F64(v) => sink.put_f64(*v),
            FieldValue::U32(v) => sink.put_u32(*v),
            FieldValue::U64(v) => sink.put_u64(*v),
            FieldValue::F32Array(values) => {
                sink.put_u32(values.len() as u32);
                values.iter().for_each(|v| sink.put_f32(*v));
            }
            FieldValue::U32Array(values) => {
                sink.put_u32(values.len() as u32);
                values.iter().for_each(|v| sink.put_u32(*v));
            }
            FieldValue::Text(text) => {
                sink.put_u32(text.len() as u32);
                sink.put_bytes(text.as_bytes());
            }
        }
    }

    if sink.len() > STATE_REGION_BYTES {
        return Err(CaptureError::StateTooLarge {
            size: sink.len(),
            limit: STATE_REGION_BYTES,
        });
    }
    sink.pad_to(STATE_REGION_BYTES);
    Ok(sink.into_inner())
}

/// Decodes a region back into its fields and scatterer count.
pub fn decode_region(bytes: &[u8]) -> CaptureResult<(Vec<StateField>, usize)> {
    if bytes.len() != STATE_REGION_BYTES {
        return Err(CaptureError::Format(format!(
            "state region holds {} bytes, expected {}",
            bytes.len(),
            STATE_REGION_BYTES
        )));
    }
    let mut source = ByteSource::new(bytes);
    if source.take(4)? != STATE_REGION_MAGIC {
        return Err(CaptureError::Format("bad state region magic".into()));
    }
    let field_count = source.u32()? as usize;
    let scatterer_count = usize::try_from(source.u64()?)
        .map_err(|_| CaptureError::Format("scatterer count overflows usize".into()))?;

    let mut fields = Vec::with_capacity(field_count.min(1024));
    for _ in 0..field_count {
        let kind = source.u8()?;
        let name_len = source.u8()? as usize;
        let name = std::str::from_utf8(source.take(name_len)?)
            .map_err(|_| CaptureError::Format("state field name is not utf-8".into()))?
            .to_string();
        let value = match kind {
            KIND_F32 => FieldValue::F32(source.f32()?),
            KIND_F64 => FieldValue::F64(source.f64()?),
            KIND_U32 => FieldValue::U32(source.u32()?),
            KIND_U64 => FieldValue::U64(source.u64()?),
            KIND_F32_ARRAY => {
                let len = source.u32()? as usize;
                FieldValue::F32Array((0..len).map(|_| source.f32()).collect::<CaptureResult<_>>()?)
            }
            KIND_U32_ARRAY => {
                let len = source.u32()? as usize;
                FieldValue::U32Array((0..len).map(|_| source.u32()).collect::<CaptureResult<_>>()?)
            }
            KIND_TEXT => {
                let len = source.u32()? as usize;
                let text = std::str::from_utf8(source.take(len)?)
                    .map_err(|_| CaptureError::Format(format!("field {} is not utf-8", name)))?;
                FieldValue::Text(text.to_string())
            }
            other => {
                return Err(CaptureError::Format(format!(
                    "field {} has unknown kind {}",
                    name, other
                )))
            }
        };
        fields.push(StateField { name, value });
    }
    Ok((fields, scatterer_count))
}

/// Everything a state file carries beyond its header.
#[derive(Debug, Clone, PartialEq)]
pub struct StateArchive {
    pub fields: Vec<StateField>,
    pub snapshot: StateSnapshot,
}

impl StateArchive {
    /// Downloads the full engine state; called once capture has ended.
    pub fn capture<E: SimulationEngine + ?Sized>(engine: &mut E) -> CaptureResult<Self> {
        let fields = region_fields(engine);
        let snapshot = engine.snapshot();
        snapshot.validate()?;
        Ok(Self { fields, snapshot })
    }

    pub fn encoded_region(&self) -> CaptureResult<Vec<u8>> {
        encode_region(&self.fields, self.snapshot.len())
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

/// Dry encode used at startup so an oversized state aborts before capture.
pub fn check_state_capacity<E: SimulationEngine + ?Sized>(engine: &E) -> CaptureResult<usize> {
    let fields = region_fields(engine);
    encode_region(&fields, engine.scatterer_count())?;
    Ok(fields.len())
}

fn region_fields<E: SimulationEngine + ?Sized>(engine: &E) -> Vec<StateField> {
    let mut fields = params_fields(engine.params());
    fields.push(StateField::new("random_seed", FieldValue::U32(engine.random_seed())));
    fields.push(StateField::new("sim_time", FieldValue::F64(engine.sim_time())));
    fields.push(StateField::new(
        "body_population",
        FieldValue::U32Array(engine.body_population()),
    ));
    fields.extend(
        engine
            .state_fields()
            .into_iter()
            .filter(|f| f.name != "sim_time"),
    );
    fields
}
