//! Versioned model persistence
//!
//! A fitted model is stored as a JSON envelope
//! `{"format_version": N, "model": {...}}` so it can be served repeatedly
//! without refitting. Envelopes with any other version are rejected, as are
//! models whose parameters do not match their trend and regressor layout.

use crate::error::{ForecastError, Result};
use crate::models::FittedModel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

/// Version written by this build
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    model: &'a FittedModel,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    model: Value,
}

/// Serialize a fitted model
pub fn to_bytes(model: &FittedModel) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&EnvelopeRef {
        format_version: MODEL_FORMAT_VERSION,
        model,
    })?)
}

/// Restore a fitted model
pub fn from_bytes(bytes: &[u8]) -> Result<FittedModel> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if envelope.format_version != MODEL_FORMAT_VERSION {
        return Err(ForecastError::DataError(format!(
            "Unsupported model format version {} (expected {})",
            envelope.format_version, MODEL_FORMAT_VERSION
        )));
    }
    let model: FittedModel = serde_json::from_value(envelope.model)?;
    model.validate()?;
    Ok(model)
}

/// Write a fitted model to `path`
pub fn save<P: AsRef<Path>>(model: &FittedModel, path: P) -> Result<()> {
    let bytes = to_bytes(model)?;
    fs::write(path.as_ref(), &bytes)?;
    info!(path = %path.as_ref().display(), bytes = bytes.len(), "saved model");
    Ok(())
}

/// Read a fitted model from `path`
pub fn load<P: AsRef<Path>>(path: P) -> Result<FittedModel> {
    let bytes = fs::read(path.as_ref())?;
    let model = from_bytes(&bytes)?;
    info!(path = %path.as_ref().display(), "loaded model");
    Ok(model)
}
