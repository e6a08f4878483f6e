// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! JSON loading of data environments.  Scalars are numbers or booleans
//! (booleans load as 0/1), arrays are (nested) JSON arrays with `null` as
//! the undetermined marker; nesting must be rectangular.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::common::{Error, ErrorCode, Ident, Result};
use crate::comp_err;
use crate::env::DataEntry;
use crate::value::{ArrayValue, Scalar};

fn scalar_of(v: &Json) -> Result<Scalar> {
    match v {
        Json::Bool(b) => Ok(Scalar::Int(*b as i64)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Scalar::Int(i))
            } else if let Some(x) = n.as_f64() {
                Ok(Scalar::Real(x))
            } else {
                comp_err!(Generic, format!("unrepresentable number {}", n))
            }
        }
        other => comp_err!(Generic, format!("expected a number, got {}", other)),
    }
}

fn array_of(values: &[Json]) -> Result<(Vec<usize>, Vec<Option<Scalar>>)> {
    if values.is_empty() {
        return comp_err!(ShapeMismatch, "empty data array");
    }
    if values.iter().all(|v| v.is_array()) {
        let mut shape: Option<Vec<usize>> = None;
        let mut cells = Vec::new();
        for v in values {
            let inner = match v {
                Json::Array(inner) => inner,
                _ => unreachable!(),
            };
            let (inner_shape, mut inner_cells) = array_of(inner)?;
            match &shape {
                None => shape = Some(inner_shape),
                Some(shape) if *shape == inner_shape => {}
                Some(_) => {
                    return comp_err!(ShapeMismatch, "ragged nested data array")
                }
            }
            cells.append(&mut inner_cells);
        }
        let mut shape = shape.unwrap();
        shape.insert(0, values.len());
        Ok((shape, cells))
    } else if values.iter().any(|v| v.is_array()) {
        comp_err!(ShapeMismatch, "ragged nested data array")
    } else {
        let cells: Result<Vec<Option<Scalar>>> = values
            .iter()
            .map(|v| match v {
                Json::Null => Ok(None),
                other => scalar_of(other).map(Some),
            })
            .collect();
        Ok((vec![values.len()], cells?))
    }
}

/// data_from_json parses a JSON object into a data environment mapping.
pub fn data_from_json(text: &str) -> Result<HashMap<Ident, DataEntry>> {
    let json: Json = serde_json::from_str(text)
        .map_err(|e| Error::new(ErrorCode::Generic, Some(e.to_string())))?;
    let object = match json {
        Json::Object(object) => object,
        other => return comp_err!(Generic, format!("expected a JSON object, got {}", other)),
    };

    let mut data = HashMap::new();
    for (name, value) in object {
        let entry = match &value {
            Json::Array(values) => {
                let (shape, cells) = array_of(values)?;
                DataEntry::Array(ArrayValue { shape, cells })
            }
            other => DataEntry::Scalar(scalar_of(other)?),
        };
        data.insert(name, entry);
    }
    Ok(data)
}
