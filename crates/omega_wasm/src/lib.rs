//! Browser bindings for building Omega lenses.
//!
//! Lens documents and pipeline settings cross the boundary as plain JS
//! objects with the same field names as their Rust counterparts. A lens is
//! either optical parameters (`z0`, `z1`, `z2`, `n0`, `n1`, `t`) or the
//! coefficients of both surfaces (`sigma1`, `sigma2`, `t`).

use js_sys::{Float64Array, Uint32Array};
use omega_core::config::{LensDesign, PipelineConfig};
use omega_core::pipeline::{build_lens, LensBuild};
use omega_core::stl::write_binary_stl;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmLens {
    build: LensBuild,
    solid_name: String,
}

#[wasm_bindgen]
impl WasmLens {
    /// `config` may be `undefined` to use the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(params: JsValue, config: JsValue) -> Result<WasmLens, JsValue> {
        console_error_panic_hook::set_once();

        let design: LensDesign = from_value(params)
            .map_err(|e| JsValue::from_str(&format!("Invalid lens document: {}", e)))?;
        let config: PipelineConfig = if config.is_undefined() || config.is_null() {
            PipelineConfig::default()
        } else {
            from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid pipeline config: {}", e)))?
        };
        Self::from_parts(&design, &config)
    }

    /// Same as the constructor, from JSON documents.
    pub fn from_json(params_json: &str, config_json: &str) -> Result<WasmLens, JsValue> {
        console_error_panic_hook::set_once();

        let design = LensDesign::from_json(params_json)
            .map_err(|e| JsValue::from_str(&format!("{}", e)))?;
        let config = if config_json.trim().is_empty() {
            PipelineConfig::default()
        } else {
            PipelineConfig::from_json(config_json)
                .map_err(|e| JsValue::from_str(&format!("{}", e)))?
        };
        Self::from_parts(&design, &config)
    }

    /// Inner contour as `[z0, r0, z1, r1, ...]`.
    pub fn contour(&self) -> Float64Array {
        Float64Array::from(flat_contour(&self.build).as_slice())
    }

    pub fn vertices(&self) -> Float64Array {
        Float64Array::from(self.build.mesh.flat_vertices().as_slice())
    }

    pub fn triangles(&self) -> Uint32Array {
        Uint32Array::from(self.build.mesh.flat_triangles().as_slice())
    }

    pub fn summary(&self) -> Result<JsValue, JsValue> {
        to_value(&self.build.summary())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// ASCII STL text; an empty `name` falls back to the configured solid name.
    pub fn to_ascii_stl(&self, name: &str) -> Result<String, JsValue> {
        let name = if name.is_empty() { &self.solid_name } else { name };
        self.build
            .to_ascii_stl(name)
            .map_err(|e| JsValue::from_str(&format!("{}", e)))
    }

    pub fn to_binary_stl(&self) -> Result<Vec<u8>, JsValue> {
        binary_stl(&self.build, &self.solid_name).map_err(|e| JsValue::from_str(&format!("{}", e)))
    }
}

impl WasmLens {
    fn from_parts(design: &LensDesign, config: &PipelineConfig) -> Result<WasmLens, JsValue> {
        let build = build_lens(design, config)
            .map_err(|e| JsValue::from_str(&format!("Lens construction failed: {}", e)))?;
        Ok(WasmLens {
            build,
            solid_name: config.solid_name.clone(),
        })
    }
}

fn flat_contour(build: &LensBuild) -> Vec<f64> {
    build.lens.inner_contour().iter().flatten().copied().collect()
}

fn binary_stl(build: &LensBuild, name: &str) -> omega_core::error::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_binary_stl(&mut bytes, &build.mesh, name)?;
    Ok(bytes)
}
