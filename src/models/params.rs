use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::tensor::ImageTensor;

/// A scalar request field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Renders the value as a multipart text field.
    pub fn to_form_value(&self) -> String {
        match self {
            ParamValue::Bool(true) => "True".to_string(),
            ParamValue::Bool(false) => "False".to_string(),
            ParamValue::Integer(i) => i.to_string(),
            ParamValue::Float(f) => float_repr(*f),
            ParamValue::Text(s) => s.clone(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Shortest round-trip digits, `0.0` for integral values, and exponent
/// notation (`1e+20`, `1e-05`) outside `1e-4 <= |f| < 1e16`.
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return format!("{:.1}", f);
    }

    let sci = format!("{:e}", f);
    if let Some((mantissa, exp)) = sci.split_once('e') {
        if let Ok(exp) = exp.parse::<i32>() {
            if !(-4..16).contains(&exp) {
                let sign = if exp < 0 { '-' } else { '+' };
                return format!("{}e{}{:02}", mantissa, sign, exp.abs());
            }
        }
    }

    if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_form_value())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Integer(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Raw inputs of one node execution.
///
/// Holds the named scalar fields, at most one image and an optional
/// per-call key override. The override is never sent as a form field.
#[derive(Debug, Clone, Default)]
pub struct RequestParameters {
    fields: BTreeMap<String, ParamValue>,
    image: Option<ImageTensor>,
    api_key_override: Option<String>,
}

impl RequestParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Sets the image, replacing any previous one.
    pub fn with_image(mut self, image: ImageTensor) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_api_key_override(mut self, key: impl Into<String>) -> Self {
        self.api_key_override = Some(key.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, ParamValue> {
        &self.fields
    }

    pub fn image(&self) -> Option<&ImageTensor> {
        self.image.as_ref()
    }

    pub fn api_key_override(&self) -> Option<&str> {
        self.api_key_override.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpscaleStyle {
    #[default]
    Default,
    Portrait,
    Anime,
}

impl UpscaleStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpscaleStyle::Default => "default",
            UpscaleStyle::Portrait => "portrait",
            UpscaleStyle::Anime => "anime",
        }
    }
}

/// Upscale factor offered by the upscaler node: an even number from 2 to 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleFactor(u8);

impl ScaleFactor {
    pub const ALLOWED: [u8; 8] = [2, 4, 6, 8, 10, 12, 14, 16];

    pub fn new(factor: u8) -> Option<Self> {
        Self::ALLOWED.contains(&factor).then_some(ScaleFactor(factor))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        ScaleFactor(2)
    }
}

/// Typed inputs of the upscaler node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpscaleOptions {
    pub prompt: Option<String>,
    pub creativity: f64,
    pub resemblance: f64,
    pub dynamic: f64,
    pub fractality: f64,
    pub style: UpscaleStyle,
    pub scale_factor: ScaleFactor,
    #[serde(skip_serializing)]
    pub api_key_override: Option<String>,
}

impl UpscaleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_style(mut self, style: UpscaleStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_scale_factor(mut self, factor: ScaleFactor) -> Self {
        self.scale_factor = factor;
        self
    }

    pub fn with_creativity(mut self, value: f64) -> Self {
        self.creativity = value;
        self
    }

    pub fn with_resemblance(mut self, value: f64) -> Self {
        self.resemblance = value;
        self
    }

    pub fn with_dynamic(mut self, value: f64) -> Self {
        self.dynamic = value;
        self
    }

    pub fn with_fractality(mut self, value: f64) -> Self {
        self.fractality = value;
        self
    }

    pub fn with_api_key_override(mut self, key: impl Into<String>) -> Self {
        self.api_key_override = Some(key.into());
        self
    }

    pub fn into_parameters(self, image: ImageTensor) -> RequestParameters {
        let mut params = RequestParameters::new()
            .with_image(image)
            .with("creativity", self.creativity)
            .with("resemblance", self.resemblance)
            .with("dynamic", self.dynamic)
            .with("fractality", self.fractality)
            .with("style", self.style.as_str())
            .with("scale_factor", self.scale_factor.get().to_string());

        if let Some(prompt) = self.prompt {
            params.set("prompt", prompt);
        }
        if let Some(key) = self.api_key_override {
            params = params.with_api_key_override(key);
        }
        params
    }
}
