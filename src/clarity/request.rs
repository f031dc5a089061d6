use std::collections::BTreeMap;
use std::fmt;

use crate::{
    config::ClarityConfig,
    error::Result,
    models::{NodeVariant, ParamValue, RequestParameters},
};

pub const IMAGE_FIELD: &str = "image";
pub const MODE_FIELD: &str = "mode";
pub const IMAGE_TO_IMAGE_MODE: &str = "image-to-image";
pub const ASPECT_RATIO_FIELD: &str = "aspect_ratio";
pub const STRENGTH_FIELD: &str = "strength";
pub const STYLE_FIELD: &str = "style";
pub const STYLE_PRESET_FIELD: &str = "style_preset";
pub const INTEGRATION_MARKER_FIELD: &str = "comfyui";

#[derive(Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    pub authorization: String,
    pub accept: &'static str,
}

impl fmt::Debug for RequestHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHeaders")
            .field("authorization", &"<redacted>")
            .field("accept", &self.accept)
            .finish()
    }
}

/// A submission ready to go on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub url: String,
    pub headers: RequestHeaders,
    /// Scalar form fields, already rendered.
    pub fields: BTreeMap<String, String>,
    /// PNG bytes sent as the `image` file part.
    pub image: Option<Vec<u8>>,
}

impl PreparedRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Applies the mode rules to the raw fields and returns the set to send.
///
/// With an image the request is image-conditioned: `mode` is forced and
/// `aspect_ratio` dropped. Without one, `strength` is dropped. `style_preset`
/// only survives when `style` is set to something other than `false`.
pub fn normalize_fields(params: &RequestParameters) -> BTreeMap<String, ParamValue> {
    let mut fields = params.fields().clone();
    fields.remove(IMAGE_FIELD);

    if params.image().is_some() {
        fields.insert(MODE_FIELD.to_string(), IMAGE_TO_IMAGE_MODE.into());
        fields.remove(ASPECT_RATIO_FIELD);
    } else {
        fields.remove(STRENGTH_FIELD);
    }

    let style_enabled = fields
        .get(STYLE_FIELD)
        .map(|style| style.as_bool() != Some(false))
        .unwrap_or(false);
    if !style_enabled {
        fields.remove(STYLE_PRESET_FIELD);
    }

    fields.insert(INTEGRATION_MARKER_FIELD.to_string(), true.into());
    fields
}

/// Builds the submission for `variant` without touching `params`.
///
/// The token is resolved first so a missing key fails before any encoding
/// or network work.
pub fn build_request(
    config: &ClarityConfig,
    variant: &NodeVariant,
    params: &RequestParameters,
) -> Result<PreparedRequest> {
    let authorization = config.resolve_token(params.api_key_override())?;

    let image = params.image().map(|image| image.encode_png()).transpose()?;

    let fields = normalize_fields(params)
        .into_iter()
        .map(|(name, value)| (name, value.to_form_value()))
        .collect();

    Ok(PreparedRequest {
        url: variant.submit_url(&config.base_url),
        headers: RequestHeaders {
            authorization,
            accept: variant.accept.mime(),
        },
        fields,
        image,
    })
}
