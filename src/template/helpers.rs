//! Built-in template helpers

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderErrorReason,
};

/// Register the helpers every renderer ships with
pub fn register_builtin_helpers(handlebars: &mut Handlebars) {
    handlebars.register_helper("base64", Box::new(base64_helper));
}

/// URL-safe base64 of the stringified argument: {{base64 id}}
fn base64_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("base64", 0))?;

    let raw = match param.value() {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };

    out.write(&URL_SAFE.encode(raw.as_bytes()))?;
    Ok(())
}
