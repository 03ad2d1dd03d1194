// Handlebars helpers for the values templates.  Values files are YAML, so helpers write plain
// scalars or JSON, which YAML reads as flow collections.

use handlebars::{Context, Handlebars, Helper, Output, RenderContext, RenderError};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};

mod error {
    use handlebars::RenderError;
    use serde_json::Value;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum HelperError {
        #[snafu(display("Helper '{}' takes {} param(s), got {}", helper, expected, received))]
        ParamCount {
            helper: String,
            expected: usize,
            received: usize,
        },

        #[snafu(display("Helper '{}' expects a non-null scalar, got '{}'", helper, value))]
        NotScalar { helper: String, value: Value },

        #[snafu(display("Unable to encode '{}' as JSON: {}", value, source))]
        JsonEncode {
            value: Value,
            source: serde_json::Error,
        },

        #[snafu(display("Unable to write output of helper '{}': {}", helper, source))]
        Write {
            helper: String,
            source: std::io::Error,
        },
    }

    // Handlebars helpers have to return a RenderError
    impl From<HelperError> for RenderError {
        fn from(e: HelperError) -> RenderError {
            RenderError::from_error("HelperError", e)
        }
    }
}

/// `default` writes its second param, or its first when the second is null.  Both must be
/// scalars.
///
/// Example:
///    {{ default 25 cilium.cluster-pool-ipv4-mask-size }}
///    ...where the mask size is not set, will produce: 25
pub fn default(
    helper: &Helper<'_, '_>,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> Result<(), RenderError> {
    let params = params(helper, 2)?;
    let (fallback, value) = (params[0], params[1]);

    let text = match scalar(helper, value)? {
        Some(text) => text,
        None => scalar(helper, fallback)?.context(error::NotScalarSnafu {
            helper: helper.name(),
            value: fallback.clone(),
        })?,
    };
    write(helper, out, &text)
}

/// `to_json` writes its param as compact JSON.  Strings come out quoted.
///
/// Example:
///    {{ to_json cidrs }}
///    ...where `cidrs` is: ["10.0.0.0/16", "10.1.0.0/16"]
///    ...will produce: ["10.0.0.0/16","10.1.0.0/16"]
pub fn to_json(
    helper: &Helper<'_, '_>,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> Result<(), RenderError> {
    let value = params(helper, 1)?[0];
    let encoded = serde_json::to_string(value).context(error::JsonEncodeSnafu {
        value: value.clone(),
    })?;
    write(helper, out, &encoded)
}

/// The values of the helper's params, if there are exactly `expected` of them
fn params<'a>(helper: &'a Helper<'_, '_>, expected: usize) -> Result<Vec<&'a Value>, RenderError> {
    let received = helper.params().len();
    if received != expected {
        return Err(error::ParamCountSnafu {
            helper: helper.name(),
            expected,
            received,
        }
        .build()
        .into());
    }
    Ok(helper.params().iter().map(|p| p.value()).collect())
}

/// The text of a scalar value, or None for null
fn scalar(helper: &Helper<'_, '_>, value: &Value) -> Result<Option<String>, RenderError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(error::NotScalarSnafu {
            helper: helper.name(),
            value: value.clone(),
        }
        .build()
        .into()),
    }
}

fn write(helper: &Helper<'_, '_>, out: &mut dyn Output, text: &str) -> Result<(), RenderError> {
    trace!("Helper '{}' writes: {}", helper.name(), text);
    out.write(text)
        .context(error::WriteSnafu {
            helper: helper.name(),
        })?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn render(tmpl: &str, data: &Value) -> Result<String, RenderError> {
        let mut registry = Handlebars::new();
        registry.register_helper("default", Box::new(default));
        registry.register_helper("to_json", Box::new(to_json));
        registry.render_template(tmpl, data)
    }

    #[test]
    fn default_have_setting() {
        let result = render("{{default 1 replicas}}", &json!({"replicas": 3})).unwrap();
        assert_eq!(result, "3")
    }

    #[test]
    fn default_null_setting() {
        let result = render("{{default 1 replicas}}", &json!({"replicas": null})).unwrap();
        assert_eq!(result, "1")
    }

    #[test]
    fn default_string() {
        let result = render("\"{{default \"false\" kpr}}\"", &json!({"kpr": null})).unwrap();
        assert_eq!(result, "\"false\"")
    }

    #[test]
    fn default_bool_setting() {
        let result = render("{{default false flag}}", &json!({"flag": true})).unwrap();
        assert_eq!(result, "true")
    }

    #[test]
    fn default_composite_setting() {
        assert!(render("{{default 1 list}}", &json!({"list": [1, 2]})).is_err());
    }

    #[test]
    fn default_null_fallback() {
        assert!(render("{{default a b}}", &json!({"a": null, "b": null})).is_err());
    }

    #[test]
    fn default_missing_param() {
        assert!(render("{{default 1}}", &json!({})).is_err());
    }

    #[test]
    fn to_json_string_list() {
        let result = render(
            "{{to_json cidrs}}",
            &json!({"cidrs": ["10.0.0.0/16", "10.1.0.0/16"]}),
        )
        .unwrap();
        assert_eq!(result, r#"["10.0.0.0/16","10.1.0.0/16"]"#)
    }

    #[test]
    fn to_json_empty_list() {
        let result = render("{{to_json cidrs}}", &json!({"cidrs": []})).unwrap();
        assert_eq!(result, "[]")
    }

    #[test]
    fn to_json_string_quoted() {
        let result = render("{{to_json name}}", &json!({"name": "cilium"})).unwrap();
        assert_eq!(result, r#""cilium""#)
    }

    #[test]
    fn to_json_extra_param() {
        assert!(render("{{to_json a b}}", &json!({"a": 1, "b": 2})).is_err());
    }
}
