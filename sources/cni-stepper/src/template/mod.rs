//! The template module owns the handlebars registry used to render plugin values files, along
//! with the values templates themselves.
//!
//! Templates are rendered against a plugin's serialized state.  Each optional setting is written
//! with an explicit fallback, both when the whole settings block is missing and when a single
//! field is, so a values file never carries an empty value.

pub mod helpers;

use crate::error::{self, Result};
use handlebars::Handlebars;
use serde::Serialize;
use snafu::ResultExt;

/// Registry name of the cilium values template
pub const CILIUM_VALUES_NAME: &str = "cilium-values";

/// Helm values for the cilium chart.  Defaults: one operator replica, a single
/// `192.168.64.0/18` pod pool with /25 node masks, and kube-proxy kept in place.
pub const CILIUM_VALUES: &str = r#"operator:
  replicas: {{#if cilium}}{{default 1 cilium.operator-replicas}}{{else}}1{{/if}}
ipam:
  operator:
    clusterPoolIPv4PodCIDRList: {{#if cilium}}{{#if cilium.cluster-pool-ipv4-pod-cidr-list}}{{to_json cilium.cluster-pool-ipv4-pod-cidr-list}}{{else}}["192.168.64.0/18"]{{/if}}{{else}}["192.168.64.0/18"]{{/if}}
    clusterPoolIPv4MaskSize: {{#if cilium}}{{default 25 cilium.cluster-pool-ipv4-mask-size}}{{else}}25{{/if}}
kubeProxyReplacement: "{{#if cilium}}{{default "false" cilium.kube-proxy-replacement}}{{else}}false{{/if}}"
"#;

/// Build a handlebars template registry with our helpers and values templates.
pub fn build_template_registry() -> Result<Handlebars<'static>> {
    let mut template_registry = Handlebars::new();
    // Strict mode will fail the render if a key exists in the template
    // but isn't provided in the data given to the renderer
    template_registry.set_strict_mode(true);
    // Values files are YAML, not HTML
    template_registry.register_escape_fn(handlebars::no_escape);

    template_registry.register_helper("default", Box::new(helpers::default));
    template_registry.register_helper("to_json", Box::new(helpers::to_json));

    template_registry
        .register_template_string(CILIUM_VALUES_NAME, CILIUM_VALUES)
        .context(error::TemplateRegisterSnafu {
            template: CILIUM_VALUES_NAME,
        })?;

    Ok(template_registry)
}

/// Render the named template against `data`
pub fn render<T>(registry: &Handlebars<'_>, name: &str, data: &T) -> Result<String>
where
    T: Serialize,
{
    debug!("Rendering template '{}'", name);
    let rendered = registry
        .render(name, data)
        .context(error::TemplateRenderSnafu { template: name })?;
    trace!("Rendered '{}':\n{}", name, rendered);

    Ok(rendered)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    const DEFAULT_VALUES: &str = r#"operator:
  replicas: 1
ipam:
  operator:
    clusterPoolIPv4PodCIDRList: ["192.168.64.0/18"]
    clusterPoolIPv4MaskSize: 25
kubeProxyReplacement: "false"
"#;

    fn render_cilium(data: serde_json::Value) -> String {
        let registry = build_template_registry().unwrap();
        render(&registry, CILIUM_VALUES_NAME, &data).unwrap()
    }

    #[test]
    fn no_settings_block() {
        assert_eq!(render_cilium(json!({ "cilium": null })), DEFAULT_VALUES);
    }

    #[test]
    fn empty_settings_block() {
        let data = json!({
            "cilium": {
                "operator-replicas": null,
                "cluster-pool-ipv4-pod-cidr-list": null,
                "cluster-pool-ipv4-mask-size": null,
                "kube-proxy-replacement": null,
            }
        });
        assert_eq!(render_cilium(data), DEFAULT_VALUES);
    }

    #[test]
    fn all_settings() {
        let data = json!({
            "cilium": {
                "operator-replicas": 2,
                "cluster-pool-ipv4-pod-cidr-list": ["10.0.0.0/16", "10.1.0.0/16"],
                "cluster-pool-ipv4-mask-size": 24,
                "kube-proxy-replacement": "strict",
            }
        });
        let expected = r#"operator:
  replicas: 2
ipam:
  operator:
    clusterPoolIPv4PodCIDRList: ["10.0.0.0/16","10.1.0.0/16"]
    clusterPoolIPv4MaskSize: 24
kubeProxyReplacement: "strict"
"#;
        assert_eq!(render_cilium(data), expected);
    }

    #[test]
    fn empty_cidr_list() {
        let data = json!({
            "cilium": {
                "operator-replicas": 3,
                "cluster-pool-ipv4-pod-cidr-list": [],
                "cluster-pool-ipv4-mask-size": null,
                "kube-proxy-replacement": null,
            }
        });
        let rendered = render_cilium(data);
        assert!(rendered.contains(r#"clusterPoolIPv4PodCIDRList: ["192.168.64.0/18"]"#));
        assert!(rendered.contains("replicas: 3"));
    }
}
