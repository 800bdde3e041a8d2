use cc_gw_core::config::{ConfigDocument, ProviderConfig};

use crate::alias::resolve_alias;
use crate::error::{Result, RouterError};
use crate::types::{PayloadHints, RouteTarget};

/// Resolve (endpoint family, requested model, payload hints) to a
/// concrete provider + upstream model id, following the 8-step order in
/// spec §4.7, stopping at the first hit.
pub fn resolve(
    config: &ConfigDocument,
    endpoint_family: &str,
    requested_model: &str,
    hints: PayloadHints,
) -> Result<RouteTarget> {
    let routing = config.endpoint_routing.get(endpoint_family);

    let resolved = routing
        .and_then(|r| lookup_model_routes(r, requested_model))
        .or_else(|| {
            resolve_alias(requested_model).and_then(|aliased| {
                routing
                    .and_then(|r| lookup_model_routes(r, aliased))
                    .or_else(|| resolve_direct(&config.providers, aliased))
            })
        })
        .or_else(|| resolve_direct(&config.providers, requested_model))
        .or_else(|| {
            routing.and_then(|r| {
                if hints.thinking {
                    r.defaults
                        .reasoning
                        .as_deref()
                        .and_then(|t| parse_target(t, requested_model, &config.providers))
                } else {
                    None
                }
            })
        })
        .or_else(|| {
            routing.and_then(|r| {
                if hints.token_estimate > r.defaults.long_context_threshold {
                    r.defaults
                        .background
                        .as_deref()
                        .and_then(|t| parse_target(t, requested_model, &config.providers))
                } else {
                    None
                }
            })
        })
        .or_else(|| {
            routing.and_then(|r| parse_target(&r.defaults.completion, requested_model, &config.providers))
        })
        .or_else(|| first_provider_default(&config.providers));

    let Some((provider_id, upstream_model_id)) = resolved else {
        return Err(RouterError::NoProviderConfigured);
    };

    Ok(RouteTarget {
        provider_id,
        upstream_model_id,
        token_estimate: hints.token_estimate,
    })
}

fn lookup_model_routes(
    routing: &cc_gw_core::config::EndpointRouting,
    requested_model: &str,
) -> Option<(String, String)> {
    if let Some(target) = routing.model_routes.get(requested_model) {
        if let Some(resolved) = parse_target(target, requested_model, &[]) {
            return Some(resolved);
        }
    }

    let mut best: Option<(usize, &str)> = None;
    for (pattern, target) in routing.model_routes.iter() {
        if !pattern.contains('*') {
            continue;
        }
        if glob_match(pattern, requested_model) {
            let score = pattern.chars().filter(|c| *c != '*').count();
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, target.as_str()));
            }
        }
    }
    best.and_then(|(_, target)| parse_target(target, requested_model, &[]))
}

/// Parse a `providerId:modelId` / `providerId:*` / bare-model-id target
/// string. `providers` is used to validate `providerId:modelId` targets
/// and to search for bare ids; pass `&[]` when validation isn't needed
/// yet (the model-routes lookup validates separately via
/// `resolve_direct`/`parse_target` with the real provider list at the
/// call sites above).
fn parse_target(
    target: &str,
    requested_model: &str,
    providers: &[ProviderConfig],
) -> Option<(String, String)> {
    if let Some((provider_id, model_id)) = target.split_once(':') {
        if model_id == "*" {
            return Some((provider_id.to_string(), requested_model.to_string()));
        }
        if providers.is_empty() {
            // Validation deferred to caller (model-routes targets are
            // trusted at config-validate time); accept as-is.
            return Some((provider_id.to_string(), model_id.to_string()));
        }
        if providers.iter().any(|p| p.id == provider_id && p.has_model(model_id)) {
            return Some((provider_id.to_string(), model_id.to_string()));
        }
        return None;
    }

    if providers.is_empty() {
        return None;
    }
    resolve_direct(providers, target)
}

fn resolve_direct(providers: &[ProviderConfig], model_id: &str) -> Option<(String, String)> {
    providers
        .iter()
        .find(|p| p.has_model(model_id))
        .map(|p| (p.id.clone(), model_id.to_string()))
}

fn first_provider_default(providers: &[ProviderConfig]) -> Option<(String, String)> {
    let p = providers.first()?;
    let model = p
        .default_model
        .clone()
        .or_else(|| p.models.first().map(|m| m.id.clone()))?;
    Some((p.id.clone(), model))
}

/// `*` matches any substring; supports multiple wildcards per pattern.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == candidate;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut idx = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !candidate[idx..].starts_with(part) {
                return false;
            }
            idx += part.len();
        } else if i == parts.len() - 1 {
            if !candidate[idx..].ends_with(part) {
                return false;
            }
        } else {
            match candidate[idx..].find(part) {
                Some(found) => idx += found + part.len(),
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_gw_core::config::{EndpointRouting, ModelEntry, RouteDefaults, WireFamily};
    use indexmap::IndexMap;
    use std::collections::HashMap;

    fn provider(id: &str, models: &[&str]) -> ProviderConfig {
        ProviderConfig {
            id: id.to_string(),
            label: id.to_string(),
            wire_family: WireFamily::Openai,
            base_url: "https://api.example.com".to_string(),
            credential: "key".to_string(),
            credential_mode: None,
            extra_headers: HashMap::new(),
            default_model: models.first().map(|m| m.to_string()),
            models: models
                .iter()
                .map(|m| ModelEntry {
                    id: m.to_string(),
                    label: None,
                })
                .collect(),
            supports_tools: true,
        }
    }

    fn config_with(routing: EndpointRouting, providers: Vec<ProviderConfig>) -> ConfigDocument {
        let mut doc = ConfigDocument::default();
        doc.providers = providers;
        doc.endpoint_routing.insert("anthropic".to_string(), routing);
        doc
    }

    fn hints() -> PayloadHints {
        PayloadHints {
            thinking: false,
            token_estimate: 10,
        }
    }

    #[test]
    fn exact_model_route_wins() {
        let mut routes = IndexMap::new();
        routes.insert("gpt-4o".to_string(), "p1:gpt-4o-mini".to_string());
        let routing = EndpointRouting {
            defaults: RouteDefaults {
                completion: "p1:gpt-4o-mini".to_string(),
                reasoning: None,
                background: None,
                long_context_threshold: 60_000,
            },
            model_routes: routes,
        };
        let config = config_with(routing, vec![provider("p1", &["gpt-4o-mini"])]);
        let target = resolve(&config, "anthropic", "gpt-4o", hints()).unwrap();
        assert_eq!(target.provider_id, "p1");
        assert_eq!(target.upstream_model_id, "gpt-4o-mini");
    }

    #[test]
    fn more_specific_wildcard_wins_over_less_specific() {
        let mut routes = IndexMap::new();
        routes.insert("gpt-*".to_string(), "p1:fallback".to_string());
        routes.insert("gpt-4o*".to_string(), "p1:specific".to_string());
        let routing = EndpointRouting {
            defaults: RouteDefaults {
                completion: "p1:fallback".to_string(),
                reasoning: None,
                background: None,
                long_context_threshold: 60_000,
            },
            model_routes: routes,
        };
        let config = config_with(routing, vec![provider("p1", &["fallback", "specific"])]);
        let target = resolve(&config, "anthropic", "gpt-4o-2024", hints()).unwrap();
        assert_eq!(target.upstream_model_id, "specific");
    }

    #[test]
    fn thinking_hint_selects_reasoning_tier() {
        let routing = EndpointRouting {
            defaults: RouteDefaults {
                completion: "p1:fast".to_string(),
                reasoning: Some("p1:smart".to_string()),
                background: None,
                long_context_threshold: 60_000,
            },
            model_routes: IndexMap::new(),
        };
        let config = config_with(routing, vec![provider("p1", &["fast", "smart"])]);
        let target = resolve(
            &config,
            "anthropic",
            "unmapped-model",
            PayloadHints {
                thinking: true,
                token_estimate: 10,
            },
        )
        .unwrap();
        assert_eq!(target.upstream_model_id, "smart");
    }

    #[test]
    fn long_context_selects_background_tier() {
        let routing = EndpointRouting {
            defaults: RouteDefaults {
                completion: "p1:fast".to_string(),
                reasoning: None,
                background: Some("p1:bulk".to_string()),
                long_context_threshold: 100,
            },
            model_routes: IndexMap::new(),
        };
        let config = config_with(routing, vec![provider("p1", &["fast", "bulk"])]);
        let target = resolve(
            &config,
            "anthropic",
            "unmapped-model",
            PayloadHints {
                thinking: false,
                token_estimate: 500,
            },
        )
        .unwrap();
        assert_eq!(target.upstream_model_id, "bulk");
    }

    #[test]
    fn falls_back_to_first_provider_default_when_nothing_else_resolves() {
        let routing = EndpointRouting {
            defaults: RouteDefaults {
                completion: "missing-provider:missing-model".to_string(),
                reasoning: None,
                background: None,
                long_context_threshold: 60_000,
            },
            model_routes: IndexMap::new(),
        };
        let config = config_with(routing, vec![provider("p1", &["default-model"])]);
        let target = resolve(&config, "anthropic", "unmapped-model", hints()).unwrap();
        assert_eq!(target.provider_id, "p1");
        assert_eq!(target.upstream_model_id, "default-model");
    }

    #[test]
    fn no_providers_is_an_error() {
        let config = ConfigDocument::default();
        assert!(resolve(&config, "anthropic", "whatever", hints()).is_err());
    }

    #[test]
    fn wildcard_passthrough_uses_requested_model_id() {
        let mut routes = IndexMap::new();
        routes.insert("*".to_string(), "p1:*".to_string());
        let routing = EndpointRouting {
            defaults: RouteDefaults {
                completion: "p1:*".to_string(),
                reasoning: None,
                background: None,
                long_context_threshold: 60_000,
            },
            model_routes: routes,
        };
        let config = config_with(routing, vec![provider("p1", &["anything"])]);
        let target = resolve(&config, "anthropic", "caller-chosen-model", hints()).unwrap();
        assert_eq!(target.provider_id, "p1");
        assert_eq!(target.upstream_model_id, "caller-chosen-model");
    }
}
