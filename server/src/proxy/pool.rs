use std::collections::HashMap;
use std::sync::Arc;

use super::balancer::WeightTable;
use super::error::ProxyError;
use super::introspect::RequestProfile;
use crate::database::model::Model;
use crate::database::model_provider::ModelWithProvider;
use crate::database::provider::Provider;
use crate::schema::enum_def::ProviderType;

pub(super) struct PoolEntry {
    pub mapping: ModelWithProvider,
    pub provider: Arc<Provider>,
}

/// One request's candidate snapshot plus its retry budget. Taken once at
/// dispatch start; admin mutations after this point are invisible to the
/// request.
pub(super) struct ResolvedPool {
    pub weights: WeightTable,
    pub entries: HashMap<i64, PoolEntry>,
    pub max_retry: i32,
    pub timeout_seconds: i32,
}

pub(super) fn resolve_pool(
    model_name: &str,
    style: ProviderType,
    profile: &RequestProfile,
) -> Result<ResolvedPool, ProxyError> {
    let model = Model::find_by_name(model_name)?
        .ok_or_else(|| ProxyError::ModelNotFound(model_name.to_string()))?;

    let mappings = ModelWithProvider::find_by_model_id(model.id)?;
    if mappings.is_empty() {
        return Err(ProxyError::NoMappings(model_name.to_string()));
    }

    let provider_ids: Vec<i64> = mappings.iter().map(|m| m.provider_id).collect();
    let providers = Provider::find_by_ids_and_type(&provider_ids, style)?;
    if providers.is_empty() {
        return Err(ProxyError::NoProvidersForStyle {
            style,
            model: model_name.to_string(),
        });
    }
    let provider_map: HashMap<i64, Arc<Provider>> = providers
        .into_iter()
        .map(|p| (p.id, Arc::new(p)))
        .collect();

    let eligible = filter_eligible(mappings, &provider_map, profile);
    if eligible.is_empty() {
        return Err(ProxyError::NoEligibleMapping(model_name.to_string()));
    }

    let mut weights = WeightTable::new();
    let mut entries = HashMap::with_capacity(eligible.len());
    for mapping in eligible {
        let Some(provider) = provider_map.get(&mapping.provider_id).cloned() else {
            continue;
        };
        weights.insert(mapping.id, mapping.weight as i64);
        entries.insert(mapping.id, PoolEntry { mapping, provider });
    }

    Ok(ResolvedPool {
        weights,
        entries,
        max_retry: model.max_retry.max(1),
        timeout_seconds: model.timeout_seconds.max(1),
    })
}

/// A mapping survives iff its provider speaks the request's dialect and,
/// for every capability the request needs, the flag is not an explicit
/// `false` (null means unconstrained).
fn filter_eligible(
    mappings: Vec<ModelWithProvider>,
    providers: &HashMap<i64, Arc<Provider>>,
    profile: &RequestProfile,
) -> Vec<ModelWithProvider> {
    mappings
        .into_iter()
        .filter(|mapping| {
            providers.contains_key(&mapping.provider_id)
                && capability_allows(mapping.tool_call, profile.tool_call)
                && capability_allows(mapping.structured_output, profile.structured_output)
                && capability_allows(mapping.image, profile.image)
        })
        .collect()
}

fn capability_allows(flag: Option<bool>, requested: bool) -> bool {
    !(requested && flag == Some(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn profile(tool_call: bool, structured_output: bool, image: bool) -> RequestProfile {
        RequestProfile {
            model: "m".to_string(),
            stream: false,
            tool_call,
            structured_output,
            image,
            raw: Bytes::new(),
        }
    }

    fn mapping(id: i64, provider_id: i64, tool_call: Option<bool>) -> ModelWithProvider {
        ModelWithProvider {
            id,
            provider_id,
            weight: 1,
            tool_call,
            ..Default::default()
        }
    }

    fn providers(ids: &[i64]) -> HashMap<i64, Arc<Provider>> {
        ids.iter()
            .map(|id| {
                (
                    *id,
                    Arc::new(Provider {
                        id: *id,
                        ..Default::default()
                    }),
                )
            })
            .collect()
    }

    #[test]
    fn capability_truth_table() {
        // Not requested: any flag passes.
        assert!(capability_allows(None, false));
        assert!(capability_allows(Some(true), false));
        assert!(capability_allows(Some(false), false));
        // Requested: only an explicit false blocks.
        assert!(capability_allows(None, true));
        assert!(capability_allows(Some(true), true));
        assert!(!capability_allows(Some(false), true));
    }

    #[test]
    fn explicit_false_filtered_when_tools_requested() {
        let mappings = vec![mapping(1, 10, Some(false)), mapping(2, 10, None)];
        let kept = filter_eligible(mappings, &providers(&[10]), &profile(true, false, false));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
    }

    #[test]
    fn all_kept_when_nothing_requested() {
        let mappings = vec![mapping(1, 10, Some(false)), mapping(2, 10, None)];
        let kept = filter_eligible(mappings, &providers(&[10]), &profile(false, false, false));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn mapping_without_loaded_provider_is_dropped() {
        let mappings = vec![mapping(1, 10, None), mapping(2, 11, None)];
        let kept = filter_eligible(mappings, &providers(&[10]), &profile(false, false, false));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1);
    }

    #[test]
    fn image_capability_filtered_independently() {
        let mut a = mapping(1, 10, None);
        a.image = Some(false);
        let mut b = mapping(2, 10, None);
        b.image = Some(true);
        let kept = filter_eligible(vec![a, b], &providers(&[10]), &profile(false, false, true));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
    }
}
