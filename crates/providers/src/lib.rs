pub mod hierarchy;
pub mod http;
pub mod metadata;
pub mod mutator;
pub mod registration;
pub mod service;

pub use hierarchy::*;
pub use http::*;
pub use metadata::*;
pub use mutator::*;
pub use registration::*;
pub use service::*;

use foundation::RegistrationId;
use layers::Layer;
use tracing::warn;
use tree::{TreeError, TreeIndex, TreeItem};

#[derive(Debug)]
pub enum NormalizeError {
    Invalid(RegistrationError),
    Fetch(FetchError),
    Tree(TreeError),
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::Invalid(e) => write!(f, "invalid registration: {e}"),
            NormalizeError::Fetch(e) => write!(f, "metadata fetch failed: {e}"),
            NormalizeError::Tree(e) => write!(f, "malformed tree: {e}"),
        }
    }
}

impl std::error::Error for NormalizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NormalizeError::Invalid(e) => Some(e),
            NormalizeError::Fetch(e) => Some(e),
            NormalizeError::Tree(e) => Some(e),
        }
    }
}

impl From<RegistrationError> for NormalizeError {
    fn from(value: RegistrationError) -> Self {
        NormalizeError::Invalid(value)
    }
}

impl From<FetchError> for NormalizeError {
    fn from(value: FetchError) -> Self {
        NormalizeError::Fetch(value)
    }
}

impl From<TreeError> for NormalizeError {
    fn from(value: TreeError) -> Self {
        NormalizeError::Tree(value)
    }
}

/// A registration resolved into its tree, lookup index and mutator.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub id: RegistrationId,
    pub tree: TreeItem,
    pub index: TreeIndex,
    pub mutator: ActivationMutator,
}

impl Normalized {
    /// Indexes `tree`, rejecting duplicate or dangling ids.
    pub fn new(
        id: RegistrationId,
        tree: TreeItem,
        mutator: ActivationMutator,
    ) -> Result<Self, TreeError> {
        let index = TreeIndex::build(&tree)?;
        Ok(Self {
            id,
            tree,
            index,
            mutator,
        })
    }
}

/// Normalizes one registration into a tree rooted at `id`.
///
/// The whole registration fails as a unit; no partial tree is returned.
pub async fn normalize(
    id: RegistrationId,
    registration: &LayerRegistration,
    client: &dyn ServiceMetadataClient,
) -> Result<Normalized, NormalizeError> {
    if let Err(e) = registration.validate() {
        warn!("{id}: rejected registration {:?}: {e}", registration.name());
        return Err(e.into());
    }

    let (tree, mutator) = match registration {
        LayerRegistration::ServiceDynamic(service) => {
            let built = fetch_service_tree(id, service, client).await?;
            let layer = service.layer.id();
            let mutator = if built.collapsed {
                DynamicServiceMutator::collapsed(layer, built.active, built.root.enabled())
            } else {
                DynamicServiceMutator::new(layer, built.active)
            };
            (built.root, ActivationMutator::ServiceDynamic(mutator))
        }
        LayerRegistration::ServiceFeature(service) => {
            let built = fetch_service_tree(id, service, client).await?;
            let mutator = FeatureServiceMutator {
                layer: service.layer.id(),
            };
            (built.root, ActivationMutator::ServiceFeature(mutator))
        }
        LayerRegistration::Static(entry) => {
            let built = normalize_static(id, entry).await?;
            (built.root, ActivationMutator::Static(built.mutator))
        }
    };

    Ok(Normalized::new(id, tree, mutator)?)
}

#[cfg(test)]
mod tests {
    use super::{LayerRegistration, NormalizeError, normalize};
    use crate::metadata::{InMemoryMetadataClient, ServiceInfo, ServiceLegend, SubLayerInfo};
    use crate::registration::{RegistrationError, ServiceRegistration, StaticRegistration};
    use crate::RegistrationKind;
    use foundation::{NodeId, RegistrationId};
    use layers::{HostCall, InMemoryHostMap, LayerId, MapLayer, ServiceLayer};
    use pretty_assertions::assert_eq;
    use tree::ItemKind;

    const URL: &str = "https://host/arcgis/rest/services/Water/MapServer";

    fn client() -> InMemoryMetadataClient {
        let mut client = InMemoryMetadataClient::new();
        client.insert(
            URL,
            ServiceInfo {
                layers: vec![
                    SubLayerInfo::group(1, "Network", -1, [2, 3]),
                    SubLayerInfo::leaf(2, "Mains", 1),
                    SubLayerInfo::leaf(3, "Valves", 1),
                ],
            },
            ServiceLegend::default(),
        );
        client
    }

    #[tokio::test]
    async fn dispatches_on_registration_type() {
        let client = client();
        let service = ServiceRegistration::new("Water", ServiceLayer::new(5, URL))
            .with_visible_layers([2]);

        let dynamic = normalize(
            RegistrationId(1),
            &LayerRegistration::ServiceDynamic(service.clone()),
            &client,
        )
        .await
        .unwrap();
        assert_eq!(dynamic.mutator.kind(), RegistrationKind::ServiceDynamic);
        assert_eq!(dynamic.index.kind(NodeId::Item(1)), Some(ItemKind::Node));

        let mut host = InMemoryHostMap::new();
        let mut mutator = dynamic.mutator.clone();
        mutator.attach(&mut host);
        assert_eq!(
            host.calls(),
            &[
                HostCall::Add(LayerId(5)),
                HostCall::SetSublayers(LayerId(5), vec![foundation::SubLayerId(2)]),
            ]
        );

        let feature = normalize(
            RegistrationId(2),
            &LayerRegistration::ServiceFeature(service),
            &client,
        )
        .await
        .unwrap();
        assert_eq!(feature.mutator.kind(), RegistrationKind::ServiceFeature);
        assert_eq!(feature.tree.children().len(), 1);

        let statics = normalize(
            RegistrationId(3),
            &LayerRegistration::Static(StaticRegistration::leaf("Base", MapLayer::new(9))),
            &client,
        )
        .await
        .unwrap();
        assert_eq!(statics.tree.kind(), ItemKind::Leaf);
        assert_eq!(statics.index.len(), 1);
    }

    #[tokio::test]
    async fn invalid_registrations_fail_before_fetching() {
        let reg = LayerRegistration::ServiceDynamic(ServiceRegistration::new(
            "Nowhere",
            ServiceLayer::new(1, ""),
        ));
        // The empty client would fail the fetch; validation must come first.
        let err = normalize(RegistrationId(1), &reg, &InMemoryMetadataClient::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::Invalid(RegistrationError::EmptyServiceUrl { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_service_fails_as_a_unit() {
        let reg = LayerRegistration::ServiceDynamic(ServiceRegistration::new(
            "Missing",
            ServiceLayer::new(1, "https://host/other/MapServer"),
        ));
        let err = normalize(RegistrationId(1), &reg, &client())
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::Fetch(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
