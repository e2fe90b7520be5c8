//! StatefulSet events from the Kubernetes API

use async_trait::async_trait;
use futures::{future, StreamExt};
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::api::{Api, ListParams};
use kube::runtime::watcher::{self, Event};
use kube::{Client, ResourceExt};

use torch_core::{Error, Result};

use super::watcher::{WorkloadEvent, WorkloadEventSource, WorkloadStream};

/// Watches StatefulSets in one namespace
#[derive(Clone)]
pub struct StatefulSetSource {
    api: Api<StatefulSet>,
    namespace: String,
}

impl StatefulSetSource {
    #[must_use]
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }
}

fn to_workload_event(
    event: std::result::Result<Event<StatefulSet>, watcher::Error>,
) -> Option<Result<WorkloadEvent>> {
    match event {
        Ok(Event::Apply(sts) | Event::InitApply(sts)) => {
            Some(Ok(WorkloadEvent::Applied(sts.name_any())))
        }
        Ok(Event::Delete(sts)) => Some(Ok(WorkloadEvent::Deleted(sts.name_any()))),
        Ok(Event::Init | Event::InitDone) => None,
        Err(e) => Some(Err(Error::Cluster(format!("statefulset watch: {e}")))),
    }
}

#[async_trait]
impl WorkloadEventSource for StatefulSetSource {
    async fn subscribe(&self) -> Result<WorkloadStream> {
        // The watch stream is lazy; list once so RBAC or connectivity problems
        // surface here instead of on the first poll.
        self.api
            .list(&ListParams::default().limit(1))
            .await
            .map_err(|e| {
                Error::Cluster(format!(
                    "cannot list statefulsets in namespace {}: {e}",
                    self.namespace
                ))
            })?;

        let stream = watcher::watcher(self.api.clone(), watcher::Config::default())
            .filter_map(|event| future::ready(to_workload_event(event)))
            .boxed();
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn sts(name: &str) -> StatefulSet {
        StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..StatefulSet::default()
        }
    }

    #[test]
    fn test_apply_and_initial_listing_map_to_applied() {
        assert_eq!(
            to_workload_event(Ok(Event::Apply(sts("da-0")))).unwrap().unwrap(),
            WorkloadEvent::Applied("da-0".to_string())
        );
        assert_eq!(
            to_workload_event(Ok(Event::InitApply(sts("da-1")))).unwrap().unwrap(),
            WorkloadEvent::Applied("da-1".to_string())
        );
    }

    #[test]
    fn test_delete_and_markers() {
        assert_eq!(
            to_workload_event(Ok(Event::Delete(sts("da-0")))).unwrap().unwrap(),
            WorkloadEvent::Deleted("da-0".to_string())
        );
        assert!(to_workload_event(Ok(Event::Init)).is_none());
        assert!(to_workload_event(Ok(Event::InitDone)).is_none());
    }
}
