// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{
    gvk_of_object, with_type_meta, ListOptions, ObjectClient, ObjectKey, ObjectReader,
    ObjectWriter, WriteOptions,
};
use crate::infrastructure::kubernetes::registry::{ResourceMapping, TypeRegistry};
use crate::infrastructure::kubernetes::resolver::TypeResolver;
use crate::shared::error::{ClusterError, Result};
use kube::api::{DynamicObject, Patch};
use kube::core::GroupVersionKind;
use kube::{Api, Client};
use std::sync::Arc;

/// Talks to the API server on every call. No caching.
pub struct ApiClient {
    client: Client,
    registry: Arc<TypeRegistry>,
    resolver: Arc<dyn TypeResolver>,
}

impl ApiClient {
    pub fn new(client: Client, registry: Arc<TypeRegistry>, resolver: Arc<dyn TypeResolver>) -> Self {
        Self {
            client,
            registry,
            resolver,
        }
    }

    /// Api handle for a single object. Namespaced kinds without an explicit
    /// namespace use the client's default namespace.
    async fn object_api(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
    ) -> Result<(Api<DynamicObject>, ResourceMapping)> {
        let mapping = self.resolver.resolve(gvk).await?;
        let api = match (mapping.namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &mapping.resource),
            (true, None) => Api::default_namespaced_with(self.client.clone(), &mapping.resource),
            (false, _) => Api::all_with(self.client.clone(), &mapping.resource),
        };
        Ok((api, mapping))
    }

    /// Api handle for listing. Namespaced kinds without a namespace list across
    /// all namespaces.
    async fn list_api(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
    ) -> Result<(Api<DynamicObject>, ResourceMapping)> {
        let mapping = self.resolver.resolve(gvk).await?;
        let api = match (mapping.namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &mapping.resource),
            _ => Api::all_with(self.client.clone(), &mapping.resource),
        };
        Ok((api, mapping))
    }
}

#[async_trait::async_trait]
impl ObjectReader for ApiClient {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<DynamicObject> {
        let (api, mapping) = self.object_api(gvk, key.namespace.as_deref()).await?;
        match api.get(&key.name).await {
            Ok(obj) => Ok(with_type_meta(obj, &mapping.resource)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(ClusterError::not_found(
                gvk,
                &key.name,
                key.namespace.as_deref(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<DynamicObject>> {
        let (api, mapping) = self.list_api(gvk, opts.namespace.as_deref()).await?;
        let list = api.list(&opts.list_params()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|obj| with_type_meta(obj, &mapping.resource))
            .collect())
    }
}

#[async_trait::async_trait]
impl ObjectWriter for ApiClient {
    async fn create(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        let gvk = gvk_of_object(obj)?;
        let (api, mapping) = self
            .object_api(&gvk, obj.metadata.namespace.as_deref())
            .await?;
        let created = api.create(&opts.post_params(), obj).await?;
        Ok(with_type_meta(created, &mapping.resource))
    }

    async fn update(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        let gvk = gvk_of_object(obj)?;
        let key = ObjectKey::of(obj)?;
        let (api, mapping) = self.object_api(&gvk, key.namespace.as_deref()).await?;
        let updated = api.replace(&key.name, &opts.post_params(), obj).await?;
        Ok(with_type_meta(updated, &mapping.resource))
    }

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        patch: &Patch<serde_json::Value>,
        opts: &WriteOptions,
    ) -> Result<DynamicObject> {
        let (api, mapping) = self.object_api(gvk, key.namespace.as_deref()).await?;
        let patched = api.patch(&key.name, &opts.patch_params(), patch).await?;
        Ok(with_type_meta(patched, &mapping.resource))
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        opts: &WriteOptions,
    ) -> Result<()> {
        let (api, _) = self.object_api(gvk, key.namespace.as_deref()).await?;
        match api.delete(&key.name, &opts.delete_params()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(ClusterError::not_found(
                gvk,
                &key.name,
                key.namespace.as_deref(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

impl ObjectClient for ApiClient {
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kubernetes::resolver::StaticResolver;
    use http::{Request, Response};
    use http_body_util::BodyExt;
    use kube::client::Body;
    use serde_json::{json, Value};
    use tower_test::mock::{self, Handle};

    type ApiHandle = Handle<Request<Body>, Response<Body>>;

    fn client() -> (ApiClient, ApiHandle) {
        let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let registry = Arc::new(TypeRegistry::default());
        let resolver = Arc::new(StaticResolver::from_registry(&registry));
        (
            ApiClient::new(Client::new(service, "default"), registry, resolver),
            handle,
        )
    }

    fn config_map(namespace: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "settings", "namespace": namespace },
        })
    }

    fn config_map_gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("", "v1", "ConfigMap")
    }

    /// Answers the next request and returns its method, path with query, and
    /// JSON body (`Null` when empty).
    async fn answer(handle: &mut ApiHandle, status: u16, body: Value) -> (String, String, Value) {
        let (request, send) = handle.next_request().await.expect("no request sent");
        let method = request.method().to_string();
        let uri = request.uri().to_string().trim_end_matches('?').to_string();
        let bytes = request.into_body().collect().await.unwrap().to_bytes();
        let sent = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        send.send_response(
            Response::builder()
                .status(status)
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        );
        (method, uri, sent)
    }

    #[tokio::test]
    async fn test_get_picks_scope_and_namespace() {
        let (client, mut handle) = client();

        let reads = tokio::spawn(async move {
            let gvk = config_map_gvk();
            client
                .get(&gvk, &ObjectKey::namespaced("team-a", "settings"))
                .await
                .unwrap();
            client
                .get(&gvk, &ObjectKey::cluster_scoped("settings"))
                .await
                .unwrap();
            client
                .get(
                    &GroupVersionKind::gvk("", "v1", "Node"),
                    &ObjectKey::namespaced("team-a", "node-1"),
                )
                .await
                .unwrap()
        });

        let (method, uri, _) = answer(&mut handle, 200, config_map("team-a")).await;
        assert_eq!(method, "GET");
        assert_eq!(uri, "/api/v1/namespaces/team-a/configmaps/settings");
        let (_, uri, _) = answer(&mut handle, 200, config_map("default")).await;
        assert_eq!(uri, "/api/v1/namespaces/default/configmaps/settings");
        let node = json!({ "apiVersion": "v1", "kind": "Node", "metadata": { "name": "node-1" } });
        let (_, uri, _) = answer(&mut handle, 200, node).await;
        assert_eq!(uri, "/api/v1/nodes/node-1");

        let node = reads.await.unwrap();
        assert_eq!(node.types.map(|t| t.kind).as_deref(), Some("Node"));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let (client, mut handle) = client();

        let read = tokio::spawn(async move {
            client
                .get(&config_map_gvk(), &ObjectKey::namespaced("team-a", "absent"))
                .await
        });
        let status = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": "configmaps \"absent\" not found",
            "reason": "NotFound",
            "code": 404,
        });
        answer(&mut handle, 404, status).await;

        let err = read.await.unwrap().unwrap_err();
        assert!(matches!(err, ClusterError::NotFound { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_dry_run_reaches_the_wire() {
        let (client, mut handle) = client();

        let writes = tokio::spawn(async move {
            let obj: DynamicObject = serde_json::from_value(config_map("team-a")).unwrap();
            let gvk = config_map_gvk();
            let key = ObjectKey::namespaced("team-a", "settings");
            let opts = WriteOptions::dry_run();
            client.create(&obj, &opts).await.unwrap();
            client.update(&obj, &opts).await.unwrap();
            client
                .patch(&gvk, &key, &Patch::Merge(json!({ "data": { "a": "b" } })), &opts)
                .await
                .unwrap();
            client.delete(&gvk, &key, &opts).await.unwrap();
        });

        for expected in ["POST", "PUT", "PATCH"] {
            let (method, uri, _) = answer(&mut handle, 200, config_map("team-a")).await;
            assert_eq!(method, expected);
            assert!(uri.contains("dryRun=All"), "{} {} is not a dry run", method, uri);
        }
        let (method, uri, body) = answer(&mut handle, 200, config_map("team-a")).await;
        assert_eq!(method, "DELETE");
        assert!(
            uri.contains("dryRun=All") || body["dryRun"] == json!(["All"]),
            "DELETE {} {} is not a dry run",
            uri,
            body
        );

        writes.await.unwrap();
    }

    #[tokio::test]
    async fn test_plain_writes_are_not_dry_run() {
        let (client, mut handle) = client();

        let write = tokio::spawn(async move {
            let obj: DynamicObject = serde_json::from_value(config_map("team-a")).unwrap();
            client.create(&obj, &WriteOptions::default()).await.unwrap()
        });
        let (method, uri, sent) = answer(&mut handle, 201, config_map("team-a")).await;
        assert_eq!(method, "POST");
        assert_eq!(uri, "/api/v1/namespaces/team-a/configmaps");
        assert_eq!(sent["metadata"]["name"], "settings");

        let created = write.await.unwrap();
        assert_eq!(created.metadata.name.as_deref(), Some("settings"));
    }
}
