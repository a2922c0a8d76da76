//! Earth Engine REST binding (v1).
//!
//! - raster fetch:      `GET  v1/<asset>` (asset metadata, type must be IMAGE)
//! - collection fetch:  `GET  v1/<asset>:listFeatures`, following `nextPageToken`
//! - region reduction:  `POST v1/projects/<project>/value:compute` with an
//!   expression graph built by [`reduce_expression`]
//!
//! Credential loading is not handled here: callers pass an OAuth access token.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{check_budget, CollectionHandle, Feature, RasterHandle, Reducer, RegionStats, RemoteBackend, RetryPolicy};
use crate::assets::AssetKey;
use crate::config::EarthEngineSettings;
use crate::error::GatewayError;
use crate::geometry::Region;

pub struct EarthEngineClient {
    http: Client,
    endpoint: String,
    cloud_project: String,
    page_size: u32,
    access_token: Option<String>,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct AssetMetadata {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    bands: Vec<BandMetadata>,
}

#[derive(Deserialize)]
struct BandMetadata {
    id: String,
}

#[derive(Deserialize)]
struct FeaturePage {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ComputeResponse {
    #[serde(default)]
    result: Value,
}

impl EarthEngineClient {
    pub fn new(
        settings: &EarthEngineSettings,
        retry: RetryPolicy,
        access_token: Option<String>,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("agb-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Transport(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            cloud_project: settings.cloud_project.clone(),
            page_size: settings.page_size.max(1),
            access_token,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send one request under the retry policy and decode a JSON body.
    fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        what: &str,
        key: &AssetKey,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<T, GatewayError> {
        self.retry.run(what, || {
            log::debug!("{what}: {key}");
            let resp = self
                .authorized(build())
                .send()
                .map_err(|e| GatewayError::Transport(format!("{what} {key}: {e}")))?;
            let resp = check_status(resp, key)?;
            resp.json::<T>()
                .map_err(|e| GatewayError::Compute(format!("{what} {key}: unreadable response: {e}")))
        })
    }
}

/// Map HTTP status to the gateway taxonomy; pass successes through.
fn check_status(resp: Response, key: &AssetKey) -> Result<Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);
    Err(classify_status(status, key, message))
}

fn classify_status(status: StatusCode, key: &AssetKey, message: String) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(key.clone()),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::Transport(format!("HTTP {status}: {message}")),
        s if s.is_server_error() => GatewayError::Transport(format!("HTTP {status}: {message}")),
        _ => GatewayError::Compute(format!("HTTP {status}: {message}")),
    }
}

/// Token for the following page, or `None` when listing is done. A server
/// that hands back the token it was just given would loop forever.
fn next_page_token(current: Option<&str>, next: Option<String>) -> Option<String> {
    let next = next.filter(|t| !t.is_empty())?;
    if current == Some(next.as_str()) {
        log::warn!("listFeatures returned the same page token {next:?} twice; stopping");
        return None;
    }
    Some(next)
}

fn invocation(function: &str, arguments: Value) -> Value {
    json!({"functionInvocationValue": {"functionName": function, "arguments": arguments}})
}

fn constant(value: Value) -> Value {
    json!({"constantValue": value})
}

/// Expression graph for `Image.load(key).select(bands).reduceRegion(...)`
/// with the reducers combined using shared inputs and an empty output prefix,
/// so outputs are named `<band>_<reducer>`.
pub(crate) fn reduce_expression(
    raster: &RasterHandle,
    region: &Region,
    reducers: &[Reducer],
    scale: f64,
    max_pixels: f64,
) -> Value {
    let mut image = invocation("Image.load", json!({"id": constant(json!(raster.key().as_str()))}));
    let bands = raster.active_bands();
    if !bands.is_empty() {
        image = invocation("Image.select", json!({"input": image, "bandSelectors": constant(json!(bands))}));
    }

    let single = |r: Reducer| {
        let name = match r {
            Reducer::Mean => "Reducer.mean",
            Reducer::Min => "Reducer.min",
            Reducer::Max => "Reducer.max",
        };
        invocation(name, json!({}))
    };
    let reducer = reducers
        .iter()
        .map(|&r| single(r))
        .reduce(|acc, next| {
            invocation(
                "Reducer.combine",
                json!({
                    "reducer1": acc,
                    "reducer2": next,
                    "outputPrefix": constant(json!("")),
                    "sharedInputs": constant(json!(true)),
                }),
            )
        })
        .unwrap_or_else(|| single(Reducer::Mean));

    let geometry = invocation(
        "GeometryConstructors.Polygon",
        json!({"coordinates": constant(json!(region.coordinates()))}),
    );

    json!({
        "expression": {
            "result": "0",
            "values": {
                "0": invocation("Image.reduceRegion", json!({
                    "image": image,
                    "reducer": reducer,
                    "geometry": geometry,
                    "scale": constant(json!(scale)),
                    "maxPixels": constant(json!(max_pixels)),
                }))
            }
        }
    })
}

impl RemoteBackend for EarthEngineClient {
    fn fetch_raster(&self, key: &AssetKey) -> Result<RasterHandle, GatewayError> {
        let url = self.url(key.as_str());
        let meta: AssetMetadata = self.send_json("fetch_raster", key, || self.http.get(&url))?;
        if !meta.kind.eq_ignore_ascii_case("IMAGE") {
            return Err(GatewayError::Compute(format!("{key} is a {}, not an image", meta.kind)));
        }
        Ok(RasterHandle::new(key.clone(), meta.bands.into_iter().map(|b| b.id).collect()))
    }

    fn fetch_feature_collection(&self, key: &AssetKey) -> Result<CollectionHandle, GatewayError> {
        let url = self.url(&format!("{key}:listFeatures"));
        let mut features = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page_size = self.page_size.to_string();
            let page: FeaturePage = self.send_json("fetch_feature_collection", key, || {
                let mut query: Vec<(&str, &str)> = vec![("pageSize", page_size.as_str())];
                if let Some(t) = &token {
                    query.push(("pageToken", t.as_str()));
                }
                self.http.get(&url).query(&query)
            })?;
            features.extend(page.features);
            match next_page_token(token.as_deref(), page.next_page_token) {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        log::debug!("fetch_feature_collection: {key} -> {} features", features.len());
        Ok(CollectionHandle::new(key.clone(), features))
    }

    fn reduce_region(
        &self,
        raster: &RasterHandle,
        region: &Region,
        reducers: &[Reducer],
        scale: f64,
        max_pixels: f64,
    ) -> Result<RegionStats, GatewayError> {
        check_budget(scale, max_pixels)?;
        let url = self.url(&format!("projects/{}/value:compute", self.cloud_project));
        let body = reduce_expression(raster, region, reducers, scale, max_pixels);
        let resp: ComputeResponse =
            self.send_json("reduce_region", raster.key(), || self.http.post(&url).json(&body))?;
        match resp.result {
            Value::Object(obj) => Ok(RegionStats::from_json_object(&obj)),
            other => Err(GatewayError::Compute(format!(
                "reduce_region {}: expected an object, got {other}",
                raster.key()
            ))),
        }
    }
}
