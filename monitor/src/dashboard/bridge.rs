use anyhow::Context;
use skyripcore::prelude::GeoFence;
use std::future::Future;
use std::net::SocketAddr;
use warp::Filter;

use crate::dashboard::model::{
    DetectionsResponse, DeviceView, DevicesResponse, HealthResponse,
};
use crate::workflow::runner::SharedState;

/// Read-only view of the stores handed to the HTTP layer.
#[derive(Clone)]
pub struct DashboardBridge {
    state: SharedState,
    classifier: String,
    geofence: Option<GeoFence>,
    limit: usize,
}

impl DashboardBridge {
    pub fn new(
        state: SharedState,
        classifier: impl Into<String>,
        geofence: Option<GeoFence>,
        limit: usize,
    ) -> Self {
        Self {
            state,
            classifier: classifier.into(),
            geofence,
            limit: limit.max(1),
        }
    }

    pub fn detections(&self) -> DetectionsResponse {
        DetectionsResponse::from_events(&self.state.detections.latest(self.limit))
    }

    pub fn devices(&self) -> DevicesResponse {
        DevicesResponse {
            devices: self
                .state
                .devices
                .list()
                .iter()
                .map(DeviceView::from)
                .collect(),
        }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok",
            classifier: self.classifier.clone(),
            metrics: self.state.metrics.snapshot(),
            geofence: self.geofence,
        }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone + Send + Sync + 'static
    {
        let bridge = self.clone();
        let bridge_filter = warp::any().map(move || bridge.clone());

        let detections = warp::path!("api" / "detections")
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: DashboardBridge| warp::reply::json(&bridge.detections()));

        let devices = warp::path!("api" / "kismet")
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: DashboardBridge| warp::reply::json(&bridge.devices()));

        let health = warp::path!("api" / "health")
            .and(warp::get())
            .and(bridge_filter)
            .map(|bridge: DashboardBridge| warp::reply::json(&bridge.health()));

        detections.or(devices).or(health)
    }

    /// Binds `addr` and serves until `shutdown` resolves.
    pub fn serve(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<(SocketAddr, impl Future<Output = ()> + Send)> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .with_context(|| format!("binding dashboard API on {}", addr))?;
        Ok((bound, server))
    }
}
