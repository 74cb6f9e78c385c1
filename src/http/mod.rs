//! # HTTP module
//!
//! This module provides the minimal liveness/metrics surface the host
//! process needs for a pod readiness probe, even though the reconciliation
//! engine itself doesn't mandate a shape for one. Its lifecycle is owned by
//! the host binary, not by [`crate::operator::Operator`].

#[cfg(feature = "metrics")]
pub mod metrics;

use std::{convert::Infallible, net::SocketAddr};

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to bind the liveness/metrics server to '{0}', {1}")]
    Bind(SocketAddr, hyper::Error),
    #[error("liveness/metrics server terminated unexpectedly, {0}")]
    Serve(hyper::Error),
}

/// Answers `GET /healthz` with 204 until `cancel` fires, and, behind the
/// `metrics` feature, `GET /metrics` with Prometheus-formatted counters.
/// Returns once `cancel` fires and the server has drained in-flight
/// requests.
pub async fn serve(listen: SocketAddr, cancel: CancellationToken) -> Result<(), Error> {
    let make_service = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(route)) });

    let server = Server::try_bind(&listen)
        .map_err(|err| Error::Bind(listen, err))?
        .serve(make_service)
        .with_graceful_shutdown(cancel.cancelled_owned());

    tracing::info!(%listen, "liveness/metrics server listening");

    server.await.map_err(Error::Serve)
}

async fn route(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/healthz") => Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Body::empty())
            .expect("a static response to always build"),

        #[cfg(feature = "metrics")]
        (&Method::GET, "/metrics") => metrics::render(),

        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .expect("a static response to always build"),
    };

    Ok(response)
}
