//! HTTP exporter
//!
//! Serves the process image as JSON on `GET /processImage`.

use crate::config::WebConfig;
use crate::image::ProcessImageStore;
use anyhow::Context;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct WebExporter {
    store: Arc<ProcessImageStore>,
    config: WebConfig,
}

impl WebExporter {
    pub fn new(store: Arc<ProcessImageStore>, config: WebConfig) -> Self {
        Self { store, config }
    }

    /// Serve until the listener fails.
    pub async fn serve(self) -> anyhow::Result<()> {
        let address: SocketAddr = self
            .config
            .address
            .parse()
            .with_context(|| format!("invalid web address {}", self.config.address))?;

        let store = self.store;
        let log_requests = !self.config.disable_request_log;

        let make_svc = make_service_fn(move |conn: &AddrStream| {
            let store = store.clone();
            let remote = conn.remote_addr();
            async move {
                Ok::<_, Infallible>(service_fn(move |request| {
                    handle_request(request, store.clone(), remote, log_requests)
                }))
            }
        });

        log::info!("web exporter listening on http://{}", address);

        Server::try_bind(&address)
            .with_context(|| format!("failed to bind web exporter to {}", address))?
            .serve(make_svc)
            .await
            .context("web exporter failed")
    }
}

async fn handle_request(
    request: Request<Body>,
    store: Arc<ProcessImageStore>,
    remote: SocketAddr,
    log_requests: bool,
) -> Result<Response<Body>, Infallible> {
    let response = route(&request, &store);

    if log_requests {
        log::info!("web: [{}] {} {}", remote, request.method(), request.uri());
    }

    Ok(response)
}

fn route(request: &Request<Body>, store: &ProcessImageStore) -> Response<Body> {
    match request.uri().path() {
        "/processImage" => {
            if request.method() != Method::GET {
                return plain_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
            }
            process_image_response(store)
        }
        _ => plain_response(StatusCode::NOT_FOUND, "not found"),
    }
}

fn process_image_response(store: &ProcessImageStore) -> Response<Body> {
    let image = store.snapshot();

    match serde_json::to_vec(&image) {
        Ok(body) => {
            let response = Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .body(Body::from(body));
            match response {
                Ok(response) => response,
                Err(e) => {
                    log::error!("web: failed to build response: {}", e);
                    plain_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
                }
            }
        }
        Err(e) => {
            log::error!("web: failed to serialize process image: {}", e);
            plain_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn plain_response(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn store() -> Arc<ProcessImageStore> {
        let config: Config = serde_yaml::from_str(
            "web:\n  address: \"127.0.0.1:0\"\nmeters:\n  - id: \"a\"\n    address: \"10.0.0.1:2000\"\n",
        )
        .unwrap();
        Arc::new(ProcessImageStore::new(&config))
    }

    #[test]
    fn test_process_image_route() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/processImage")
            .body(Body::empty())
            .unwrap();

        let response = route(&request, &store());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "application/json"
        );
    }

    #[test]
    fn test_unknown_path_is_404() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/other")
            .body(Body::empty())
            .unwrap();

        assert_eq!(route(&request, &store()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_non_get_is_405() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/processImage")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            route(&request, &store()).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_unknown_path_wins_over_method() {
        // The path is resolved first: a POST to a bogus path is a 404.
        let request = Request::builder()
            .method(Method::POST)
            .uri("/bogus")
            .body(Body::empty())
            .unwrap();

        assert_eq!(route(&request, &store()).status(), StatusCode::NOT_FOUND);
    }
}
