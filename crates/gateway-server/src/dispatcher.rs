//! Request dispatcher.
//!
//! For each inbound request: resolve the route, serve from cache when the
//! request is eligible and a fresh entry exists, otherwise pick a backend,
//! forward a buffered copy of the request, report the outcome to the route's
//! load balancer, store cacheable 2xx responses and relay the backend's
//! response.

use crate::error::ApiError;
use crate::state::GatewayState;
use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, FromRequest, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use gateway_cache::{cache_key, CacheItem};
use gateway_config::RouteConfig;
use gateway_core::{GatewayError, GatewayResult};
use gateway_routing::should_cache;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Fallback handler proxying every request that matches a configured route
pub async fn dispatch(State(state): State<GatewayState>, request: Request) -> Response {
    let path = request.uri().path().to_owned();

    let Some(matched) = state.routes.match_path(&path) else {
        return ApiError::not_found(format!("no route for path: {path}")).into_response();
    };
    let route = Arc::clone(matched.route);
    let relative_path = matched.relative_path.to_owned();

    match proxy(&state, &route, &relative_path, request).await {
        Ok(response) => response,
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Run one request through the cache, the load balancer and the backend
async fn proxy(
    state: &GatewayState,
    route: &RouteConfig,
    relative_path: &str,
    request: Request,
) -> GatewayResult<Response> {
    let (parts, body) = request.into_parts();
    let mut buffered = Request::new(body);
    *buffered.extensions_mut() = parts.extensions.clone();
    let body = Bytes::from_request(buffered, &())
        .await
        .map_err(|rejection| body_error(&rejection, state.config.server.max_body_size))?;
    let query = parts.uri.query().unwrap_or("");

    // A cache manager only exists when caching is enabled globally
    let cacheable = should_cache(route, state.cache.is_some(), relative_path);
    let cache = state.cache.as_ref().filter(|_| cacheable);
    let key = cache.map(|_| {
        cache_key(
            &route.path,
            parts.method.as_str(),
            parts.uri.path(),
            query,
            &body,
        )
    });

    if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
        if let Some(item) = cache.get(key).await {
            debug!(route = %route.path, key = %key, "Serving response from cache");
            return Ok(cached_response(item));
        }
    }

    let balancer = state.balancer(route);
    let backend = balancer
        .next_backend()
        .ok_or_else(|| GatewayError::no_healthy_backend(&route.path))?;

    debug!(route = %route.path, backend = %backend, "Forwarding request");

    let started = Instant::now();
    let (status, headers, response_body) =
        match forward(state, route, &backend, relative_path, query, &parts, body).await {
            Ok(exchange) => exchange,
            Err(err) => {
                if err.is_backend_failure() {
                    balancer.report_failure(&backend);
                }
                return Err(err);
            }
        };
    balancer.report_success(&backend, started.elapsed());

    if status.is_success() {
        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            let item = CacheItem::from_response(response_body.to_vec(), &headers);
            cache.set(key, &item, route.cache_ttl).await;
        }
    }

    Ok(relay_response(status, headers, response_body))
}

/// Map a body read failure; the limit comes from the router's `DefaultBodyLimit`
fn body_error(rejection: &BytesRejection, limit: usize) -> GatewayError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::payload_too_large(limit)
    } else {
        GatewayError::request_body(rejection.body_text())
    }
}

/// Send a buffered copy of the request to `backend` and read the full response
async fn forward(
    state: &GatewayState,
    route: &RouteConfig,
    backend: &str,
    relative_path: &str,
    query: &str,
    parts: &Parts,
    body: Bytes,
) -> GatewayResult<(StatusCode, HeaderMap, Bytes)> {
    let url = backend_url(backend, relative_path, query)?;
    let headers = outbound_headers(route, &parts.headers);

    let response = state
        .client
        .request(parts.method.clone(), url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| GatewayError::backend_unreachable(backend, e.to_string()))?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|e| GatewayError::backend_protocol(backend, e.to_string()))?;

    debug!(backend = %backend, status = status.as_u16(), bytes = body.len(), "Backend responded");
    Ok((status, headers, body))
}

/// Join a backend base URL, the route-relative path and the query string
pub fn backend_url(backend: &str, relative_path: &str, query: &str) -> GatewayResult<Url> {
    let mut target = String::with_capacity(backend.len() + relative_path.len() + query.len() + 1);
    target.push_str(backend.trim_end_matches('/'));
    target.push_str(relative_path);
    if !query.is_empty() {
        target.push('?');
        target.push_str(query);
    }

    Url::parse(&target).map_err(|e| GatewayError::invalid_backend_url(backend, e.to_string()))
}

/// Inbound headers minus `Host` and `Content-Length`, then custom headers, then the UA override
fn outbound_headers(route: &RouteConfig, inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    for (name, value) in &route.custom_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(route = %route.path, header = %name, "Skipping invalid custom header"),
        }
    }

    if let Some(ua) = route.user_agent() {
        match HeaderValue::from_str(ua) {
            Ok(value) => {
                headers.insert(header::USER_AGENT, value);
            }
            Err(_) => warn!(route = %route.path, "Skipping invalid User-Agent override"),
        }
    }

    headers
}

/// Relay a backend response, dropping headers that describe the backend connection
fn relay_response(status: StatusCode, mut headers: HeaderMap, body: Bytes) -> Response {
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONNECTION);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn cached_response(item: CacheItem) -> Response {
    let headers = item.header_map();
    let (body, _) = item.into_parts();

    let mut response = Response::new(Body::from(body));
    *response.headers_mut() = headers;
    response
}
