use crate::dispatcher::Dispatcher;
use crate::errors::{Outcome, UserplaneError, classify};
use crate::handler::{HandlerRequest, Reply};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::ext::ReasonPhrase;
use hyper::header::{CONTENT_TYPE, COOKIE, HeaderMap};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::Value;
use shared::http::make_boxed_error_response;
use shared::{gauge, histogram};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub type ServiceBody = BoxBody<Bytes, UserplaneError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Largest POST/PATCH body read into memory
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Holds one slot of `requests.inflight` until dropped.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

/// HTTP front of the gateway.
///
/// Every request is answered with a JSON body carrying `result` and a status
/// line whose reason phrase comes from the outcome classification.
#[derive(Clone)]
pub struct UserplaneService {
    dispatcher: Arc<Dispatcher>,
}

impl UserplaneService {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub async fn serve<B>(&self, request: Request<B>) -> Response<ServiceBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let start = Instant::now();
        let _inflight = InflightGuard::new();

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let (handler, result) = self.dispatch(request).await;
        let response = into_response(result);

        tracing::debug!(
            method = %method,
            path = %path,
            handler = handler,
            status = %response.status(),
            "Request completed"
        );
        histogram!(REQUEST_DURATION,
            "handler" => handler,
            "status" => response.status().as_str().to_string())
        .record(start.elapsed().as_secs_f64());

        response
    }

    async fn dispatch<B>(&self, request: Request<B>) -> (&'static str, Result<Reply, Outcome>)
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());

        let route = match self
            .dispatcher
            .resolve(&parts.method, content_type, parts.uri.path())
        {
            Ok(route) => route,
            Err(outcome) => {
                tracing::warn!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    outcome = ?outcome,
                    "Request not dispatched"
                );
                return ("none", Err(outcome));
            }
        };
        let handler = route.handler.name();

        let body = match read_json_body(&parts.method, body).await {
            Ok(body) => body,
            Err(outcome) => return (handler, Err(outcome)),
        };

        let request = HandlerRequest {
            id: route.id,
            query: parse_query(parts.uri.query()),
            cookies: parse_cookies(&parts.headers),
            body,
        };
        (handler, route.handler.handle(request).await)
    }
}

impl Service<Request<Incoming>> for UserplaneService {
    type Response = Response<ServiceBody>;
    type Error = UserplaneError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.serve(req).await) })
    }
}

/// POST and PATCH carry a JSON document of at most [`MAX_BODY_BYTES`]; other
/// methods are read without a body.
async fn read_json_body<B>(method: &Method, body: B) -> Result<Option<Value>, Outcome>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    if *method != Method::POST && *method != Method::PATCH {
        return Ok(None);
    }

    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Failed to read request body");
            Outcome::ParsingJsonBody
        })?
        .to_bytes();

    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        tracing::warn!(error = %e, "Request body is not valid JSON");
        Outcome::ParsingJsonBody
    })
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Collects `name=value` pairs from every `Cookie` header.
fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

fn into_response(result: Result<Reply, Outcome>) -> Response<ServiceBody> {
    let (outcome, mut reply) = match result {
        Ok(reply) => (Outcome::Ok, reply),
        Err(outcome) => (outcome, Reply::new()),
    };
    let classification = classify(outcome);
    reply.insert(
        "result".to_string(),
        Value::String(classification.result.to_string()),
    );

    let bytes = match serde_json::to_vec(&reply) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            return make_boxed_error_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Response::builder()
        .status(classification.status)
        .header(CONTENT_TYPE, "application/json")
        .extension(ReasonPhrase::from_static(classification.reason.as_bytes()))
        .body(Full::new(bytes).map_err(|e| match e {}).boxed())
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build response");
            make_boxed_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::userplanes_dispatcher;
    use crate::backend::Backend;
    use crate::config::TacEncoding;
    use crate::testutils::{
        FakeControlPlane, accepted, created, listing, pgw_item, rejected, sgw_item,
        userplane_body,
    };
    use hyper::body::Frame;
    use hyper::header::HeaderValue;
    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::task::{Context, Poll, Waker};

    /// Body that never yields a frame, like a client that stopped sending
    struct StalledBody;

    impl Body for StalledBody {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            Poll::Pending
        }
    }

    #[derive(Default)]
    struct InflightValue(Mutex<f64>);

    impl InflightValue {
        fn get(&self) -> f64 {
            *self.0.lock().unwrap()
        }
    }

    impl GaugeFn for InflightValue {
        fn increment(&self, value: f64) {
            *self.0.lock().unwrap() += value;
        }

        fn decrement(&self, value: f64) {
            *self.0.lock().unwrap() -= value;
        }

        fn set(&self, value: f64) {
            *self.0.lock().unwrap() = value;
        }
    }

    /// Routes `requests.inflight` into an [`InflightValue`]; everything else is dropped.
    struct InflightRecorder(Arc<InflightValue>);

    impl Recorder for InflightRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            if key.name() == REQUESTS_INFLIGHT.name {
                Gauge::from_arc(self.0.clone())
            } else {
                Gauge::noop()
            }
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    fn test_service(fake: &Arc<FakeControlPlane>) -> UserplaneService {
        UserplaneService::new(userplanes_dispatcher(
            "/",
            fake.clone(),
            TacEncoding::Integer,
        ))
    }

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn send(
        service: &UserplaneService,
        request: Request<Full<Bytes>>,
    ) -> (StatusCode, String, Value) {
        let response = service.serve(request).await;
        let status = response.status();
        let reason = response
            .extensions()
            .get::<ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
            .unwrap_or_default();
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, reason, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_add_userplane() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.reply(Backend::Pgw, created("5"))
            .reply(Backend::Sgw, created("5"));
        let service = test_service(&fake);

        let body = userplane_body("SAEGWU").to_string();
        let (status, reason, json) = send(&service, request(Method::POST, "/userplanes", &body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reason, "OK. Operation Successful");
        assert_eq!(json, json!({"id": "5", "result": "OK"}));
    }

    #[tokio::test]
    async fn test_add_refused() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.reply(Backend::Pgw, rejected());
        let service = test_service(&fake);

        let body = userplane_body("PGWU").to_string();
        let (status, reason, json) = send(&service, request(Method::POST, "/userplanes", &body)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reason, "Added Userplane");
        assert_eq!(json, json!({"result": "ADDED_USERPLANE"}));
    }

    #[tokio::test]
    async fn test_request_shape_errors() {
        let fake = Arc::new(FakeControlPlane::new());
        let service = test_service(&fake);

        // Not JSON
        let (status, _, json) = send(&service, request(Method::POST, "/userplanes", "{")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["result"], "BadRequest");

        // Valid JSON, not an object
        let (status, _, json) = send(&service, request(Method::POST, "/userplanes", "[]")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["result"], "ParameterInvalid");

        // Wrong content type
        let mut req = request(Method::POST, "/userplanes", "{}");
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let (status, reason, json) = send(&service, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reason, "Bad Request");
        assert_eq!(json["result"], "BadRequest");

        // Unsupported method
        let (status, _, json) = send(&service, request(Method::PUT, "/userplanes/5", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["result"], "BadRequest");

        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_paths() {
        let fake = Arc::new(FakeControlPlane::new());
        let service = test_service(&fake);

        for path in ["/userplanes/5/xxx", "/userplanes/", "/sessions"] {
            let (status, reason, json) = send(&service, request(Method::GET, path, "")).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
            assert_eq!(reason, "Not Found");
            assert_eq!(json, json!({"result": "404 not found"}));
        }
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_userplane() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.reply(Backend::Pgw, listing(vec![pgw_item("5", "1234")]))
            .reply(Backend::Sgw, listing(vec![sgw_item("5", "1234")]));
        let service = test_service(&fake);

        let (status, _, json) = send(&service, request(Method::GET, "/userplanes/5", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], "5");
        assert_eq!(json["result"], "OK");
        assert_eq!(json["config"]["s5u_pgw"]["up_ip_address"], "192.168.120.122");
    }

    #[tokio::test]
    async fn test_get_tac_mismatch() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.reply(Backend::Pgw, listing(vec![pgw_item("5", "1234")]))
            .reply(Backend::Sgw, listing(vec![sgw_item("5", "4321")]));
        let service = test_service(&fake);

        let (status, reason, json) = send(&service, request(Method::GET, "/userplanes/5", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reason, "Internal Software Error");
        assert_eq!(json, json!({"result": "INTERNAL_SOFTWARE_ERROR"}));
    }

    #[tokio::test]
    async fn test_list_backend_down() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.fail(Backend::Pgw);
        let service = test_service(&fake);

        let (status, reason, json) = send(&service, request(Method::GET, "/userplanes", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reason, "EPC CP Connect Error");
        assert_eq!(json["result"], "EPC CP Connect failure");
    }

    #[tokio::test]
    async fn test_patch_and_delete() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.reply(Backend::Sgw, accepted())
            .reply(Backend::Pgw, accepted())
            .reply(Backend::Sgw, rejected());
        let service = test_service(&fake);

        let body = json!({"function": "SGWU", "config": {"s1u": {"up_ip_address": "10.0.0.1"}}});
        let (status, _, json) = send(
            &service,
            request(Method::PATCH, "/userplanes/5", &body.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"result": "OK"}));

        let (status, reason, json) = send(&service, request(Method::DELETE, "/userplanes/5", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(reason, "Userplane not found");
        assert_eq!(json["result"], "USERPLANE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let fake = Arc::new(FakeControlPlane::new());
        let service = test_service(&fake);

        let body = format!(r#"{{"uuid": "{}"}}"#, "x".repeat(MAX_BODY_BYTES));
        let (status, reason, json) = send(&service, request(Method::POST, "/userplanes", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reason, "Bad Request");
        assert_eq!(json, json!({"result": "BadRequest"}));
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_inflight_released_when_request_dropped() {
        let fake = Arc::new(FakeControlPlane::new());
        let service = test_service(&fake);
        let inflight = Arc::new(InflightValue::default());
        let recorder = InflightRecorder(inflight.clone());

        metrics::with_local_recorder(&recorder, || {
            let request = Request::builder()
                .method(Method::POST)
                .uri("/userplanes")
                .header(CONTENT_TYPE, "application/json")
                .body(StalledBody)
                .unwrap();
            let mut serving = Box::pin(service.serve(request));

            let mut cx = Context::from_waker(Waker::noop());
            assert!(serving.as_mut().poll(&mut cx).is_pending());
            assert_eq!(inflight.get(), 1.0);

            // Connection closed while the body was still being read
            drop(serving);
            assert_eq!(inflight.get(), 0.0);
        });
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_parse_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("session=abc; theme = dark;"));
        headers.append(COOKIE, HeaderValue::from_static("lang=en;invalid"));

        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies["session"], "abc");
        assert_eq!(cookies["theme"], "dark");
        assert_eq!(cookies["lang"], "en");
    }

    #[test]
    fn test_parse_query() {
        let query = parse_query(Some("limit=10&name=a%20b"));
        assert_eq!(query["limit"], "10");
        assert_eq!(query["name"], "a b");
        assert!(parse_query(None).is_empty());
    }
}
