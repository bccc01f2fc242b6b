//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod exam;
pub mod forward;
pub mod http;
pub mod qnet;
pub mod ws;

/// Build the application router with:
/// - WebSocket quiz sessions at `/ws`
/// - Q-Net XML proxy under `/api/qnet/...`
/// - normalized exam data under `/api/exam/...`
/// - OpenAI chat and study plans under `/api/openai/...`
/// - `/api/quiz`, `/api/rag`, `/api/pdf` and `/api/openai/chat-with-file`
///   forwarded to the RAG backend
/// - Static SPA from the static dir with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();
    let static_service = ServeDir::new(&static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(format!("{}/index.html", static_dir.trim_end_matches('/'))));

    let forwarded = Router::new()
        .route("/api/quiz/*rest", any(forward::forward))
        .route("/api/rag/*rest", any(forward::forward))
        .route("/api/pdf/*rest", any(forward::forward))
        .route("/api/openai/chat-with-file", post(forward::forward))
        .layer(DefaultBodyLimit::max(forward::FORWARD_BODY_LIMIT));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/health", get(http::http_health))
        .route("/api/qnet/pe-list", get(qnet::pe_list))
        .route("/api/qnet/mc-list", get(qnet::mc_list))
        .route("/api/qnet/e-list", get(qnet::e_list))
        .route("/api/qnet/c-list", get(qnet::c_list))
        .route("/api/qnet/fee-list", get(qnet::fee_list))
        .route("/api/qnet/jm-list", get(qnet::jm_list))
        .route("/api/qnet/qualification-list", get(qnet::qualification_list))
        .route("/api/exam/qualifications", get(exam::qualifications))
        .route("/api/exam/qualifications/:code", get(exam::qualification))
        .route("/api/exam/taxonomy", get(exam::taxonomy))
        .route("/api/exam/schedules", get(exam::schedules))
        .route("/api/openai/chat", post(http::http_post_chat))
        .route("/api/openai/generate-study-plan", post(http::http_post_study_plan))
        .merge(forwarded)
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        body::{to_bytes, Body},
        extract::Query,
        http::{HeaderMap, Method, Request, StatusCode, Uri},
        Json,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::{Prompts, QuizTuning, ServerConfig};
    use crate::error::AppError;
    use crate::openai::OpenAI;
    use crate::quiz::QuizSetup;
    use crate::quiz_backend::{GenerateFuture, QuizSource};

    struct NoQuiz;
    impl QuizSource for NoQuiz {
        fn generate(&self, _setup: QuizSetup) -> GenerateFuture {
            Box::pin(async { Err(AppError::QuizGeneration("disabled".into())) })
        }
    }

    fn app() -> (Router, tempfile::TempDir) {
        // Nothing listens here; any request that reaches the network fails.
        app_against("http://127.0.0.1:9", None)
    }

    /// Router whose Q-Net, RAG and (optionally) OpenAI upstreams live at `base`.
    fn app_against(base: &str, openai: Option<OpenAI>) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            qnet_test_info_api: format!("{base}/info"),
            qnet_qualification_api: format!("{base}/qual"),
            rag_backend_url: base.to_string(),
            cache_dir: dir.path().join("cache").to_string_lossy().into_owned(),
            static_dir: dir.path().to_string_lossy().into_owned(),
            ..ServerConfig::default()
        };
        let state = AppState::with_parts(config, Prompts::default(), QuizTuning::default(), openai, Arc::new(NoQuiz)).unwrap();
        (build_router(Arc::new(state)), dir)
    }

    /// Serve `upstream` on an ephemeral local port and return its base URL.
    async fn spawn_upstream(upstream: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn fake_openai(base: &str) -> OpenAI {
        OpenAI {
            client: reqwest::Client::new(),
            api_key: "sk-test".into(),
            base_url: format!("{base}/v1"),
            model: "gpt-test".into(),
        }
    }

    async fn raw(app: Router, req: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let ct = res
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, ct, bytes.to_vec())
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_services() {
        let (app, _dir) = app();
        let (status, body) = call(app, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["services"]["openai"], "disabled");
    }

    #[tokio::test]
    async fn jm_list_without_code_is_400() {
        let (app, _dir) = app();
        let (status, body) = call(app.clone(), get("/api/qnet/jm-list")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], crate::qnet::JM_CD_REQUIRED);

        let (status, _) = call(app.clone(), get("/api/qnet/fee-list?jmCd=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(app, get("/api/exam/schedules")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_validates_before_needing_openai() {
        let (app, _dir) = app();
        let (status, _) = call(app.clone(), post_json("/api/openai/chat", r#"{"messages":[]}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            app.clone(),
            post_json("/api/openai/chat", r#"{"messages":[{"role":"user","content":"안녕하세요"}]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);

        let (status, _) = call(app, post_json("/api/openai/generate-study-plan", r#"{"subject":"정보처리기사"}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn cached_qualifications_serve_lookup_and_taxonomy() {
        use crate::cache::{now_ms, ExamCache, QUALIFICATIONS_KEY};
        use crate::taxonomy::QualificationItem;

        let (app, dir) = app();
        let items = vec![QualificationItem {
            code: "1320".into(),
            name: "정보처리기사".into(),
            broad_field_code: "21".into(),
            broad_field_name: "정보통신".into(),
            mid_field_code: "211".into(),
            mid_field_name: "정보기술".into(),
        }];
        ExamCache::new(dir.path().join("cache"))
            .put(QUALIFICATIONS_KEY, &items, now_ms())
            .await
            .unwrap();

        let (status, body) = call(app.clone(), get("/api/exam/qualifications/1320")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["broadFieldName"], "정보통신");

        let (status, _) = call(app.clone(), get("/api/exam/qualifications/9999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(app, get("/api/exam/taxonomy?broad=21")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["midFields"][0]["code"], "211");
        assert_eq!(body["subjects"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_502() {
        let (app, _dir) = app();
        let (status, body) = call(app, get("/api/exam/qualifications")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
    }

    const GATEWAY_ERROR: &str = "<OpenAPI_ServiceResponse><cmmMsgHeader>\
        <errMsg>SERVICE ERROR</errMsg>\
        <returnAuthMsg>SERVICE_KEY_IS_NOT_REGISTERED_ERROR</returnAuthMsg>\
        <returnReasonCode>30</returnReasonCode>\
        </cmmMsgHeader></OpenAPI_ServiceResponse>";

    #[tokio::test]
    async fn gateway_error_envelope_is_502_and_not_cached() {
        let upstream = Router::new().route("/qual/getList", axum::routing::get(|| async { GATEWAY_ERROR }));
        let base = spawn_upstream(upstream).await;
        let (app, dir) = app_against(&base, None);

        let (status, body) = call(app.clone(), get("/api/exam/qualifications")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap_or_default().contains("30"));
        assert!(!dir.path().join("cache").join("qnet-qualifications.json").exists());

        let (status, _) = call(app, get("/api/exam/taxonomy")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn non_list_document_is_502() {
        let upstream = Router::new().route(
            "/qual/getList",
            axum::routing::get(|| async { "<html><body>maintenance</body></html>" }),
        );
        let base = spawn_upstream(upstream).await;
        let (app, dir) = app_against(&base, None);
        let (status, _) = call(app, get("/api/exam/qualifications")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!dir.path().join("cache").join("qnet-qualifications.json").exists());
    }

    #[tokio::test]
    async fn proxy_passes_upstream_status_and_bytes_through() {
        const BODY: &str = "<response><header><resultCode>99</resultCode>\
            <resultMsg>내부 오류</resultMsg></header></response>";
        let upstream = Router::new().route(
            "/info/getPEList",
            axum::routing::get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, BODY) }),
        );
        let base = spawn_upstream(upstream).await;
        let (app, _dir) = app_against(&base, None);

        let (status, ct, bytes) = raw(app, get("/api/qnet/pe-list?implYy=2025&implSeq=1")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(ct.unwrap_or_default().starts_with("application/xml"));
        assert_eq!(bytes, BODY.as_bytes());
    }

    async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> (StatusCode, Json<Value>) {
        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (
            StatusCode::CREATED,
            Json(json!({
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query(),
                "contentType": content_type,
                "body": body,
            })),
        )
    }

    #[tokio::test]
    async fn forwarded_routes_round_trip() {
        let upstream = Router::new()
            .route("/api/rag/chat", any(echo))
            .route("/api/pdf/delete-file/:name", any(echo))
            .route("/api/openai/chat-with-file", any(echo));
        let base = spawn_upstream(upstream).await;
        let (app, _dir) = app_against(&base, None);

        let req = Request::builder()
            .method("PUT")
            .uri("/api/rag/chat?k=3")
            .header("content-type", "text/plain; charset=utf-8")
            .body(Body::from("정보처리기사 요약"))
            .unwrap();
        let (status, body) = call(app.clone(), req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["method"], "PUT");
        assert_eq!(body["query"], "k=3");
        assert_eq!(body["contentType"], "text/plain; charset=utf-8");
        assert_eq!(body["body"], "정보처리기사 요약");

        let req = Request::builder()
            .method("DELETE")
            .uri("/api/pdf/delete-file/net.pdf")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app.clone(), req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["method"], "DELETE");
        assert_eq!(body["path"], "/api/pdf/delete-file/net.pdf");

        let (status, body) = call(
            app,
            post_json("/api/openai/chat-with-file", r#"{"message":"요약해줘","fileName":"net.pdf"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["path"], "/api/openai/chat-with-file");
        assert_eq!(body["contentType"], "application/json");
        assert_eq!(body["body"], r#"{"message":"요약해줘","fileName":"net.pdf"}"#);
    }

    const JM_LIST: &str = "<response><header><resultCode>00</resultCode><resultMsg>NORMAL SERVICE.</resultMsg></header>\
        <body><items>\
        <item><implYy>2024</implYy><implSeq>1</implSeq><description>2024년 정기 기사 1회</description><docExamDt>20240215</docExamDt></item>\
        <item><implYy>2025</implYy><implSeq>1</implSeq><description>2025년 정기 기사 1회</description><docExamDt>20250215</docExamDt></item>\
        </items></body></response>";

    async fn jm_list_only_by_code(Query(q): Query<HashMap<String, String>>) -> (StatusCode, &'static str) {
        if q.contains_key("implYy") || q.get("jmCd").map(String::as_str) != Some("1320") {
            return (StatusCode::BAD_REQUEST, "<error/>");
        }
        (StatusCode::OK, JM_LIST)
    }

    #[tokio::test]
    async fn schedules_ask_by_code_and_keep_the_requested_year() {
        let upstream = Router::new().route("/info/getJMList", axum::routing::get(jm_list_only_by_code));
        let base = spawn_upstream(upstream).await;
        let (app, dir) = app_against(&base, None);

        let (status, body) = call(app, get("/api/exam/schedules?jmCd=1320&year=2025")).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().cloned().unwrap_or_default();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "2025년 정기 기사 1회");
        assert_eq!(rows[0]["record"]["implYy"], "2025");
        assert!(dir.path().join("cache").join("qnet-schedule-1320-2025.json").exists());
    }

    #[tokio::test]
    async fn subject_to_study_plan() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let upstream = Router::new()
            .route("/info/getJMList", axum::routing::get(jm_list_only_by_code))
            .route(
                "/v1/chat/completions",
                post(move |Json(req): Json<Value>| {
                    let seen = seen.clone();
                    async move {
                        seen.fetch_add(1, Ordering::SeqCst);
                        let prompt = req["messages"][1]["content"].as_str().unwrap_or_default().to_string();
                        let plan = if prompt.contains("필기시험까지 남은 기간: 45일") { "1주차: 데이터베이스" } else { "" };
                        Json(json!({ "choices": [{ "message": { "content": plan } }] }))
                    }
                }),
            );
        let base = spawn_upstream(upstream).await;
        let (app, _dir) = app_against(&base, Some(fake_openai(&base)));

        let (_, sittings) = call(app.clone(), get("/api/exam/schedules?jmCd=1320&year=2025")).await;
        let record = sittings[0]["record"].clone();
        let req = json!({ "subject": "정보처리기사", "exam_schedule": record, "start_date": "2025-01-01" });
        let (status, body) = call(app, post_json("/api/openai/generate-study-plan", &req.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["study_plan"], "1주차: 데이터베이스");
        assert_eq!(body["exam_schedule"]["docExamDt"], "20250215");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
