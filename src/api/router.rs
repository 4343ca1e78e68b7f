//! Clinic API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS + response headers → 2. Audit logger → 3. Auth validator

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the clinic API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    use endpoints::{
        auth, centers, dashboard, followups, histories, lab_staff, patients, prescriptions,
        superadmin_staff as staff, test_requests as tr, users,
    };

    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Audit → Auth (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        // Centers
        .route("/centers", get(centers::list).post(centers::create))
        .route(
            "/centers/:id",
            get(centers::detail)
                .put(centers::update)
                .delete(centers::remove),
        )
        // Center staff
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/:id",
            get(users::detail).put(users::update).delete(users::remove),
        )
        // Superadmin staff
        .route(
            "/superadmin/doctors",
            get(staff::list_doctors).post(staff::create_doctor),
        )
        .route(
            "/superadmin/doctors/:id",
            get(staff::get_doctor)
                .put(staff::update_doctor)
                .delete(staff::delete_doctor),
        )
        .route(
            "/superadmin/receptionists",
            get(staff::list_receptionists).post(staff::create_receptionist),
        )
        .route(
            "/superadmin/receptionists/:id",
            get(staff::get_receptionist)
                .put(staff::update_receptionist)
                .delete(staff::delete_receptionist),
        )
        // Lab staff
        .route("/lab-staff", get(lab_staff::list).post(lab_staff::create))
        .route(
            "/lab-staff/:id",
            get(lab_staff::detail)
                .put(lab_staff::update)
                .delete(lab_staff::remove),
        )
        // Patients
        .route("/patients", get(patients::list).post(patients::create))
        .route(
            "/patients/:id",
            get(patients::detail)
                .put(patients::update)
                .delete(patients::remove),
        )
        .route("/patients/:id/tests", post(patients::add_test))
        // Test requests
        .route("/test-requests", get(tr::list).post(tr::create))
        .route(
            "/test-requests/:id",
            get(tr::detail).put(tr::update).delete(tr::remove),
        )
        .route("/test-requests/:id/assign", post(tr::assign))
        .route(
            "/test-requests/:id/schedule-collection",
            post(tr::schedule_collection),
        )
        .route("/test-requests/:id/collect-sample", post(tr::collect_sample))
        .route("/test-requests/:id/start-testing", post(tr::start_testing))
        .route(
            "/test-requests/:id/complete-testing",
            post(tr::complete_testing),
        )
        .route(
            "/test-requests/:id/generate-report",
            post(tr::generate_report),
        )
        .route("/test-requests/:id/send-report", post(tr::send_report))
        .route("/test-requests/:id/complete", post(tr::complete))
        .route("/test-requests/:id/cancel", post(tr::cancel))
        .route("/test-requests/:id/billing", post(tr::generate_bill))
        .route("/test-requests/:id/billing/paid", post(tr::mark_paid))
        .route("/test-requests/:id/report", get(tr::download_report))
        // Clinical records
        .route(
            "/prescriptions",
            get(prescriptions::list).post(prescriptions::create),
        )
        .route(
            "/prescriptions/:id",
            get(prescriptions::detail)
                .put(prescriptions::update)
                .delete(prescriptions::remove),
        )
        .route("/histories", get(histories::list).post(histories::create))
        .route(
            "/histories/:id",
            get(histories::detail)
                .put(histories::update)
                .delete(histories::remove),
        )
        .route("/followups", get(followups::list).post(followups::create))
        .route(
            "/followups/:id",
            get(followups::detail)
                .put(followups::update)
                .delete(followups::remove),
        )
        // Dashboards
        .route("/dashboard/superadmin", get(dashboard::superadmin))
        .route("/dashboard/center", get(dashboard::center))
        .route("/dashboard/lab", get(dashboard::lab))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last). Audit wraps
        // auth so rejected tokens are logged too.
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (no auth required)
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/login", post(auth::login))
        .route("/auth/bootstrap", post(auth::bootstrap))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::AuthContext;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Duration;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &[u8] = b"router-test-secret-0123456789";

    struct TestApp {
        core: Arc<CoreState>,
        router: Router,
        _tmp: tempfile::TempDir,
    }

    fn test_app() -> TestApp {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::new(
            tmp.path().join("clinic.db"),
            tmp.path().join("uploads").join("reports"),
            SECRET,
            Duration::hours(1),
        ));
        let router = api_router(core.clone());
        TestApp {
            core,
            router,
            _tmp: tmp,
        }
    }

    fn make_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn call(
        app: &TestApp,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = app
            .router
            .clone()
            .oneshot(make_request(method, uri, token, body))
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn bootstrap(app: &TestApp) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/auth/bootstrap",
            None,
            Some(json!({"name": "Root", "email": "root@clinic.test", "password": "root-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    async fn login(app: &TestApp, email: &str, password: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Create a center with its admin and return (center_id, admin_token).
    async fn center_with_admin(app: &TestApp, root: &str, code: &str) -> (String, String) {
        let admin_email = format!("admin-{}@clinic.test", code.to_lowercase());
        let (status, body) = call(
            app,
            "POST",
            "/api/centers",
            Some(root),
            Some(json!({
                "name": format!("Center {code}"),
                "code": code,
                "admin": {"name": "Admin", "email": admin_email, "password": "admin-password"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "center create failed: {body}");
        let center_id = body["id"].as_str().unwrap().to_string();
        let token = login(app, &admin_email, "admin-password").await;
        (center_id, token)
    }

    async fn create_patient(app: &TestApp, token: &str, name: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/patients",
            Some(token),
            Some(json!({"name": name, "gender": "female", "age": 30, "phone": "9000000000"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "patient create failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_doctor(app: &TestApp, admin: &str, email: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/users",
            Some(admin),
            Some(json!({"name": "Dr. Rao", "email": email, "password": "doctor-password", "role": "doctor"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "doctor create failed: {body}");
        login(app, email, "doctor-password").await
    }

    async fn create_lab_staff(app: &TestApp, root: &str, email: &str) -> (String, String) {
        let (status, body) = call(
            app,
            "POST",
            "/api/lab-staff",
            Some(root),
            Some(json!({"name": "Lab Tech", "email": email, "password": "lab-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();
        (id, login(app, email, "lab-password").await)
    }

    async fn create_test_request(app: &TestApp, doctor: &str, patient_id: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/test-requests",
            Some(doctor),
            Some(json!({"patient_id": patient_id, "test_type": "Skin prick test"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "test request failed: {body}");
        assert_eq!(body["status"], "Pending");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = test_app();
        let (status, body) = call(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);
    }

    #[tokio::test]
    async fn protected_route_requires_token() {
        let app = test_app();
        let (status, body) = call(&app, "GET", "/api/patients", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = call(&app, "GET", "/api/patients", Some("not.a.jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bootstrap_only_once() {
        let app = test_app();
        bootstrap(&app).await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/bootstrap",
            None,
            Some(json!({"name": "Second", "email": "second@clinic.test", "password": "second-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn login_token_subject_matches_user() {
        let app = test_app();
        bootstrap(&app).await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ROOT@clinic.test", "password": "root-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap();
        let claims = app.core.tokens().verify(token).unwrap();
        assert_eq!(claims.sub.to_string(), body["account"]["id"].as_str().unwrap());
        assert!(body["account"].get("password_hash").is_none());

        let (status, me) = call(&app, "GET", "/api/auth/me", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["role"], "superadmin");
    }

    #[tokio::test]
    async fn wrong_password_is_401() {
        let app = test_app();
        bootstrap(&app).await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "root@clinic.test", "password": "wrong-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn token_for_deleted_account_rejected() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, lab_token) = create_lab_staff(&app, &root, "gone@lab.test").await;
        let (status, list) = call(&app, "GET", "/api/lab-staff", Some(&root), None).await;
        assert_eq!(status, StatusCode::OK);
        let id = list[0]["id"].as_str().unwrap();
        let (status, _) = call(&app, "DELETE", &format!("/api/lab-staff/{id}"), Some(&root), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, "GET", "/api/dashboard/lab", Some(&lab_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn patient_missing_field_is_400_and_not_persisted() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/patients",
            Some(&admin),
            Some(json!({"name": "No Phone", "gender": "male", "age": 40})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "phone is required");

        let (status, list) = call(&app, "GET", "/api/patients", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn missing_test_request_is_404() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let uri = format!("/api/test-requests/{}", Uuid::new_v4());
        let (status, body) = call(&app, "GET", &uri, Some(&root), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn patient_search_and_partial_update() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;
        let id = create_patient(&app, &admin, "Asha Verma").await;
        create_patient(&app, &admin, "Ravi Kumar").await;

        let (_, found) = call(&app, "GET", "/api/patients?search=asha", Some(&admin), None).await;
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (status, updated) = call(
            &app,
            "PUT",
            &format!("/api/patients/{id}"),
            Some(&admin),
            Some(json!({"age": 31})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["age"], 31);
        assert_eq!(updated["name"], "Asha Verma");

        let (status, with_test) = call(
            &app,
            "POST",
            &format!("/api/patients/{id}/tests"),
            Some(&admin),
            Some(json!({"test_name": "Serum IgE", "date": "2025-04-01", "result": "High"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(with_test["tests"][0]["test_name"], "Serum IgE");
    }

    #[tokio::test]
    async fn center_user_cannot_read_other_center_patient() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin_a) = center_with_admin(&app, &root, "CA").await;
        let (_, admin_b) = center_with_admin(&app, &root, "CB").await;
        let patient = create_patient(&app, &admin_a, "Center A Patient").await;

        let uri = format!("/api/patients/{patient}");
        let (status, body) = call(&app, "GET", &uri, Some(&admin_b), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (_, list) = call(&app, "GET", "/api/patients", Some(&admin_b), None).await;
        assert_eq!(list.as_array().unwrap().len(), 0);

        let (status, _) = call(&app, "GET", &uri, Some(&root), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn deleting_center_deletes_its_admin() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (center_id, admin) = center_with_admin(&app, &root, "DEL").await;

        let uri = format!("/api/centers/{center_id}");
        let (status, _) = call(&app, "DELETE", &uri, Some(&root), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, "GET", &uri, Some(&root), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, users) = call(&app, "GET", "/api/users?role=centeradmin", Some(&root), None).await;
        assert_eq!(users.as_array().unwrap().len(), 0);
        let (status, _) = call(&app, "GET", "/api/auth/me", Some(&admin), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_center_code_is_409() {
        let app = test_app();
        let root = bootstrap(&app).await;
        center_with_admin(&app, &root, "DUP").await;
        let (status, _) = call(
            &app,
            "POST",
            "/api/centers",
            Some(&root),
            Some(json!({"name": "Other", "code": "dup"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn non_superadmin_cannot_manage_centers() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;
        let (status, _) = call(&app, "GET", "/api/centers", Some(&admin), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_transition_is_409_and_unchanged() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;
        let doctor = create_doctor(&app, &admin, "doc@c1.test").await;
        let patient = create_patient(&app, &admin, "Asha").await;
        let id = create_test_request(&app, &doctor, &patient).await;

        let uri = format!("/api/test-requests/{id}/send-report");
        let (status, body) = call(&app, "POST", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (_, req) = call(&app, "GET", &format!("/api/test-requests/{id}"), Some(&admin), None).await;
        assert_eq!(req["status"], "Pending");
    }

    #[tokio::test]
    async fn reassignment_last_write_wins() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;
        let doctor = create_doctor(&app, &admin, "doc@c1.test").await;
        let (lab_a, _) = create_lab_staff(&app, &root, "a@lab.test").await;
        let (lab_b, lab_b_token) = create_lab_staff(&app, &root, "b@lab.test").await;
        let patient = create_patient(&app, &admin, "Asha").await;
        let id = create_test_request(&app, &doctor, &patient).await;

        let uri = format!("/api/test-requests/{id}/assign");
        for lab in [&lab_a, &lab_b] {
            let (status, _) = call(&app, "POST", &uri, Some(&admin), Some(json!({"lab_staff_id": lab}))).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, req) = call(&app, "GET", &format!("/api/test-requests/{id}"), Some(&admin), None).await;
        assert_eq!(req["status"], "Assigned");
        assert_eq!(req["assigned_lab_staff_id"], lab_b.as_str());

        let (_, mine) = call(&app, "GET", "/api/test-requests", Some(&lab_b_token), None).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn full_workflow_with_billing_and_report() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;
        let doctor = create_doctor(&app, &admin, "doc@c1.test").await;
        let (lab_id, lab) = create_lab_staff(&app, &root, "tech@lab.test").await;
        let (_, other_lab) = create_lab_staff(&app, &root, "other@lab.test").await;
        let patient = create_patient(&app, &admin, "Asha Verma").await;
        let id = create_test_request(&app, &doctor, &patient).await;
        let step = |name: &str| format!("/api/test-requests/{id}/{name}");

        let (status, _) = call(&app, "POST", &step("assign"), Some(&admin), Some(json!({"lab_staff_id": lab_id}))).await;
        assert_eq!(status, StatusCode::OK);

        // Only the assigned lab staff may work the request.
        let (status, _) = call(&app, "POST", &step("schedule-collection"), Some(&other_lab), Some(json!({"date": "2025-05-02"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, req) = call(
            &app,
            "POST",
            &step("schedule-collection"),
            Some(&lab),
            Some(json!({"date": "2025-05-02", "time_slot": "09:00-10:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(req["collection"]["time_slot"], "09:00-10:00");

        for name in ["collect-sample", "start-testing"] {
            let (status, _) = call(&app, "POST", &step(name), Some(&lab), None).await;
            assert_eq!(status, StatusCode::OK, "{name}");
        }

        let (status, _) = call(&app, "POST", &step("complete-testing"), Some(&lab), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, req) = call(
            &app,
            "POST",
            &step("complete-testing"),
            Some(&lab),
            Some(json!({"results": "Dust mite 6mm", "conclusion": "Sensitised"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(req["status"], "Testing_Completed");

        let (status, req) = call(&app, "POST", &step("generate-report"), Some(&lab), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(req["status"], "Report_Generated");
        assert!(req["report_file"].as_str().unwrap().starts_with("report-"));

        // Unpaid bill blocks delivery.
        let (status, _) = call(&app, "POST", &step("send-report"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = call(&app, "POST", &step("billing/paid"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, req) = call(
            &app,
            "POST",
            &step("billing"),
            Some(&admin),
            Some(json!({"items": [{"description": "Skin prick panel", "amount": 150000}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(req["billing"]["status"], "generated");
        assert!(req["billing"]["invoice_number"].as_str().unwrap().starts_with("INV-"));

        let (status, _) = call(&app, "POST", &step("billing/paid"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, req) = call(&app, "POST", &step("send-report"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(req["status"], "Report_Sent");

        let (status, req) = call(&app, "POST", &step("complete"), Some(&doctor), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(req["status"], "Completed");

        let (status, _) = call(&app, "POST", &step("cancel"), Some(&doctor), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let response = app
            .router
            .clone()
            .oneshot(make_request("GET", &step("report"), Some(&admin), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/pdf");
        assert!(response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .starts_with("attachment;"));
        let bytes = to_bytes(response.into_body(), 10 * 1024 * 1024).await.unwrap();
        assert_eq!(&bytes[0..4], b"%PDF");

        let (status, dash) = call(&app, "GET", "/api/dashboard/superadmin", Some(&root), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dash["test_requests_by_status"]["Completed"], 1);
        assert_eq!(dash["billing"]["revenue"], 150000);

        let (status, lab_dash) = call(&app, "GET", "/api/dashboard/lab", Some(&lab), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(lab_dash["assigned"], 1);
        assert_eq!(lab_dash["open"], 0);
    }

    #[tokio::test]
    async fn cancel_records_reason() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;
        let doctor = create_doctor(&app, &admin, "doc@c1.test").await;
        let patient = create_patient(&app, &admin, "Asha").await;
        let id = create_test_request(&app, &doctor, &patient).await;

        let (status, req) = call(
            &app,
            "POST",
            &format!("/api/test-requests/{id}/cancel"),
            Some(&doctor),
            Some(json!({"reason": "Duplicate order"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(req["status"], "Cancelled");
        assert_eq!(req["notes"], "Cancelled: Duplicate order");

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/test-requests/{id}/billing"),
            Some(&admin),
            Some(json!({"items": [{"description": "Panel", "amount": 100}]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn clinical_records_round_trip() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;
        let doctor = create_doctor(&app, &admin, "doc@c1.test").await;
        let patient = create_patient(&app, &admin, "Asha").await;

        let (status, rx) = call(
            &app,
            "POST",
            "/api/prescriptions",
            Some(&doctor),
            Some(json!({
                "patient_id": patient,
                "visit": "Visit 1",
                "medications": [{"drug_name": "Cetirizine", "dose": "10mg", "duration": "14 days"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(rx["medications"][0]["drug_name"], "Cetirizine");

        let (status, _) = call(&app, "GET", "/api/prescriptions", Some(&doctor), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, list) = call(&app, "GET", &format!("/api/prescriptions?patient_id={patient}"), Some(&doctor), None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, history) = call(
            &app,
            "POST",
            "/api/histories",
            Some(&doctor),
            Some(json!({"patient_id": patient, "chief_complaint": "Sneezing", "allergies": "Dust"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let history_id = history["id"].as_str().unwrap();
        let (_, updated) = call(
            &app,
            "PUT",
            &format!("/api/histories/{history_id}"),
            Some(&doctor),
            Some(json!({"notes": "Seasonal"})),
        )
        .await;
        assert_eq!(updated["notes"], "Seasonal");
        assert_eq!(updated["chief_complaint"], "Sneezing");

        let (status, followup) = call(
            &app,
            "POST",
            "/api/followups",
            Some(&doctor),
            Some(json!({
                "patient_id": patient,
                "kind": "allergic_rhinitis",
                "details": {"sneezing": 2, "nasal_block": 1}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(followup["details"]["sneezing"], 2);

        let (status, _) = call(
            &app,
            "POST",
            "/api/followups",
            Some(&doctor),
            Some(json!({"patient_id": patient, "kind": "unknown_kind"})),
        )
        .await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn deactivated_lab_staff_locked_out() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (lab_id, lab) = create_lab_staff(&app, &root, "tech@lab.test").await;

        let (status, _) = call(&app, "GET", "/api/dashboard/lab", Some(&lab), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, member) = call(
            &app,
            "PUT",
            &format!("/api/lab-staff/{lab_id}"),
            Some(&root),
            Some(json!({"is_active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(member["is_active"], false);

        let (status, _) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "tech@lab.test", "password": "lab-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, "GET", "/api/dashboard/lab", Some(&lab), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_email_login_is_401() {
        let app = test_app();
        bootstrap(&app).await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "nobody@clinic.test", "password": "root-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn superadmin_files_request_for_named_doctor() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;
        let doctor = create_doctor(&app, &admin, "doc@c1.test").await;
        let patient = create_patient(&app, &admin, "Asha Verma").await;
        let (_, doctor_me) = call(&app, "GET", "/api/auth/me", Some(&doctor), None).await;
        let (_, admin_me) = call(&app, "GET", "/api/auth/me", Some(&admin), None).await;
        let file = |doctor_id: Option<&Value>| {
            let mut body = json!({"patient_id": patient, "test_type": "Serum IgE"});
            if let Some(id) = doctor_id {
                body["doctor_id"] = id.clone();
            }
            body
        };

        let (status, _) = call(&app, "POST", "/api/test-requests", Some(&root), Some(file(None))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = json!(Uuid::new_v4());
        let (status, _) = call(&app, "POST", "/api/test-requests", Some(&root), Some(file(Some(&unknown)))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            call(&app, "POST", "/api/test-requests", Some(&root), Some(file(Some(&admin_me["id"])))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, req) =
            call(&app, "POST", "/api/test-requests", Some(&root), Some(file(Some(&doctor_me["id"])))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(req["doctor_id"], doctor_me["id"]);

        let conn = app.core.open_db().unwrap();
        let stored = crate::db::repository::list_test_requests(&conn, &Default::default()).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn auth_context_reaches_outer_layers() {
        let app = test_app();
        let root = bootstrap(&app).await;

        let response = app
            .router
            .clone()
            .oneshot(make_request("GET", "/api/auth/me", Some(&root), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.extensions().get::<AuthContext>().is_some());

        let response = app
            .router
            .clone()
            .oneshot(make_request("GET", "/api/auth/me", Some("bogus"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<AuthContext>().is_none());
    }

    #[tokio::test]
    async fn cancelled_request_stays_cancelled() {
        let app = test_app();
        let root = bootstrap(&app).await;
        let (_, admin) = center_with_admin(&app, &root, "C1").await;
        let doctor = create_doctor(&app, &admin, "doc@c1.test").await;
        let patient = create_patient(&app, &admin, "Asha Verma").await;
        let id = create_test_request(&app, &doctor, &patient).await;

        let (status, _) = call(&app, "POST", &format!("/api/test-requests/{id}/cancel"), Some(&doctor), None).await;
        assert_eq!(status, StatusCode::OK);

        for step in ["start-testing", "cancel", "complete"] {
            let (status, _) =
                call(&app, "POST", &format!("/api/test-requests/{id}/{step}"), Some(&admin), None).await;
            assert_eq!(status, StatusCode::CONFLICT, "{step}");
        }
        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/test-requests/{id}/billing"),
            Some(&admin),
            Some(json!({"items": [{"description": "Serum IgE", "amount": 1000}]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, req) = call(&app, "GET", &format!("/api/test-requests/{id}"), Some(&admin), None).await;
        assert_eq!(req["status"], "Cancelled");
        assert_eq!(req["billing"]["status"], "not_generated");
    }
}
