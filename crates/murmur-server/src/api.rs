use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use murmur_shared::constants::DEFAULT_HISTORY_LIMIT;
use murmur_shared::{
    FriendGroupId, GroupId, GroupRole, NotificationId, NotificationKind, RequestStatus,
    Transition, UserId,
};
use murmur_store::{
    Friend, FriendGroup, Group, GroupMember, Membership, Message, Notification, User,
};

use crate::auth::AuthUser;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::groups::GroupService;
use crate::registry::ConnectionRegistry;
use crate::relationships::RelationshipService;
use crate::router::MessageRouter;
use crate::sessions::{SessionIssuer, SessionVerifier};
use crate::store::Store;
use crate::ws;

/// Largest history page a client may ask for.
const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: ConnectionRegistry,
    pub router: Arc<MessageRouter<Store>>,
    pub relationships: RelationshipService,
    pub groups: GroupService,
    pub issuer: Arc<SessionIssuer>,
    pub verifier: SessionVerifier,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Store, issuer: SessionIssuer, config: ServerConfig) -> Self {
        let registry = ConnectionRegistry::new();
        let verifier = SessionVerifier::new(issuer.public_key());
        Self {
            router: Arc::new(MessageRouter::new(store.clone(), registry.clone())),
            relationships: RelationshipService::new(store.clone()),
            groups: GroupService::new(store.clone()),
            store,
            registry,
            issuer: Arc::new(issuer),
            verifier,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws::ws_handler))
        // Friends
        .route("/friends", get(list_friends))
        .route("/friends/requests", post(request_friend))
        .route("/friends/:friend_id", delete(unfriend))
        .route("/friends/:friend_id/group", put(move_friend))
        .route(
            "/friend-groups",
            get(list_friend_groups).post(create_friend_group),
        )
        // Notifications
        .route("/notifications", get(list_notifications))
        .route("/notifications/sent", get(sent_notifications))
        .route("/notifications/:id/accept", post(accept_request))
        .route("/notifications/:id/reject", post(reject_request))
        // Groups
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/:id/members",
            get(list_members).post(invite_members),
        )
        .route("/groups/:id/members/:user_id", delete(remove_member))
        .route("/groups/:id/members/:user_id/role", put(change_role))
        .route("/groups/:id/owner", post(transfer_ownership))
        // History
        .route("/messages/private/:peer_id", get(private_history))
        .route("/messages/group/:group_id", get(group_history))
        // Sessions and admin
        .route("/sessions/revoke", post(revoke_session))
        .route("/admin/users", post(admin_create_user))
        .route("/admin/sessions", post(admin_issue_session))
        .route("/admin/status", get(admin_status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FriendRequestBody {
    target_id: UserId,
    group_id: FriendGroupId,
    #[serde(default)]
    remark: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveFriendBody {
    group_id: FriendGroupId,
    remark: Option<String>,
}

#[derive(Deserialize)]
struct NameBody {
    name: String,
}

#[derive(Deserialize)]
struct NotificationQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AcceptBody {
    group_id: Option<FriendGroupId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeResponse {
    status: RequestStatus,
    changed: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteBody {
    user_ids: Vec<UserId>,
}

#[derive(Serialize)]
struct InviteResponse {
    added: Vec<UserId>,
}

#[derive(Deserialize)]
struct RoleBody {
    role: GroupRole,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdBody {
    user_id: UserId,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserBody {
    username: String,
    #[serde(default)]
    avatar_url: String,
    #[serde(default)]
    bio: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    token: String,
    user_id: UserId,
    expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminStatusResponse {
    version: &'static str,
    online_connections: usize,
    uptime_secs: u64,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Friends ───

async fn request_friend(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<FriendRequestBody>,
) -> Result<(StatusCode, Json<Notification>), ServerError> {
    let notification = state.relationships.request_friend(
        auth.user_id,
        req.target_id,
        req.group_id,
        &req.remark,
    )?;
    Ok((StatusCode::CREATED, Json(notification)))
}

async fn list_friends(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Friend>>, ServerError> {
    Ok(Json(state.relationships.friends(auth.user_id)?))
}

async fn unfriend(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(friend_id): Path<UserId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let removed = state.relationships.unfriend(auth.user_id, friend_id)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

async fn move_friend(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(friend_id): Path<UserId>,
    Json(req): Json<MoveFriendBody>,
) -> Result<StatusCode, ServerError> {
    state.relationships.move_friend(
        auth.user_id,
        friend_id,
        req.group_id,
        req.remark.as_deref(),
    )?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_friend_groups(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<FriendGroup>>, ServerError> {
    Ok(Json(state.relationships.friend_groups(auth.user_id)?))
}

async fn create_friend_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<NameBody>,
) -> Result<(StatusCode, Json<FriendGroup>), ServerError> {
    let group = state
        .relationships
        .create_friend_group(auth.user_id, &req.name)?;
    Ok((StatusCode::CREATED, Json(group)))
}

// ─── Notifications ───

async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    let kind = match query.kind.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(NotificationKind::parse(raw).ok_or_else(|| {
            ServerError::BadRequest(format!("Unknown notification type: {raw}"))
        })?),
    };
    Ok(Json(
        state.relationships.received_notifications(auth.user_id, kind)?,
    ))
}

async fn sent_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Notification>>, ServerError> {
    Ok(Json(state.relationships.sent_notifications(auth.user_id)?))
}

async fn accept_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<NotificationId>,
    body: Bytes,
) -> Result<Json<OutcomeResponse>, ServerError> {
    // The body is optional, but one that is present must parse.
    let req = if body.is_empty() {
        AcceptBody::default()
    } else {
        serde_json::from_slice::<AcceptBody>(&body)
            .map_err(|e| ServerError::BadRequest(format!("Invalid accept body: {e}")))?
    };
    let transition = state.relationships.accept(auth.user_id, id, req.group_id)?;
    Ok(Json(OutcomeResponse {
        status: RequestStatus::Accepted,
        changed: transition != Transition::Unchanged,
    }))
}

async fn reject_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<Json<OutcomeResponse>, ServerError> {
    let transition = state.relationships.reject(auth.user_id, id)?;
    Ok(Json(OutcomeResponse {
        status: RequestStatus::Rejected,
        changed: transition != Transition::Unchanged,
    }))
}

// ─── Groups ───

async fn create_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<NameBody>,
) -> Result<(StatusCode, Json<Group>), ServerError> {
    let group = state.groups.create_group(auth.user_id, &req.name)?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn list_groups(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Membership>>, ServerError> {
    Ok(Json(state.groups.groups_for(auth.user_id)?))
}

async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group): Path<GroupId>,
) -> Result<Json<Vec<GroupMember>>, ServerError> {
    Ok(Json(state.groups.members(auth.user_id, group)?))
}

async fn invite_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group): Path<GroupId>,
    Json(req): Json<InviteBody>,
) -> Result<Json<InviteResponse>, ServerError> {
    let added = state.groups.invite(auth.user_id, group, &req.user_ids)?;
    Ok(Json(InviteResponse { added }))
}

async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((group, user)): Path<(GroupId, UserId)>,
) -> Result<StatusCode, ServerError> {
    state.groups.remove_member(auth.user_id, group, user)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((group, user)): Path<(GroupId, UserId)>,
    Json(req): Json<RoleBody>,
) -> Result<StatusCode, ServerError> {
    state
        .groups
        .change_role(auth.user_id, group, user, req.role)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn transfer_ownership(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group): Path<GroupId>,
    Json(req): Json<UserIdBody>,
) -> Result<StatusCode, ServerError> {
    state
        .groups
        .transfer_ownership(auth.user_id, group, req.user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── History ───

fn history_limit(query: &HistoryQuery) -> u32 {
    query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

async fn private_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(peer): Path<UserId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let limit = history_limit(&query);
    let messages = state
        .store
        .call(|db| Ok(db.private_history(auth.user_id, peer, limit)?))?;
    Ok(Json(messages))
}

async fn group_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group): Path<GroupId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ServerError> {
    state.groups.ensure_member(auth.user_id, group)?;
    let limit = history_limit(&query);
    let messages = state
        .store
        .call(|db| Ok(db.group_history(group, limit)?))?;
    Ok(Json(messages))
}

// ─── Sessions ───

async fn revoke_session(State(state): State<AppState>, auth: AuthUser) -> StatusCode {
    state.verifier.revoke(&auth.token).await;
    StatusCode::NO_CONTENT
}

// ─── Admin ───

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    // Constant-time comparison to prevent timing attacks on admin token.
    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

async fn admin_create_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<User>), ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let username = req.username.trim();
    if username.is_empty() {
        return Err(ServerError::BadRequest("username must not be empty".into()));
    }
    let user = state
        .store
        .call(|db| Ok(db.create_user(username, &req.avatar_url, &req.bio)?))?;

    info!(user = %user.id, username = %user.username, "Admin created user");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn admin_issue_session(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<UserIdBody>,
) -> Result<Json<SessionResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    if !state.store.call(|db| Ok(db.user_exists(req.user_id)?))? {
        return Err(ServerError::NotFound(format!(
            "user {} does not exist",
            req.user_id
        )));
    }

    let token = state.issuer.issue(req.user_id);
    Ok(Json(SessionResponse {
        token: token.encode(),
        user_id: token.user_id,
        expires_at: token.expires_at,
    }))
}

async fn admin_status(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<AdminStatusResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    Ok(Json(AdminStatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        online_connections: state.registry.online_count().await,
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ADMIN: &str = "admin-secret";

    struct TestApp {
        state: AppState,
        app: Router,
    }

    fn test_app() -> TestApp {
        let config = ServerConfig {
            admin_token: Some(ADMIN.to_string()),
            ..ServerConfig::default()
        };
        let issuer = SessionIssuer::new(SigningKey::generate(&mut OsRng), 1);
        let state = AppState::new(Store::in_memory(), issuer, config);
        TestApp {
            app: build_router(state.clone()),
            state,
        }
    }

    impl TestApp {
        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        /// Create a user through the admin API and mint a token for them.
        async fn user(&self, name: &str) -> (UserId, String) {
            let (status, user) = self
                .send(
                    Method::POST,
                    "/admin/users",
                    Some(ADMIN),
                    Some(json!({ "username": name })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            let id = UserId(user["id"].as_i64().unwrap());

            let (status, session) = self
                .send(
                    Method::POST,
                    "/admin/sessions",
                    Some(ADMIN),
                    Some(json!({ "userId": id })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            (id, session["token"].as_str().unwrap().to_string())
        }

        async fn default_folder(&self, token: &str) -> i64 {
            let (_, groups) = self
                .send(Method::GET, "/friend-groups", Some(token), None)
                .await;
            groups[0]["id"].as_i64().unwrap()
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = test_app();
        let (status, body) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_is_401() {
        let app = test_app();
        let (status, body) = app.send(Method::GET, "/friends", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = app
            .send(Method::GET, "/friends", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_api_requires_admin_token() {
        let app = test_app();
        let (status, _) = app
            .send(
                Method::POST,
                "/admin/users",
                Some("wrong"),
                Some(json!({ "username": "ann" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(Method::GET, "/admin/status", Some(ADMIN), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["onlineConnections"], 0);

        let (status, _) = app
            .send(
                Method::POST,
                "/admin/sessions",
                Some(ADMIN),
                Some(json!({ "userId": 404 })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_friend_request_accept_flow() {
        let app = test_app();
        let (ann, ann_token) = app.user("ann").await;
        let (bob, bob_token) = app.user("bob").await;
        let folder = app.default_folder(&ann_token).await;

        let (status, request) = app
            .send(
                Method::POST,
                "/friends/requests",
                Some(&ann_token),
                Some(json!({ "targetId": bob, "groupId": folder, "remark": "hi" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(request["status"], "pending");
        let id = request["id"].as_i64().unwrap();

        let (_, inbox) = app
            .send(
                Method::GET,
                "/notifications?type=friend_request",
                Some(&bob_token),
                None,
            )
            .await;
        assert_eq!(inbox.as_array().unwrap().len(), 1);

        // Only the receiver may answer.
        let (status, _) = app
            .send(
                Method::POST,
                &format!("/notifications/{id}/accept"),
                Some(&ann_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, outcome) = app
            .send(
                Method::POST,
                &format!("/notifications/{id}/accept"),
                Some(&bob_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["changed"], true);

        let (_, friends) = app
            .send(Method::GET, "/friends", Some(&ann_token), None)
            .await;
        assert_eq!(friends[0]["user"]["id"], bob.get());
        let (_, friends) = app
            .send(Method::GET, "/friends", Some(&bob_token), None)
            .await;
        assert_eq!(friends[0]["user"]["id"], ann.get());

        let (status, _) = app
            .send(
                Method::POST,
                &format!("/notifications/{id}/reject"),
                Some(&bob_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .send(
                Method::DELETE,
                &format!("/friends/{bob}"),
                Some(&ann_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], true);
        let (_, friends) = app
            .send(Method::GET, "/friends", Some(&bob_token), None)
            .await;
        assert!(friends.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_accept_body_is_400() {
        let app = test_app();
        let (_, ann_token) = app.user("ann").await;
        let (bob, bob_token) = app.user("bob").await;
        let folder = app.default_folder(&ann_token).await;

        let (_, request) = app
            .send(
                Method::POST,
                "/friends/requests",
                Some(&ann_token),
                Some(json!({ "targetId": bob, "groupId": folder })),
            )
            .await;
        let id = request["id"].as_i64().unwrap();

        let (status, _) = app
            .send(
                Method::POST,
                &format!("/notifications/{id}/accept"),
                Some(&bob_token),
                Some(json!({ "groupId": "not-a-number" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Nothing changed; a well-formed body still works.
        let (_, inbox) = app
            .send(Method::GET, "/notifications", Some(&bob_token), None)
            .await;
        assert_eq!(inbox[0]["status"], "pending");

        let bob_folder = app.default_folder(&bob_token).await;
        let (status, outcome) = app
            .send(
                Method::POST,
                &format!("/notifications/{id}/accept"),
                Some(&bob_token),
                Some(json!({ "groupId": bob_folder })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["changed"], true);
    }

    #[tokio::test]
    async fn test_unknown_notification_type_is_400() {
        let app = test_app();
        let (_, token) = app.user("ann").await;
        let (status, _) = app
            .send(Method::GET, "/notifications?type=bogus", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_group_management_and_history() {
        let app = test_app();
        let (_, owner_token) = app.user("owner").await;
        let (member, member_token) = app.user("member").await;
        let (_, outsider_token) = app.user("outsider").await;

        let (status, group) = app
            .send(
                Method::POST,
                "/groups",
                Some(&owner_token),
                Some(json!({ "name": "team" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let group_id = group["id"].as_i64().unwrap();

        let (status, invite) = app
            .send(
                Method::POST,
                &format!("/groups/{group_id}/members"),
                Some(&owner_token),
                Some(json!({ "userIds": [member] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(invite["added"], json!([member]));

        let (status, members) = app
            .send(
                Method::GET,
                &format!("/groups/{group_id}/members"),
                Some(&member_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(members.as_array().unwrap().len(), 2);

        let (status, _) = app
            .send(
                Method::GET,
                &format!("/messages/group/{group_id}"),
                Some(&outsider_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, history) = app
            .send(
                Method::GET,
                &format!("/messages/group/{group_id}?limit=10"),
                Some(&member_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(history.as_array().unwrap().is_empty());

        let (status, _) = app
            .send(
                Method::PUT,
                &format!("/groups/{group_id}/members/{member}/role"),
                Some(&owner_token),
                Some(json!({ "role": "admin" })),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app
            .send(
                Method::POST,
                &format!("/groups/{group_id}/owner"),
                Some(&owner_token),
                Some(json!({ "userId": member })),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, groups) = app
            .send(Method::GET, "/groups", Some(&member_token), None)
            .await;
        assert_eq!(groups[0]["role"], "owner");
    }

    #[tokio::test]
    async fn test_private_history_after_routing() {
        let app = test_app();
        let (ann, ann_token) = app.user("ann").await;
        let (bob, bob_token) = app.user("bob").await;

        let frame = json!({
            "id": 1,
            "senderId": ann,
            "receiverId": bob,
            "content": "hi",
            "messageType": "private"
        })
        .to_string();
        app.state.router.route_frame(ann, &frame).await.unwrap();

        let (status, history) = app
            .send(
                Method::GET,
                &format!("/messages/private/{ann}"),
                Some(&bob_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history[0]["content"], "hi");

        let (_, history) = app
            .send(
                Method::GET,
                &format!("/messages/private/{bob}"),
                Some(&ann_token),
                None,
            )
            .await;
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_revoked_session_is_refused() {
        let app = test_app();
        let (_, token) = app.user("ann").await;

        let (status, _) = app
            .send(Method::POST, "/sessions/revoke", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app
            .send(Method::GET, "/friends", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_query_parameter_is_accepted() {
        let app = test_app();
        let (_, token) = app.user("ann").await;
        let (status, _) = app
            .send(Method::GET, &format!("/friend-groups?token={token}"), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}
