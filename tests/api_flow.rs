mod common;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{json_body, spawn_app, PASSWORD};

fn ids(body: &Value) -> Vec<i64> {
    body["users"]
        .as_array()
        .expect("users")
        .iter()
        .filter_map(|u| u["id"].as_i64())
        .collect()
}

fn kinds(body: &Value) -> Vec<String> {
    body["notifications"]
        .as_array()
        .expect("notifications")
        .iter()
        .filter_map(|n| n["type"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;
    let res = app.client.get(app.url("/api/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["status"], "healthy");
}

#[tokio::test]
async fn test_register_verify_login_logout() {
    let app = spawn_app().await;

    let res = app.register("alice").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let token = json_body(res).await["verification_token"].as_str().unwrap().to_string();

    assert_eq!(app.register("alice").await.status(), StatusCode::CONFLICT);

    let weak = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": "bob",
            "email": "bob@example.com",
            "first_name": "Bob",
            "last_name": "B",
            "password": "password1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);

    // unverified accounts cannot log in
    assert_eq!(app.login("alice", PASSWORD).await.status(), StatusCode::FORBIDDEN);

    let res = app
        .client
        .get(app.url(&format!("/api/auth/verify/{}", token)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(app.login("alice", "Wr0ng!pass").await.status(), StatusCode::UNAUTHORIZED);

    let login = json_body(app.login("alice", PASSWORD).await).await;
    let jwt = login["token"].as_str().unwrap().to_string();

    let me = app.get("/api/auth/me", &jwt).await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = json_body(me).await;
    assert_eq!(me["username"], "alice");
    assert_eq!(me["is_verified"], true);

    assert_eq!(app.post("/api/auth/logout", &jwt, json!({})).await.status(), StatusCode::OK);
    assert_eq!(app.get("/api/auth/me", &jwt).await.status(), StatusCode::UNAUTHORIZED);

    let res = app.client.get(app.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_update_and_visits() {
    let app = spawn_app().await;
    let alice = app.verified_user("alice").await;
    let bob = app.verified_user("bob").await;

    let res = app
        .put(
            "/api/profile/update",
            &alice.token,
            json!({"bio": "Hello there", "gender": "Female", "sexual_preference": "Straight", "date_of_birth": "1995-04-12"}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.put("/api/profile/update", &alice.token, json!({"gender": "robot"})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .put("/api/profile/update", &alice.token, json!({"email": "bob@example.com"}))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let profile = json_body(app.get("/api/profile/me", &alice.token).await).await;
    assert_eq!(profile["bio"], "Hello there");
    assert_eq!(profile["gender"], "Female");
    assert!(profile["age"].as_i64().unwrap() >= 29);

    let res = app
        .put("/api/profile/location", &alice.token, json!({"latitude": 48.85, "longitude": 2.35}))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app
        .put("/api/profile/location", &alice.token, json!({"latitude": 120.0, "longitude": 2.35}))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // bob looks at alice twice on the same day
    for _ in 0..2 {
        let res = app.get(&format!("/api/users/{}", alice.id), &bob.token).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
    let view = json_body(app.get(&format!("/api/users/{}", alice.id), &bob.token).await).await;
    assert_eq!(view["connected"], false);
    assert!(view.get("email").is_none());

    let visitors = json_body(app.get("/api/profile/visitors", &alice.token).await).await;
    assert_eq!(visitors["count"], 1);

    let notifications = json_body(app.get("/api/notifications", &alice.token).await).await;
    assert_eq!(kinds(&notifications), vec!["visit"]);

    let res = app.get(&format!("/api/users/{}", alice.id), &alice.token).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = app.get("/api/users/9999", &alice.token).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_like_requires_photo_and_match_unlocks_chat() {
    let app = spawn_app().await;
    let alice = app.verified_user("alice").await;
    let bob = app.verified_user("bob").await;

    assert_eq!(app.like(&alice, &bob, true).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.upload_photo(&alice).await.status(), StatusCode::CREATED);
    assert_eq!(app.upload_photo(&bob).await.status(), StatusCode::CREATED);

    let liked = json_body(app.like(&alice, &bob, true).await).await;
    assert_eq!(liked["connected"], false);
    assert_eq!(liked["fame_rating"], 0.1);

    // chat needs a connection
    let res = app
        .post(&format!("/api/chat/messages/{}", bob.id), &alice.token, json!({"content": "hi"}))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let matched = json_body(app.like(&bob, &alice, true).await).await;
    assert_eq!(matched["connected"], true);

    let bob_notes = json_body(app.get("/api/notifications", &bob.token).await).await;
    assert!(kinds(&bob_notes).contains(&"like".to_string()));
    assert!(kinds(&bob_notes).contains(&"match".to_string()));

    let res = app
        .post(&format!("/api/chat/messages/{}", bob.id), &alice.token, json!({"content": "  hi bob  "}))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let sent = json_body(res).await;
    assert_eq!(sent["data"]["content"], "hi bob");
    assert_eq!(sent["data"]["is_mine"], true);

    let res = app
        .post(&format!("/api/chat/messages/{}", bob.id), &alice.token, json!({"content": "   "}))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let conversations = json_body(app.get("/api/chat/conversations", &bob.token).await).await;
    let first = &conversations["conversations"][0];
    assert_eq!(first["user"]["id"], alice.id);
    assert_eq!(first["unread_count"], 1);
    assert_eq!(first["last_message"]["is_mine"], false);

    let messages = json_body(app.get(&format!("/api/chat/messages/{}", alice.id), &bob.token).await).await;
    assert_eq!(messages["messages"].as_array().unwrap().len(), 1);
    assert_eq!(messages["has_more"], false);

    let conversations = json_body(app.get("/api/chat/conversations", &bob.token).await).await;
    assert_eq!(conversations["conversations"][0]["unread_count"], 0);

    // unliking a connection drops it and tells the other side
    let unliked = json_body(app.like(&bob, &alice, false).await).await;
    assert_eq!(unliked["connected"], false);
    let alice_notes = json_body(app.get("/api/notifications", &alice.token).await).await;
    assert!(kinds(&alice_notes).contains(&"unlike".to_string()));
}

#[tokio::test]
async fn test_block_removes_likes_and_hides_profile() {
    let app = spawn_app().await;
    let (alice, bob) = app.connected_pair("alice", "bob").await;

    let res = app.post(&format!("/api/users/{}/block", bob.id), &alice.token, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);

    let me = json_body(app.get("/api/profile/me", &alice.token).await).await;
    assert_eq!(me["fame_rating"], 0.0);

    assert_eq!(
        app.get(&format!("/api/users/{}", alice.id), &bob.token).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(app.like(&bob, &alice, true).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        app.get(&format!("/api/chat/messages/{}", alice.id), &bob.token).await.status(),
        StatusCode::FORBIDDEN
    );

    let res = app.delete(&format!("/api/users/{}/block", bob.id), &alice.token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.delete(&format!("/api/users/{}/block", bob.id), &alice.token).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // likes stay gone after unblocking
    let view = json_body(app.get(&format!("/api/users/{}", bob.id), &alice.token).await).await;
    assert_eq!(view["liked_by_me"], false);
    assert_eq!(view["liked_by_them"], false);

    let report = app
        .post(&format!("/api/users/{}/report", bob.id), &alice.token, json!({"reason": "fake"}))
        .await;
    assert_eq!(json_body(report).await["message"], "User reported");
    let report = app
        .post(&format!("/api/users/{}/report", bob.id), &alice.token, json!({}))
        .await;
    assert_eq!(json_body(report).await["message"], "User already reported");
}

#[tokio::test]
async fn test_browsing_modes_and_filters() {
    let app = spawn_app().await;
    let viewer = app.verified_user("viewer").await;
    let straight_woman = app.verified_user("straightwoman").await;
    let gay_woman = app.verified_user("gaywoman").await;
    let straight_man = app.verified_user("straightman").await;

    let set = |gender: &str, pref: &str, dob: &str| {
        json!({"gender": gender, "sexual_preference": pref, "date_of_birth": dob})
    };
    for (user, body) in [
        (&viewer, set("Male", "Straight", "1990-01-01")),
        (&straight_woman, set("Female", "Straight", "1992-01-01")),
        (&gay_woman, set("Female", "Gay", "1993-01-01")),
        (&straight_man, set("Male", "Straight", "1970-01-01")),
    ] {
        let res = app.put("/api/profile/update", &user.token, body).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let page = json_body(app.get("/api/browsing", &viewer.token).await).await;
    assert_eq!(page["mode"], "browsing");
    assert_eq!(ids(&page), vec![straight_woman.id]);
    assert_eq!(page["users"][0]["distance_km"], 9999.0);

    let page = json_body(app.get("/api/browsing?gender=all&sort=age&order=asc", &viewer.token).await).await;
    assert_eq!(page["mode"], "search");
    assert_eq!(ids(&page), vec![gay_woman.id, straight_woman.id, straight_man.id]);
    assert_eq!(page["pagination"]["total"], 3);

    let page = json_body(app.get("/api/browsing?gender=Male", &viewer.token).await).await;
    assert_eq!(ids(&page), vec![straight_man.id]);

    let page = json_body(app.get("/api/browsing?gender=all&max_age=40", &viewer.token).await).await;
    assert_eq!(page["pagination"]["total"], 2);

    let res = app.post("/api/tags", &gay_woman.token, json!({"tags": ["hiking"]})).await;
    let tag_id = json_body(res).await["added_tags"][0]["id"].as_i64().unwrap();
    let page = json_body(
        app.get(&format!("/api/browsing?gender=all&tags={}", tag_id), &viewer.token)
            .await,
    )
    .await;
    assert_eq!(ids(&page), vec![gay_woman.id]);

    let page = json_body(app.get("/api/browsing?gender=all&limit=2&page=2", &viewer.token).await).await;
    assert_eq!(ids(&page).len(), 1);
    assert_eq!(page["pagination"]["pages"], 2);

    let res = app
        .get("/api/browsing?gender=all&page=9223372036854775807", &viewer.token)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(ids(&json_body(res).await).is_empty());

    // blocked users disappear from every mode
    app.post(&format!("/api/users/{}/block", straight_man.id), &viewer.token, json!({}))
        .await;
    let page = json_body(app.get("/api/browsing?gender=all", &viewer.token).await).await;
    assert!(!ids(&page).contains(&straight_man.id));
}

#[tokio::test]
async fn test_tags_add_list_remove() {
    let app = spawn_app().await;
    let alice = app.verified_user("alice").await;

    let res = app
        .post("/api/tags", &alice.token, json!({"tags": ["Music", "#travel", "music"]}))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = json_body(res).await;
    assert_eq!(body["added_tags"].as_array().unwrap().len(), 2);

    let res = app.post("/api/tags", &alice.token, json!({"tags": ["#music"]})).await;
    let body = json_body(res).await;
    assert_eq!(body["skipped_tags"], json!(["#music"]));

    let res = app.client.get(app.url("/api/tags?q=mus")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listing = json_body(res).await;
    assert_eq!(listing["count"], 1);
    let music_id = listing["tags"][0]["id"].as_i64().unwrap();

    let res = app.delete(&format!("/api/tags/{}", music_id), &alice.token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.delete(&format!("/api/tags/{}", music_id), &alice.token).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app.post("/api/tags", &alice.token, json!({"tags": []})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_date_proposal_lifecycle() {
    let app = spawn_app().await;
    let (alice, bob) = app.connected_pair("alice", "bob").await;

    let past = (Utc::now() - Duration::days(1)).to_rfc3339();
    let res = app
        .post(
            &format!("/api/dates/{}", bob.id),
            &alice.token,
            json!({"date_time": past, "location": "Cafe", "activity": "Coffee"}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let future = (Utc::now() + Duration::days(3)).to_rfc3339();
    let res = app
        .post(
            &format!("/api/dates/{}", bob.id),
            &alice.token,
            json!({"date_time": future, "location": "Cafe", "activity": "Coffee"}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let proposal = json_body(res).await["date_proposal"].clone();
    assert_eq!(proposal["status"], "pending");
    let proposal_id = proposal["id"].as_i64().unwrap();

    let respond = format!("/api/dates/{}/respond", proposal_id);
    let res = app.put(&respond, &alice.token, json!({"status": "accepted"})).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = app.put(&respond, &bob.token, json!({"status": "maybe"})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.put(&respond, &bob.token, json!({"status": "accepted"})).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["date_proposal"]["status"], "accepted");

    let res = app.put(&respond, &bob.token, json!({"status": "declined"})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let dates = json_body(app.get(&format!("/api/dates/conversation/{}", alice.id), &bob.token).await).await;
    let list = dates["date_proposals"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["is_mine"], false);

    let notes = json_body(app.get("/api/notifications", &alice.token).await).await;
    assert!(kinds(&notes).contains(&"date_accepted".to_string()));
}

#[tokio::test]
async fn test_notifications_read_state() {
    let app = spawn_app().await;
    let (alice, _bob) = app.connected_pair("alice", "bob").await;

    let unread = json_body(app.get("/api/notifications/unread/count", &alice.token).await).await;
    // alice liked first, so only the match reached her
    assert_eq!(unread["unread_count"], 1);

    let notes = json_body(app.get("/api/notifications", &alice.token).await).await;
    let first = &notes["notifications"][0];
    assert_eq!(first["type"], "match");
    assert_eq!(first["from_user"]["username"], "bob");
    let note_id = first["id"].as_i64().unwrap();

    let res = app.put(&format!("/api/notifications/{}/read", note_id), &alice.token, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.put("/api/notifications/424242/read", &alice.token, json!({})).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let unread = json_body(app.get("/api/notifications/unread/count", &alice.token).await).await;
    assert_eq!(unread["unread_count"], 0);

    let res = app.put("/api/notifications/read-all", &alice.token, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_password_reset() {
    let app = spawn_app().await;
    app.verified_user("alice").await;

    let res = app
        .client
        .post(app.url("/api/auth/forgot-password"))
        .json(&json!({"email": "alice@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .client
        .post(app.url("/api/auth/reset-password"))
        .json(&json!({"token": "not-a-token", "password": "N3w!strongPw"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_image_limit_holds_under_concurrent_uploads() {
    let app = spawn_app().await;
    let alice = app.verified_user("alice").await;

    let uploads = (0..8).map(|_| app.upload_photo(&alice));
    let statuses: Vec<StatusCode> = futures_util::future::join_all(uploads)
        .await
        .iter()
        .map(|res| res.status())
        .collect();

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 5);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 3);

    // rejected uploads leave nothing behind on disk
    assert_eq!(app.stored_uploads(), 5);
    let me = json_body(app.get("/api/profile/me", &alice.token).await).await;
    assert_eq!(me["images"].as_array().expect("images").len(), 5);

    assert_eq!(app.upload_photo(&alice).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_uploads(), 5);
}
