use serde_json::json;

use crate::common::{TestApp, routes};

mod problem_creation {
    use super::*;

    #[tokio::test]
    async fn creating_a_problem_opens_an_edit_session() {
        let app = TestApp::spawn().await;

        let res = app
            .post_as("alice", routes::PROBLEMS, &json!({ "alias": "aplusb" }))
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["alias"], "aplusb");
        assert!(res.body["id"].is_number());
        assert!(res.body["session_id"].is_string());
        let title = res.body["title"].as_str().unwrap();
        assert!(title.starts_with("Problem #"), "default title: {title}");
    }

    #[tokio::test]
    async fn alias_must_be_lowercase_alphanumeric() {
        let app = TestApp::spawn().await;

        for alias in ["x", "Has-Caps", "with space", "waytoolongaliaswaytoolongalias1"] {
            let res = app
                .post_as("alice", routes::PROBLEMS, &json!({ "alias": alias }))
                .await;
            assert_eq!(res.status, 400, "alias {alias:?}: {}", res.text);
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn identity_header_is_required() {
        let app = TestApp::spawn().await;

        let res = app
            .post_anonymous(routes::PROBLEMS, &json!({ "alias": "aplusb" }))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "IDENTITY_MISSING");
    }

    #[tokio::test]
    async fn malformed_identity_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_as("no spaces allowed", routes::PROBLEMS, &json!({ "alias": "aplusb" }))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "IDENTITY_INVALID");
    }
}

mod problem_listing {
    use super::*;

    #[tokio::test]
    async fn users_only_see_problems_they_can_access() {
        let app = TestApp::spawn().await;
        app.create_problem("alice", "first").await;
        app.create_problem("bob", "second").await;
        app.create_problem("alice", "third").await;

        let res = app.get_as("alice", routes::PROBLEMS).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        for item in data {
            assert_eq!(item["access"], "admin");
        }
        assert_eq!(res.body["pagination"]["total"], 2);

        let res = app.get_as("carol", routes::PROBLEMS).await;
        assert_eq!(res.status, 200);
        assert!(res.body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_shows_open_sessions() {
        let app = TestApp::spawn().await;
        let (id, sid) = app.create_problem("alice", "aplusb").await;

        // Grant bob write and have him open his own session.
        let res = app
            .put_as(
                "alice",
                &routes::problem_access(id),
                &json!({ "write": ["bob"] }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let res = app.post_as("bob", &routes::problem_pull(id), &json!({})).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.get_as("alice", routes::PROBLEMS).await;
        let sessions = res.body["data"][0]["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 2);
        let users: Vec<_> = sessions
            .iter()
            .map(|s| s["user"].as_str().unwrap())
            .collect();
        assert!(users.contains(&"alice") && users.contains(&"bob"));
        assert!(sessions.iter().any(|s| s["id"] == sid.as_str()));
    }

    #[tokio::test]
    async fn listing_is_paginated() {
        let app = TestApp::spawn().await;
        for alias in ["one1", "two2", "three3"] {
            app.create_problem("alice", alias).await;
        }

        let res = app
            .get_as("alice", &format!("{}?page=2&per_page=2", routes::PROBLEMS))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
        assert_eq!(res.body["pagination"]["total"], 3);
        assert_eq!(res.body["pagination"]["page"], 2);
    }
}

mod pulling {
    use super::*;

    #[tokio::test]
    async fn pull_resets_the_session_to_canonical() {
        let app = TestApp::spawn().await;
        let (id, sid) = app.create_problem("alice", "aplusb").await;

        // Make a local edit, then pull it away.
        let res = app
            .put_as(
                "alice",
                &routes::session_meta(&sid),
                &json!({
                    "alias": "aplusb",
                    "title": "Scratch title",
                    "time_limit_ms": 2000,
                    "memory_limit_mb": 256,
                }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.post_as("alice", &routes::problem_pull(id), &json!({})).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["session_id"], sid.as_str());
        assert_eq!(res.body["base_version"], 1);

        let snapshot = app.get_as("alice", &routes::session(&sid)).await;
        assert_eq!(snapshot.body["title"], "Problem #1");
    }

    #[tokio::test]
    async fn read_tier_cannot_pull() {
        let app = TestApp::spawn().await;
        let (id, _) = app.create_problem("alice", "aplusb").await;
        let res = app
            .put_as(
                "alice",
                &routes::problem_access(id),
                &json!({ "read": ["bob"] }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.post_as("bob", &routes::problem_pull(id), &json!({})).await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn pulling_an_unknown_problem_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.post_as("alice", &routes::problem_pull(999), &json!({})).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod access_control {
    use super::*;

    #[tokio::test]
    async fn creator_holds_the_admin_tier() {
        let app = TestApp::spawn().await;
        let (id, _) = app.create_problem("alice", "aplusb").await;

        let res = app.get_as("alice", &routes::problem_access(id)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["admin"], json!(["alice"]));
        assert_eq!(res.body["write"], json!([]));
        assert_eq!(res.body["read"], json!([]));
    }

    #[tokio::test]
    async fn bulk_update_replaces_records_but_never_admins() {
        let app = TestApp::spawn().await;
        let (id, _) = app.create_problem("alice", "aplusb").await;

        let res = app
            .put_as(
                "alice",
                &routes::problem_access(id),
                &json!({ "read": ["carol"], "write": ["bob"] }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        // A second update dropping everyone still keeps the admin. Listing
        // alice under read must not demote her either.
        let res = app
            .put_as(
                "alice",
                &routes::problem_access(id),
                &json!({ "read": ["alice"] }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.get_as("alice", &routes::problem_access(id)).await;
        assert_eq!(res.body["admin"], json!(["alice"]));
        assert_eq!(res.body["write"], json!([]));
        assert_eq!(res.body["read"], json!([]));
    }

    #[tokio::test]
    async fn write_wins_when_a_user_is_in_both_lists() {
        let app = TestApp::spawn().await;
        let (id, _) = app.create_problem("alice", "aplusb").await;

        let res = app
            .put_as(
                "alice",
                &routes::problem_access(id),
                &json!({ "read": ["bob"], "write": ["bob"] }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.get_as("alice", &routes::problem_access(id)).await;
        assert_eq!(res.body["write"], json!(["bob"]));
        assert_eq!(res.body["read"], json!([]));
    }

    #[tokio::test]
    async fn outsiders_cannot_view_or_edit_access() {
        let app = TestApp::spawn().await;
        let (id, _) = app.create_problem("alice", "aplusb").await;

        let res = app.get_as("mallory", &routes::problem_access(id)).await;
        assert_eq!(res.status, 403);

        let res = app
            .put_as(
                "mallory",
                &routes::problem_access(id),
                &json!({ "write": ["mallory"] }),
            )
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn invalid_usernames_are_rejected() {
        let app = TestApp::spawn().await;
        let (id, _) = app.create_problem("alice", "aplusb").await;

        let res = app
            .put_as(
                "alice",
                &routes::problem_access(id),
                &json!({ "write": ["not a name"] }),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}
