use serde_json::json;

use crate::common::{TestApp, routes};

/// Meta body with every required field, suitable for tweaking.
fn meta(title: &str) -> serde_json::Value {
    json!({
        "alias": "aplusb",
        "title": title,
        "time_limit_ms": 2000,
        "memory_limit_mb": 256,
    })
}

mod snapshot {
    use super::*;

    #[tokio::test]
    async fn snapshot_reflects_the_working_copy() {
        let app = TestApp::spawn().await;
        let (id, sid) = app.create_problem("alice", "aplusb").await;
        app.create_case("alice", &sid, "1 2\n", Some("3\n")).await;
        app.create_program("alice", &sid, "chk.cpp", "checker").await;

        let res = app.get_as("alice", &routes::session(&sid)).await;
        assert_eq!(res.status, 200, "{}", res.text);

        assert_eq!(res.body["id"], sid.as_str());
        assert_eq!(res.body["problem_id"], id);
        assert_eq!(res.body["user"], "alice");
        assert_eq!(res.body["base_version"], 1);
        assert_eq!(res.body["canonical_version"], 1);
        assert_eq!(res.body["alias"], "aplusb");
        assert_eq!(res.body["time_limit_ms"], 2000);
        assert_eq!(res.body["memory_limit_mb"], 256);

        assert_eq!(res.body["case_count"], 1);
        let case = &res.body["cases"][0];
        assert_eq!(case["order"], 1);
        assert_eq!(case["used"], true);
        assert_eq!(case["point"], 10);
        assert!(case["input_size"].as_u64().unwrap() > 0);
        assert!(case["output_size"].as_u64().unwrap() > 0);

        let program = &res.body["programs"][0];
        assert_eq!(program["filename"], "chk.cpp");
        assert_eq!(program["category"], "checker");
        assert!(res.body["volume_used"].as_u64().unwrap() > 0);
        assert!(res.body["volume_quota"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn any_member_may_view_any_session_of_the_problem() {
        let app = TestApp::spawn().await;
        let (id, sid) = app.create_problem("alice", "aplusb").await;
        let res = app
            .put_as(
                "alice",
                &routes::problem_access(id),
                &json!({ "read": ["carol"] }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.get_as("carol", &routes::session(&sid)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["user"], "alice");
    }

    #[tokio::test]
    async fn strangers_cannot_view_a_session() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app.get_as("mallory", &routes::session(&sid)).await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get_as("alice", &routes::session("nosuch")).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod meta_saving {
    use super::*;

    #[tokio::test]
    async fn meta_save_updates_the_working_copy() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let mut body = meta("A + B");
        body["time_limit_ms"] = json!(1500);
        body["source"] = json!("Regionals 2025");
        let res = app.put_as("alice", &routes::session_meta(&sid), &body).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "ok");

        let snapshot = app.get_as("alice", &routes::session(&sid)).await;
        assert_eq!(snapshot.body["title"], "A + B");
        assert_eq!(snapshot.body["time_limit_ms"], 1500);
        assert_eq!(snapshot.body["source"], "Regionals 2025");
    }

    #[tokio::test]
    async fn limits_out_of_range_are_rejected() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let mut body = meta("A + B");
        body["time_limit_ms"] = json!(50);
        let res = app.put_as("alice", &routes::session_meta(&sid), &body).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let mut body = meta("A + B");
        body["memory_limit_mb"] = json!(10000);
        let res = app.put_as("alice", &routes::session_meta(&sid), &body).await;
        assert_eq!(res.status, 400);

        // A rejected save leaves the document untouched.
        let snapshot = app.get_as("alice", &routes::session(&sid)).await;
        assert_eq!(snapshot.body["time_limit_ms"], 2000);
    }

    #[tokio::test]
    async fn role_bindings_must_reference_registered_programs() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let mut body = meta("A + B");
        body["checker"] = json!("ghost.cpp");
        let res = app.put_as("alice", &routes::session_meta(&sid), &body).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        app.create_program("alice", &sid, "chk.cpp", "checker").await;
        let mut body = meta("A + B");
        body["checker"] = json!("chk.cpp");
        let res = app.put_as("alice", &routes::session_meta(&sid), &body).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let snapshot = app.get_as("alice", &routes::session(&sid)).await;
        assert_eq!(snapshot.body["checker"], "chk.cpp");
        // The registry view reports the binding.
        assert_eq!(snapshot.body["programs"][0]["used"], "checker");
    }

    #[tokio::test]
    async fn empty_binding_unbinds_the_role() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        app.create_program("alice", &sid, "chk.cpp", "checker").await;

        let mut body = meta("A + B");
        body["checker"] = json!("chk.cpp");
        let res = app.put_as("alice", &routes::session_meta(&sid), &body).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let mut body = meta("A + B");
        body["checker"] = json!("");
        let res = app.put_as("alice", &routes::session_meta(&sid), &body).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let snapshot = app.get_as("alice", &routes::session(&sid)).await;
        assert!(snapshot.body["checker"].is_null());
    }

    #[tokio::test]
    async fn only_the_owner_may_edit_a_session() {
        let app = TestApp::spawn().await;
        let (id, sid) = app.create_problem("alice", "aplusb").await;
        let res = app
            .put_as(
                "alice",
                &routes::problem_access(id),
                &json!({ "write": ["bob"] }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        // Bob holds the write tier but the session belongs to alice.
        let res = app
            .put_as("bob", &routes::session_meta(&sid), &meta("Hijacked"))
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }
}

mod push_and_pull {
    use super::*;

    #[tokio::test]
    async fn push_publishes_and_bumps_the_canonical_version() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .put_as("alice", &routes::session_meta(&sid), &meta("A + B"))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.post_as("alice", &routes::session_push(&sid), &json!({})).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["version"], 2);

        // The session is rebased onto what it just published.
        let snapshot = app.get_as("alice", &routes::session(&sid)).await;
        assert_eq!(snapshot.body["base_version"], 2);
        assert_eq!(snapshot.body["canonical_version"], 2);
    }

    #[tokio::test]
    async fn stale_push_conflicts_until_repulled() {
        let app = TestApp::spawn().await;
        let (id, sid_alice) = app.create_problem("alice", "aplusb").await;
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
        let sid_bob = res.body["session_id"].as_str().unwrap().to_string();

        // Alice publishes first; bob's copy is now stale.
        let res = app
            .post_as("alice", &routes::session_push(&sid_alice), &json!({}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.post_as("bob", &routes::session_push(&sid_bob), &json!({})).await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");

        // Pulling refreshes the base and the push goes through.
        let res = app.post_as("bob", &routes::session_pull(&sid_bob), &json!({})).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["base_version"], 2);

        let res = app.post_as("bob", &routes::session_push(&sid_bob), &json!({})).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["version"], 3);
    }

    #[tokio::test]
    async fn push_rejects_dangling_role_bindings() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        app.create_program("alice", &sid, "chk.cpp", "checker").await;

        let mut body = meta("A + B");
        body["checker"] = json!("chk.cpp");
        let res = app.put_as("alice", &routes::session_meta(&sid), &body).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app
            .delete_as("alice", &routes::program(&sid, "chk.cpp"))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.post_as("alice", &routes::session_push(&sid), &json!({})).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn session_pull_discards_local_edits() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        app.create_case("alice", &sid, "9 9\n", None).await;

        let res = app.post_as("alice", &routes::session_pull(&sid), &json!({})).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["session_id"], sid.as_str());

        let snapshot = app.get_as("alice", &routes::session(&sid)).await;
        assert_eq!(snapshot.body["case_count"], 0);
    }
}

mod statements {
    use super::*;

    #[tokio::test]
    async fn statement_lifecycle() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .post_as(
                "alice",
                &routes::statements(&sid),
                &json!({ "filename": "legend.md" }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["filename"], "legend.md");
        assert_eq!(res.body["text"], "");

        let res = app
            .put_as(
                "alice",
                &routes::statement(&sid, "legend.md"),
                &json!({ "text": "Given two integers, print their sum." }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.get_as("alice", &routes::statement(&sid, "legend.md")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["text"], "Given two integers, print their sum.");

        let snapshot = app.get_as("alice", &routes::session(&sid)).await;
        assert_eq!(snapshot.body["statements"][0]["filename"], "legend.md");
        assert!(snapshot.body["statements"][0]["size"].as_u64().unwrap() > 0);

        let res = app
            .delete_as("alice", &routes::statement(&sid, "legend.md"))
            .await;
        assert_eq!(res.status, 200);

        let res = app.get_as("alice", &routes::statement(&sid, "legend.md")).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn duplicate_statement_names_are_rejected() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let body = json!({ "filename": "legend.md" });
        let res = app.post_as("alice", &routes::statements(&sid), &body).await;
        assert_eq!(res.status, 201, "{}", res.text);

        let res = app.post_as("alice", &routes::statements(&sid), &body).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn statement_names_must_be_flat() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .post_as(
                "alice",
                &routes::statements(&sid),
                &json!({ "filename": "../escape.md" }),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn deleting_a_missing_statement_is_idempotent() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app.delete_as("alice", &routes::statement(&sid, "ghost.md")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "ok");
    }
}

mod files {
    use super::*;

    #[tokio::test]
    async fn uploaded_files_are_listed_and_served() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .upload_as(
                "alice",
                &routes::files(&sid),
                "diagram.png",
                b"not really a png".to_vec(),
                "image/png",
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let stored = res.body["files"][0]["filename"].as_str().unwrap().to_string();
        // Uploads get a random name with the original extension.
        assert!(stored.ends_with(".png"), "stored name: {stored}");
        assert_ne!(stored, "diagram.png");

        let snapshot = app.get_as("alice", &routes::session(&sid)).await;
        assert_eq!(snapshot.body["files"][0]["filename"], stored.as_str());
        assert_eq!(snapshot.body["files"][0]["kind"], "image");
        let url = snapshot.body["files"][0]["url"].as_str().unwrap();
        assert_eq!(url, routes::file(&sid, &stored));

        let res = app.get_as("alice", &routes::file(&sid, &stored)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.text, "not really a png");
    }

    #[tokio::test]
    async fn deleting_a_file_removes_the_reference() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .upload_as(
                "alice",
                &routes::files(&sid),
                "notes.txt",
                b"scratch".to_vec(),
                "text/plain",
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let stored = res.body["files"][0]["filename"].as_str().unwrap().to_string();

        let res = app.delete_as("alice", &routes::file(&sid, &stored)).await;
        assert_eq!(res.status, 200);

        let res = app.get_as("alice", &routes::file(&sid, &stored)).await;
        assert_eq!(res.status, 404);

        // Deleting again stays ok.
        let res = app.delete_as("alice", &routes::file(&sid, &stored)).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn only_the_owner_may_upload() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .upload_as(
                "mallory",
                &routes::files(&sid),
                "notes.txt",
                b"scratch".to_vec(),
                "text/plain",
            )
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }
}
