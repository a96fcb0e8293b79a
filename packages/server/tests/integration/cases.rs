use serde_json::json;

use crate::common::{IDENTITY_HEADER, TestApp, routes};

const ABSENT_FP: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Build an in-memory ZIP archive from `(path, bytes)` entries.
fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        zip.start_file(*name, options).expect("Failed to add zip entry");
        zip.write_all(data).expect("Failed to write zip entry");
    }
    zip.finish().expect("Failed to finish zip").into_inner()
}

async fn snapshot(app: &TestApp, sid: &str) -> serde_json::Value {
    let res = app.get_as("alice", &routes::session(sid)).await;
    assert_eq!(res.status, 200, "{}", res.text);
    res.body
}

mod creation {
    use super::*;

    #[tokio::test]
    async fn stores_case_and_deduplicates_normalized_text() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .post_as(
                "alice",
                &routes::cases(&sid),
                &json!({ "input": "1 2", "output": "3" }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["created"], true);
        let fp = res.body["fingerprint"].as_str().unwrap().to_string();
        assert_eq!(fp.len(), 64);

        // Same data modulo whitespace collapses onto the existing case.
        let res = app
            .post_as(
                "alice",
                &routes::cases(&sid),
                &json!({ "input": "1 2  \r\n", "output": "3\n\n" }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["created"], false);
        assert_eq!(res.body["fingerprint"].as_str().unwrap(), fp);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["case_count"], 1);
    }

    #[tokio::test]
    async fn rejects_input_that_normalizes_to_nothing() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        for input in ["", "   \n\t\n  "] {
            let res = app
                .post_as("alice", &routes::cases(&sid), &json!({ "input": input }))
                .await;
            assert_eq!(res.status, 400, "input {input:?}: {}", res.text);
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
            assert!(res.text.contains("must not be empty"));
        }

        // Without normalization the raw bytes count, whitespace or not.
        let res = app
            .post_as(
                "alice",
                &routes::cases(&sid),
                &json!({ "input": "  \n", "well_form": false }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
    }

    #[tokio::test]
    async fn keeps_raw_bytes_without_well_form() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .post_as(
                "alice",
                &routes::cases(&sid),
                &json!({ "input": "5 6   \n\n", "well_form": false }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let raw_fp = res.body["fingerprint"].as_str().unwrap().to_string();

        let res = app.get_as("alice", &routes::case(&sid, &raw_fp)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["input"], "5 6   \n\n");

        // The normalized rendition is a different case.
        let res = app
            .post_as("alice", &routes::cases(&sid), &json!({ "input": "5 6" }))
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_ne!(res.body["fingerprint"].as_str().unwrap(), raw_fp);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["case_count"], 2);
        assert_eq!(doc["cases"][0]["well_form"], false);
        assert_eq!(doc["cases"][1]["well_form"], true);
    }

    #[tokio::test]
    async fn missing_output_differs_from_empty_output() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let input_only = app.create_case("alice", &sid, "7", None).await;

        let res = app
            .post_as(
                "alice",
                &routes::cases(&sid),
                &json!({ "input": "7", "output": "", "well_form": false }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_ne!(res.body["fingerprint"].as_str().unwrap(), input_only);

        let res = app.get_as("alice", &routes::case(&sid, &input_only)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["input"], "7\n");
        assert!(res.body.get("output").is_none());
    }

    #[tokio::test]
    async fn assigns_sequential_judge_orders() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        app.create_case("alice", &sid, "1", Some("1")).await;
        app.create_case("alice", &sid, "2", Some("4")).await;

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["cases"][0]["order"], 1);
        assert_eq!(doc["cases"][1]["order"], 2);
        assert_eq!(doc["cases"][0]["point"], 10);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let fp = app.create_case("alice", &sid, "1 2", Some("3")).await;

        let res = app.delete_as("alice", &routes::case(&sid, &fp)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "ok");

        let res = app.get_as("alice", &routes::case(&sid, &fp)).await;
        assert_eq!(res.status, 404);

        let res = app.delete_as("alice", &routes::case(&sid, &fp)).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["case_count"], 0);

        // The data itself survives; recreating brings the case back.
        let res = app
            .post_as(
                "alice",
                &routes::cases(&sid),
                &json!({ "input": "1 2", "output": "3" }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["fingerprint"].as_str().unwrap(), fp);
    }

    #[tokio::test]
    async fn creation_requires_edit_access() {
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

        for user in ["carol", "mallory"] {
            let res = app
                .post_as(user, &routes::cases(&sid), &json!({ "input": "1 2" }))
                .await;
            assert_eq!(res.status, 403, "user {user}: {}", res.text);
            assert_eq!(res.body["code"], "PERMISSION_DENIED");
        }

        // Read access still allows previews.
        let fp = app.create_case("alice", &sid, "1 2", None).await;
        let res = app.get_as("carol", &routes::case(&sid, &fp)).await;
        assert_eq!(res.status, 200, "{}", res.text);
    }
}

mod uploads {
    use super::*;

    #[tokio::test]
    async fn unpacks_zip_into_matched_pairs() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let data = build_zip(&[
            ("1.in", b"1 2\n".as_slice()),
            ("1.ans", b"3\n".as_slice()),
            ("2.in", b"4 5\n".as_slice()),
            ("2.out", b"9\n".as_slice()),
        ]);
        let res = app
            .upload_as(
                "alice",
                &routes::cases_upload(&sid),
                "cases.zip",
                data,
                "application/zip",
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["created"], 2);
        assert_eq!(res.body["fingerprints"].as_array().unwrap().len(), 2);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["case_count"], 2);
        assert_eq!(doc["cases"][0]["order"], 1);
        assert_eq!(doc["cases"][1]["order"], 2);
    }

    #[tokio::test]
    async fn sample_directory_cases_sort_first() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let data = build_zip(&[
            ("tests/big.in", b"9 9\n".as_slice()),
            ("tests/big.ans", b"18\n".as_slice()),
            ("sample/1.in", b"1 1\n".as_slice()),
            ("sample/1.ans", b"2\n".as_slice()),
        ]);
        let res = app
            .upload_as(
                "alice",
                &routes::cases_upload(&sid),
                "cases.zip",
                data,
                "application/zip",
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["created"], 2);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["cases"][0]["sample"], true);
        assert_eq!(doc["cases"][0]["order"], 1);
        assert_eq!(doc["cases"][1]["sample"], false);
        assert_eq!(doc["sample_count"], 1);
    }

    #[tokio::test]
    async fn rejects_unmatched_pairs() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let data = build_zip(&[("3.in", b"1\n".as_slice())]);
        let res = app
            .upload_as(
                "alice",
                &routes::cases_upload(&sid),
                "cases.zip",
                data,
                "application/zip",
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert!(res.text.contains(".in files without matching .ans: 3"));

        let data = build_zip(&[("4.ans", b"1\n".as_slice())]);
        let res = app
            .upload_as(
                "alice",
                &routes::cases_upload(&sid),
                "cases.zip",
                data,
                "application/zip",
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert!(res.text.contains(".ans files without matching .in: 4"));

        let data = build_zip(&[("notes.txt", b"hello\n".as_slice())]);
        let res = app
            .upload_as(
                "alice",
                &routes::cases_upload(&sid),
                "cases.zip",
                data,
                "application/zip",
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert!(res.text.contains("no .in/.ans case pairs"));
    }

    #[tokio::test]
    async fn plain_file_becomes_single_input_case() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .upload_as(
                "alice",
                &routes::cases_upload(&sid),
                "input01.txt",
                b"10 20\n".to_vec(),
                "text/plain",
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["created"], 1);
        let fp = res.body["fingerprints"][0].as_str().unwrap().to_string();

        let res = app.get_as("alice", &routes::case(&sid, &fp)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["input"], "10 20\n");
        assert!(res.body.get("output").is_none());
    }

    #[tokio::test]
    async fn skips_cases_already_present() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let existing = app.create_case("alice", &sid, "1 2", Some("3")).await;

        let data = build_zip(&[
            ("1.in", b"1 2\n".as_slice()),
            ("1.ans", b"3\n".as_slice()),
            ("2.in", b"4 5\n".as_slice()),
            ("2.ans", b"9\n".as_slice()),
        ]);
        let res = app
            .upload_as(
                "alice",
                &routes::cases_upload(&sid),
                "cases.zip",
                data,
                "application/zip",
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["created"], 1);
        assert_ne!(res.body["fingerprints"][0].as_str().unwrap(), existing);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["case_count"], 2);
    }

    #[tokio::test]
    async fn upload_requires_session_owner() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .upload_as(
                "mallory",
                &routes::cases_upload(&sid),
                "cases.zip",
                build_zip(&[("1.in", b"1\n".as_slice()), ("1.ans", b"1\n".as_slice())]),
                "application/zip",
            )
            .await;
        assert_eq!(res.status, 403, "{}", res.text);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }
}

mod ordering {
    use super::*;

    #[tokio::test]
    async fn reorder_assigns_positions() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let a = app.create_case("alice", &sid, "1", Some("1")).await;
        let b = app.create_case("alice", &sid, "2", Some("4")).await;

        let res = app
            .put_as(
                "alice",
                &routes::cases_reorder(&sid),
                &json!({ "ordered": [b, a] }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["cases"][0]["fingerprint"].as_str().unwrap(), b);
        assert_eq!(doc["cases"][0]["order"], 1);
        assert_eq!(doc["cases"][1]["fingerprint"].as_str().unwrap(), a);
        assert_eq!(doc["cases"][1]["order"], 2);
    }

    #[tokio::test]
    async fn reorder_parks_unused_cases() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let a = app.create_case("alice", &sid, "1", Some("1")).await;
        let b = app.create_case("alice", &sid, "2", Some("4")).await;

        let res = app
            .put_as(
                "alice",
                &routes::cases_reorder(&sid),
                &json!({ "ordered": [a], "unused": [b] }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["case_count"], 1);
        assert_eq!(doc["cases"][0]["fingerprint"].as_str().unwrap(), a);
        assert_eq!(doc["cases"][1]["fingerprint"].as_str().unwrap(), b);
        assert_eq!(doc["cases"][1]["order"], 0);
        assert_eq!(doc["cases"][1]["used"], false);
    }

    #[tokio::test]
    async fn reorder_rejects_unknown_and_duplicate_fingerprints() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let a = app.create_case("alice", &sid, "1", Some("1")).await;

        let res = app
            .put_as(
                "alice",
                &routes::cases_reorder(&sid),
                &json!({ "ordered": [ABSENT_FP] }),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert!(res.text.contains("does not exist"));

        let res = app
            .put_as(
                "alice",
                &routes::cases_reorder(&sid),
                &json!({ "ordered": [a], "unused": [a] }),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert!(res.text.contains("Duplicate fingerprint"));
    }

    #[tokio::test]
    async fn set_point_updates_weight() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let fp = app.create_case("alice", &sid, "1", Some("1")).await;

        let res = app
            .put_as("alice", &routes::case_point(&sid, &fp), &json!({ "point": 30 }))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["cases"][0]["point"], 30);

        let res = app
            .put_as(
                "alice",
                &routes::case_point(&sid, ABSENT_FP),
                &json!({ "point": 30 }),
            )
            .await;
        assert_eq!(res.status, 404, "{}", res.text);
    }

    #[tokio::test]
    async fn toggles_flip_flags() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let fp = app.create_case("alice", &sid, "1", Some("1")).await;

        let res = app
            .post_as("alice", &routes::case_pretest(&sid, &fp), &json!({}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["enabled"], true);

        let res = app
            .post_as("alice", &routes::case_sample(&sid, &fp), &json!({}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["enabled"], true);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["pretest_count"], 1);
        assert_eq!(doc["sample_count"], 1);

        let res = app
            .post_as("alice", &routes::case_pretest(&sid, &fp), &json!({}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["enabled"], false);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["pretest_count"], 0);
    }
}

mod reform {
    use super::*;

    #[tokio::test]
    async fn reform_normalizes_raw_case() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .post_as(
                "alice",
                &routes::cases(&sid),
                &json!({ "input": "1 2   \n\n\n", "output": "3   \n", "well_form": false }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let raw_fp = res.body["fingerprint"].as_str().unwrap().to_string();

        let res = app
            .post_as("alice", &routes::case_reform(&sid, &raw_fp), &json!({}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["reformed"], 1);

        let res = app.get_as("alice", &routes::case(&sid, &raw_fp)).await;
        assert_eq!(res.status, 404);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["case_count"], 1);
        let new_fp = doc["cases"][0]["fingerprint"].as_str().unwrap().to_string();
        assert_ne!(new_fp, raw_fp);
        assert_eq!(doc["cases"][0]["well_form"], true);

        let res = app.get_as("alice", &routes::case(&sid, &new_fp)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["input"], "1 2\n");
        assert_eq!(res.body["output"], "3\n");

        // Entering the clean text now hits the reformed case.
        let res = app
            .post_as(
                "alice",
                &routes::cases(&sid),
                &json!({ "input": "1 2", "output": "3" }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["created"], false);
    }

    #[tokio::test]
    async fn reform_is_noop_for_normalized_case() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let fp = app.create_case("alice", &sid, "1 2", Some("3")).await;

        let res = app
            .post_as("alice", &routes::case_reform(&sid, &fp), &json!({}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["reformed"], 0);

        let res = app.get_as("alice", &routes::case(&sid, &fp)).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn reform_all_reports_changed_count() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        for input in ["a  \n", "b\t\n"] {
            let res = app
                .post_as(
                    "alice",
                    &routes::cases(&sid),
                    &json!({ "input": input, "well_form": false }),
                )
                .await;
            assert_eq!(res.status, 201, "{}", res.text);
        }
        app.create_case("alice", &sid, "c", None).await;

        let res = app
            .post_as("alice", &routes::cases_reform(&sid), &json!({}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["reformed"], 2);

        let doc = snapshot(&app, &sid).await;
        assert_eq!(doc["case_count"], 3);
    }

    #[tokio::test]
    async fn reform_input_only_keeps_output_bytes() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app
            .post_as(
                "alice",
                &routes::cases(&sid),
                &json!({ "input": "x  \n", "output": "y  \n", "well_form": false }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let raw_fp = res.body["fingerprint"].as_str().unwrap().to_string();

        let res = app
            .post_as(
                "alice",
                &routes::case_reform(&sid, &raw_fp),
                &json!({ "input_only": true }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["reformed"], 1);

        let doc = snapshot(&app, &sid).await;
        let new_fp = doc["cases"][0]["fingerprint"].as_str().unwrap().to_string();
        assert_eq!(doc["cases"][0]["well_form"], false);

        let res = app.get_as("alice", &routes::case(&sid, &new_fp)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["input"], "x\n");
        assert_eq!(res.body["output"], "y  \n");
    }
}

mod downloads {
    use super::*;

    #[tokio::test]
    async fn serves_input_and_output_as_attachments() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let fp = app.create_case("alice", &sid, "1 2", Some("3")).await;

        let res = app
            .client
            .get(format!("http://{}{}", app.addr, routes::case_input(&sid, &fp)))
            .header(IDENTITY_HEADER, "alice")
            .send()
            .await
            .expect("Failed to send GET request");
        assert_eq!(res.status().as_u16(), 200);
        let content_type = res
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert_eq!(content_type, "text/plain; charset=utf-8");
        let disposition = res
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(disposition.contains(&format!("{fp}.in")), "{disposition}");
        assert_eq!(res.text().await.unwrap(), "1 2\n");

        let res = app.get_as("alice", &routes::case_output(&sid, &fp)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.text, "3\n");
    }

    #[tokio::test]
    async fn download_missing_output_is_not_found() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;
        let fp = app.create_case("alice", &sid, "7", None).await;

        let res = app.get_as("alice", &routes::case_output(&sid, &fp)).await;
        assert_eq!(res.status, 404, "{}", res.text);
        assert_eq!(res.body["code"], "NOT_FOUND");
        assert!(res.text.contains("has no output"));
    }

    #[tokio::test]
    async fn malformed_fingerprint_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, sid) = app.create_problem("alice", "aplusb").await;

        let res = app.get_as("alice", &routes::case(&sid, "zzzz")).await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert!(res.text.contains("Invalid case fingerprint"));

        let res = app.get_as("alice", &routes::case(&sid, ABSENT_FP)).await;
        assert_eq!(res.status, 404, "{}", res.text);
        assert!(res.text.contains("not found"));
    }
}
