//! Tests for `crypt watch` against a mock etcd.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::*;

fn node_reply(value: &str, index: u64) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("X-Etcd-Index", index.to_string().as_str())
        .set_body_json(json!({
            "action": "get",
            "node": {
                "key": DB_PASSWORD_KEY,
                "value": value,
                "modifiedIndex": index,
                "createdIndex": 1
            }
        }))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_prints_current_then_changed_value() {
    let t = Test::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/keys/app/db/password"))
        .and(query_param("wait", "true"))
        .and(query_param("waitIndex", "6"))
        .respond_with(node_reply(&t.ciphertext("s3cr3t2"), 6))
        .with_priority(1)
        .mount(&server)
        .await;
    // Later long-polls stay open until the watcher is killed.
    Mock::given(method("GET"))
        .and(query_param("wait", "true"))
        .respond_with(node_reply("unused", 99).set_delay(Duration::from_secs(30)))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/keys/app/db/password"))
        .respond_with(node_reply(&t.ciphertext("s3cr3t"), 5))
        .mount(&server)
        .await;

    let mut child = t.spawn_watch("etcd", &server.uri(), DB_PASSWORD_KEY);
    let stdout = child.stdout.take().unwrap();
    let reader = tokio::task::spawn_blocking(move || {
        BufReader::new(stdout)
            .lines()
            .map_while(Result::ok)
            .take(2)
            .collect::<Vec<String>>()
    });

    let lines = tokio::time::timeout(Duration::from_secs(20), reader).await;
    child.kill().unwrap();
    child.wait().unwrap();

    let lines = lines.expect("watch printed nothing in time").unwrap();
    assert_eq!(lines, vec!["s3cr3t", "s3cr3t2"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_reports_undecodable_value_and_continues() {
    let t = Test::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("waitIndex", "6"))
        .respond_with(node_reply("not ciphertext", 6))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("waitIndex", "7"))
        .respond_with(node_reply(&t.ciphertext("rotated"), 7))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("wait", "true"))
        .respond_with(node_reply("unused", 99).set_delay(Duration::from_secs(30)))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/keys/app/db/password"))
        .respond_with(node_reply(&t.ciphertext("s3cr3t"), 5))
        .mount(&server)
        .await;

    let mut child = t.spawn_watch("etcd", &server.uri(), DB_PASSWORD_KEY);
    let stdout = child.stdout.take().unwrap();
    let reader = tokio::task::spawn_blocking(move || {
        BufReader::new(stdout)
            .lines()
            .map_while(Result::ok)
            .take(2)
            .collect::<Vec<String>>()
    });

    let lines = tokio::time::timeout(Duration::from_secs(20), reader).await;
    child.kill().unwrap();
    child.wait().unwrap();

    let lines = lines.expect("watch printed nothing in time").unwrap();
    assert_eq!(lines, vec!["s3cr3t", "rotated"]);
}
