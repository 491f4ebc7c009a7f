//! Integration tests for the ElasticClient using mockito for HTTP mocking.

use flat_index_sync::error::SearchEngineError;
use flat_index_sync::models::{FlatPair, IndexedDocument, SeqToken, SourceRef};
use flat_index_sync::repositories::SearchEngine;
use flat_index_sync::{ElasticClient, ElasticSearchEngine, Metrics};
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

fn client(server: &Server) -> ElasticClient {
    ElasticClient::new(
        server.url(),
        Some("secret".to_string()),
        Duration::from_secs(5),
        Metrics::new(),
    )
}

fn sample_doc(version: i64) -> IndexedDocument {
    IndexedDocument {
        flat: vec![FlatPair::new("name", "Ada")],
        update_version: version,
        update_at: 1_700_000_000_000,
        update_at_time_zone: 0,
        source: SourceRef::new("crm", "contacts"),
        deleted: false,
    }
}

fn source_json(version: i64) -> serde_json::Value {
    json!({
        "flat": [{"path": "name", "value": "Ada"}],
        "updateVersion": version,
        "updateAt": 1_700_000_000_000i64,
        "updateAtTimeZone": 0,
        "source": {"dbName": "crm", "collName": "contacts"}
    })
}

#[test]
fn test_get_document_with_token() {
    let mut server = Server::new();

    let mock = server
        .mock("GET", "/people/_doc/m1")
        .match_header("authorization", "ApiKey secret")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "_index": "people",
                "_id": "m1",
                "found": true,
                "_seq_no": 7,
                "_primary_term": 2,
                "_source": source_json(3)
            })
            .to_string(),
        )
        .create();

    let hit = client(&server).get_document("people", "m1").unwrap().unwrap();

    mock.assert();
    assert_eq!(hit.id, "m1");
    assert_eq!(hit.document.update_version, 3);
    assert_eq!(hit.document.flat, vec![FlatPair::new("name", "Ada")]);
    assert_eq!(
        hit.token,
        SeqToken {
            seq_no: 7,
            primary_term: 2
        }
    );
}

#[test]
fn test_get_missing_document_is_none() {
    let mut server = Server::new();

    let mock = server
        .mock("GET", "/people/_doc/m1")
        .with_status(404)
        .with_body(r#"{"_index":"people","_id":"m1","found":false}"#)
        .create();

    let result = client(&server).get_document("people", "m1").unwrap();

    mock.assert();
    assert!(result.is_none());
}

#[test]
fn test_get_on_missing_index_is_an_error() {
    let mut server = Server::new();

    let _mock = server
        .mock("GET", "/people/_doc/m1")
        .with_status(404)
        .with_body(r#"{"error":{"type":"index_not_found_exception"},"status":404}"#)
        .create();

    let err = client(&server).get_document("people", "m1").unwrap_err();
    assert!(matches!(err, SearchEngineError::NotFound(ref msg) if msg == "index people"));
}

#[test]
fn test_create_only_put() {
    let mut server = Server::new();

    let mock = server
        .mock("PUT", "/people/_doc/m1")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("op_type".into(), "create".into()),
            Matcher::UrlEncoded("refresh".into(), "wait_for".into()),
        ]))
        .match_body(Matcher::PartialJson(json!({"updateVersion": 1})))
        .with_status(201)
        .with_body(r#"{"_id":"m1","result":"created","_seq_no":0,"_primary_term":1}"#)
        .create();

    let token = client(&server)
        .put_document("people", "m1", &sample_doc(1), None)
        .unwrap();

    mock.assert();
    assert_eq!(
        token,
        SeqToken {
            seq_no: 0,
            primary_term: 1
        }
    );
}

#[test]
fn test_conditional_put_conflict() {
    let mut server = Server::new();

    let mock = server
        .mock("PUT", "/people/_doc/m1")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("if_seq_no".into(), "4".into()),
            Matcher::UrlEncoded("if_primary_term".into(), "1".into()),
        ]))
        .with_status(409)
        .with_body(r#"{"error":{"type":"version_conflict_engine_exception"},"status":409}"#)
        .create();

    let c = client(&server);
    let expected = SeqToken {
        seq_no: 4,
        primary_term: 1,
    };
    let err = c
        .put_document("people", "m1", &sample_doc(2), Some(expected))
        .unwrap_err();

    mock.assert();
    assert!(matches!(err, SearchEngineError::VersionConflict { ref id } if id == "m1"));
    assert_eq!(c.metrics().http_errors_total(), 1);
}

#[test]
fn test_tombstone_is_a_conditional_replace() {
    let mut server = Server::new();

    let mock = server
        .mock("PUT", "/people/_doc/m1")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("if_seq_no".into(), "9".into()),
            Matcher::UrlEncoded("if_primary_term".into(), "3".into()),
        ]))
        .match_body(Matcher::PartialJson(json!({
            "flat": [],
            "updateVersion": 5,
            "deleted": true
        })))
        .with_status(200)
        .with_body(r#"{"_id":"m1","result":"updated","_seq_no":10,"_primary_term":3}"#)
        .create();

    let tombstone =
        IndexedDocument::tombstone(5, 1_700_000_000_000, 0, SourceRef::new("crm", "contacts"));
    let token = client(&server)
        .put_document(
            "people",
            "m1",
            &tombstone,
            Some(SeqToken {
                seq_no: 9,
                primary_term: 3,
            }),
        )
        .unwrap();

    mock.assert();
    assert_eq!(token.seq_no, 10);
}

#[test]
fn test_candidates_are_sorted_by_id() {
    let mut server = Server::new();

    let mock = server
        .mock("POST", "/people/_search")
        .match_body(Matcher::PartialJson(json!({
            "size": 50,
            "seq_no_primary_term": true,
            "sort": ["_doc"],
            "query": {"bool": {"must_not": [{"term": {"deleted": true}}]}}
        })))
        .with_status(200)
        .with_body(
            json!({
                "hits": {"hits": [
                    {"_id": "b", "_seq_no": 2, "_primary_term": 1, "_source": source_json(1)},
                    {"_id": "a", "_seq_no": 1, "_primary_term": 1, "_source": source_json(4)}
                ]}
            })
            .to_string(),
        )
        .create();

    let hits = client(&server)
        .search_candidates("people", "Ad", true, true, 50)
        .unwrap();

    mock.assert();
    let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(hits[0].document.update_version, 4);
}

#[test]
fn test_ensure_index_creates_missing_index() {
    let mut server = Server::new();

    let lookup = server
        .mock("GET", "/people/_mapping")
        .with_status(404)
        .with_body(r#"{"error":{"type":"index_not_found_exception"},"status":404}"#)
        .create();
    let create = server
        .mock("PUT", "/people")
        .match_body(Matcher::PartialJson(json!({
            "mappings": {"properties": {"flat": {"properties": {
                "path": {"type": "keyword"},
                "value": {"type": "keyword"}
            }}}}
        })))
        .with_status(200)
        .with_body(r#"{"acknowledged":true}"#)
        .create();

    client(&server).ensure_index("people").unwrap();

    lookup.assert();
    create.assert();
}

#[test]
fn test_ensure_index_rejects_incompatible_mapping() {
    let mut server = Server::new();

    let _mock = server
        .mock("GET", "/people/_mapping")
        .with_status(200)
        .with_body(
            json!({"people": {"mappings": {"properties": {
                "flat": {"properties": {
                    "path": {"type": "text"},
                    "value": {"type": "keyword"}
                }},
                "updateVersion": {"type": "long"}
            }}}})
            .to_string(),
        )
        .create();

    let err = client(&server).ensure_index("people").unwrap_err();
    assert!(matches!(err, SearchEngineError::Configuration(ref msg) if msg.contains("flat.path")));
}

#[test]
fn test_clear_index_reports_deleted() {
    let mut server = Server::new();

    let mock = server
        .mock("POST", "/people/_delete_by_query")
        .match_query(Matcher::UrlEncoded("conflicts".into(), "proceed".into()))
        .with_status(200)
        .with_body(r#"{"deleted": 12, "failures": []}"#)
        .create();

    assert_eq!(client(&server).clear_index("people").unwrap(), 12);
    mock.assert();
}

#[test]
fn test_server_error_is_transient() {
    let mut server = Server::new();

    let _mock = server
        .mock("POST", "/people/_count")
        .with_status(503)
        .with_body("unavailable")
        .create();

    let err = client(&server).count("people").unwrap_err();
    assert!(matches!(err, SearchEngineError::ApiError { status: 503, .. }));
    assert!(err.is_transient());
}

#[test]
fn test_connection_refused_is_transient() {
    let client = ElasticClient::with_base_url("http://127.0.0.1:1".to_string());
    let err = client.count("people").unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_async_engine_offloads_blocking_calls() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", "/people/_count")
        .match_body(Matcher::PartialJson(json!({
            "query": {"bool": {"must_not": [{"term": {"deleted": true}}]}}
        })))
        .with_status(200)
        .with_body(r#"{"count": 3}"#)
        .create_async()
        .await;

    let engine = ElasticSearchEngine::new(ElasticClient::with_base_url(server.url()));
    assert_eq!(engine.count("people").await.unwrap(), 3);
    mock.assert_async().await;
}
