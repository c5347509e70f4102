//! Collection access and dashboard counts over real HTTP

use mockito::Matcher;
use serde_json::{json, Value};

use erp_client::{ErrorKind, Listing, Resource};

use crate::test_harness::TestBackend;

#[tokio::test]
async fn test_create_then_fetch_project() {
    let mut backend = TestBackend::start().await;
    backend.login().await;

    let create = backend
        .server
        .mock("POST", "/api/projects/")
        .match_header("authorization", "Bearer t1")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({"name": "North Yard"})))
        .with_status(201)
        .with_body(r#"{"id": 12, "name": "North Yard", "status": "planning"}"#)
        .expect(1)
        .create_async()
        .await;
    backend
        .mock_json("GET", "/api/projects/12/", 200, json!({"id": 12, "name": "North Yard"}))
        .await;

    let projects = backend.client.resource(Resource::Projects);
    let created: Value = projects
        .create(&json!({"name": "North Yard", "budget": "250000.00"}))
        .await
        .unwrap();
    assert_eq!(created["status"], "planning");

    let fetched: Value = projects.get(12).await.unwrap();
    assert_eq!(fetched["name"], "North Yard");
    create.assert_async().await;
}

#[tokio::test]
async fn test_validation_errors_come_back_per_field() {
    let mut backend = TestBackend::start().await;
    backend.login().await;
    backend
        .mock_json(
            "POST",
            "/api/invoices/",
            400,
            json!({"amount": ["A valid number is required."], "due_date": ["This field is required."]}),
        )
        .await;

    let err = backend
        .client
        .resource(Resource::Invoices)
        .create(&json!({"amount": "abc"}))
        .await
        .map(|_: Value| ())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    let fields = err.field_errors();
    assert_eq!(fields["amount"], vec!["A valid number is required."]);
    assert!(fields.contains_key("due_date"));
}

#[tokio::test]
async fn test_paginated_listing_with_filters() {
    let mut backend = TestBackend::start().await;
    backend.login().await;
    backend
        .server
        .mock("GET", "/api/tasks/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("project".into(), "3".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "count": 27,
                "next": null,
                "previous": format!("{}/api/tasks/?project=3", backend.server.url()),
                "results": [{"id": 21}, {"id": 22}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let listing: Listing<Value> = backend
        .client
        .resource(Resource::Tasks)
        .list_where(&[("project", "3"), ("page", "2")])
        .await
        .unwrap();
    assert_eq!(listing.total(), 27);
    assert_eq!(listing.items().len(), 2);
    assert!(!listing.has_next());
}

#[tokio::test]
async fn test_dashboard_counts_tolerate_failures() {
    let mut backend = TestBackend::start().await;
    backend.login().await;
    backend
        .mock_json("GET", "/api/projects/", 200, json!({"count": 4, "results": []}))
        .await;
    backend
        .mock_json("GET", "/api/employees/", 200, json!([{"id": 1}, {"id": 2}, {"id": 3}]))
        .await;
    backend
        .mock_json("GET", "/api/equipment/", 500, json!({"detail": "Server error"}))
        .await;

    let stats = backend.client.dashboard().await;
    assert_eq!(stats.projects, 4);
    assert_eq!(stats.employees, 3);
    assert_eq!(stats.equipment, 0);
}
