// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

mod helpers;

use std::fs;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pomscout::config::GithubConfig;
use pomscout::domain::{CsvRepo, Repo, Report};
use pomscout::services::github::Github;
use pomscout::services::scraper::{POM_FILES, Scraper};
use pomscout::services::store::DataStore;

fn scraper(server: &MockServer, store: &DataStore) -> Scraper {
    scraper_with(server, store, 100, CancellationToken::new())
}

fn scraper_with(
    server: &MockServer,
    store: &DataStore,
    batch_size: usize,
    cancel: CancellationToken,
) -> Scraper {
    let config = GithubConfig {
        batch_size,
        ..helpers::github_config(&server.uri())
    };
    let gh = Github::new(helpers::tokens(&["first"]), &config).unwrap();
    Scraper::new(gh, store.clone(), &config, cancel)
}

fn java_node(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "nameWithOwner": name,
        "languages": { "nodes": [{ "name": "Java" }] }
    })
}

async fn mount_empty_tree(server: &MockServer, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{name}/git/trees/HEAD")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tree": [] })))
        .mount(server)
        .await;
}

async fn mount_widgets_tree(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/git/trees/HEAD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tree": [
                { "path": "pom.xml" },
                { "path": "README.md" },
                { "path": "core/pom.xml" },
                { "path": ".github/workflows/release.yml" }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/raw/acme/widgets/HEAD/pom.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<project/>"))
        .mount(server)
        .await;
    // core/pom.xml is not mounted, the mock server answers 404
}

fn read_csv(path: &std::path::Path) -> Vec<CsvRepo> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize::<CsvRepo>()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[tokio::test]
async fn fetch_and_download_keeps_java_repositories_and_advances_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repositories"))
        .and(query_param("since", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 5, "full_name": "acme/widgets", "node_id": "N5", "fork": false },
            { "id": 7, "full_name": "bob/widgets", "node_id": "N7", "fork": true },
            { "id": 9, "full_name": "acme/site", "node_id": "N9", "fork": false }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repositories"))
        .and(query_param("since", "9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "nodes": [
                    {
                        "id": "N5",
                        "nameWithOwner": "acme/widgets",
                        "languages": { "nodes": [{ "name": "Java" }] }
                    },
                    {
                        "id": "N9",
                        "nameWithOwner": "acme/site",
                        "languages": { "nodes": [{ "name": "HTML" }] }
                    }
                ],
                "rateLimit": { "cost": 1 }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_widgets_tree(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path()).await.unwrap();
    scraper(&server, &store).fetch_and_download().await.unwrap();

    let rows = read_csv(&dir.path().join("github.csv"));
    assert_eq!(
        rows,
        vec![CsvRepo {
            id: "N5".into(),
            name: "acme/widgets".into(),
            has_pom: true,
        }]
    );

    assert_eq!(
        fs::read_to_string(dir.path().join("poms/acme.widgets/pom.xml")).unwrap(),
        "<project/>"
    );
    assert!(!dir.path().join("poms/acme.widgets/core/pom.xml").exists());
    assert!(!dir.path().join("poms/acme.widgets/README.md").exists());
    assert!(!dir.path().join("poms/acme.widgets/.github").exists());

    assert_eq!(fs::read_to_string(dir.path().join("fetched")).unwrap(), "N5\n");

    let state: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join("state.json")).unwrap()).unwrap();
    assert_eq!(state["last_id"]["github"], 9);

    let reopened = DataStore::open(dir.path()).await.unwrap();
    assert_eq!(reopened.last_id(), 9);
}

#[tokio::test]
async fn download_files_skips_fetched_repositories() {
    let server = MockServer::start().await;
    mount_widgets_tree(&server).await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/done/git/trees/HEAD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tree": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path()).await.unwrap();
    let done = Repo {
        id: "N1".into(),
        name: "acme/done".into(),
    };
    store.store_repo(done.clone().into_csv(false)).await.unwrap();
    store
        .store_repo(
            Repo {
                id: "N5".into(),
                name: "acme/widgets".into(),
            }
            .into_csv(false),
        )
        .await
        .unwrap();
    store.mark_fetched(&done).await.unwrap();

    scraper(&server, &store).download_files().await.unwrap();

    assert!(dir.path().join("poms/acme.widgets/pom.xml").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("fetched")).unwrap(),
        "N1\nN5\n"
    );
    assert!(store.non_fetched_repos().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_tree_marks_repository_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/gone/git/trees/HEAD"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "Git Repository is empty."
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path()).await.unwrap();
    let repo = Repo {
        id: "N3".into(),
        name: "acme/gone".into(),
    };

    let found = scraper(&server, &store)
        .fetch_all_files_for(&repo, &POM_FILES)
        .await
        .unwrap();

    assert!(!found);
    assert_eq!(fs::read_to_string(dir.path().join("fetched")).unwrap(), "N3\n");
}

#[tokio::test]
async fn existing_files_are_not_downloaded_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/git/trees/HEAD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tree": [{ "path": "pom.xml" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/raw/acme/widgets/HEAD/pom.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<project>new</project>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path()).await.unwrap();
    let repo = Repo {
        id: "N5".into(),
        name: "acme/widgets".into(),
    };
    store.write_pom(&repo, "pom.xml", b"<project>old</project>").await.unwrap();

    let found = scraper(&server, &store)
        .fetch_all_files_for(&repo, &POM_FILES)
        .await
        .unwrap();

    assert!(found);
    assert_eq!(
        fs::read_to_string(dir.path().join("poms/acme.widgets/pom.xml")).unwrap(),
        "<project>old</project>"
    );
}

#[tokio::test]
async fn workflows_are_downloaded_for_reported_distribution_projects() {
    let server = MockServer::start().await;
    mount_widgets_tree(&server).await;
    Mock::given(method("GET"))
        .and(path("/raw/acme/widgets/HEAD/.github/workflows/release.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("on: push\n"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path()).await.unwrap();
    store
        .write_report(&Report {
            total: 1,
            has_distro_repos: vec!["acme.widgets".into()],
            ..Report::default()
        })
        .await
        .unwrap();

    let count = scraper(&server, &store)
        .download_all_workflows()
        .await
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("poms/acme.widgets/.github/workflows/release.yml"))
            .unwrap(),
        "on: push\n"
    );
    assert!(!dir.path().join("poms/acme.widgets/pom.xml").exists());
}

#[tokio::test]
async fn workflows_require_a_report() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path()).await.unwrap();

    let err = scraper(&server, &store)
        .download_all_workflows()
        .await
        .unwrap_err();
    assert!(matches!(err, pomscout::Error::MissingReport { .. }));
}

#[tokio::test]
async fn full_batches_load_concurrently_and_a_failed_batch_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repositories"))
        .and(query_param("since", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "full_name": "acme/one", "node_id": "N1", "fork": false },
            { "id": 2, "full_name": "acme/two", "node_id": "N2", "fork": false },
            { "id": 3, "full_name": "acme/three", "node_id": "N3", "fork": false },
            { "id": 4, "full_name": "acme/four", "node_id": "N4", "fork": false },
            { "id": 5, "full_name": "acme/five", "node_id": "N5", "fork": false }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repositories"))
        .and(query_param("since", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    // first batch [N1, N2] fails, second [N3, N4] and the leftover [N5] succeed
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("\"N1\""))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("\"N3\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "nodes": [
                    java_node("N3", "acme/three"),
                    {
                        "id": "N4",
                        "nameWithOwner": "acme/four",
                        "languages": { "nodes": [{ "name": "Go" }] }
                    }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("\"N5\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "nodes": [java_node("N5", "acme/five")] }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_empty_tree(&server, "acme/three").await;
    mount_empty_tree(&server, "acme/five").await;

    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path()).await.unwrap();
    scraper_with(&server, &store, 2, CancellationToken::new())
        .fetch_and_download()
        .await
        .unwrap();

    let ids: Vec<String> = read_csv(&dir.path().join("github.csv"))
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["N3", "N5"]);
    assert_eq!(store.last_id(), 5);
}

#[tokio::test]
async fn cancelled_scrape_stops_after_one_page_and_loads_leftovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repositories"))
        .and(query_param("since", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 5, "full_name": "acme/five", "node_id": "N5", "fork": false }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repositories"))
        .and(query_param("since", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 6, "full_name": "acme/six", "node_id": "N6", "fork": false }
        ])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "nodes": [java_node("N5", "acme/five")] }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_empty_tree(&server, "acme/five").await;

    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path()).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    scraper_with(&server, &store, 100, cancel)
        .fetch_and_download()
        .await
        .unwrap();

    let rows = read_csv(&dir.path().join("github.csv"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "N5");
    assert_eq!(DataStore::open(dir.path()).await.unwrap().last_id(), 5);
}

#[tokio::test]
async fn cancelled_download_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/git/trees/HEAD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tree": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path()).await.unwrap();
    store
        .store_repo(
            Repo {
                id: "N5".into(),
                name: "acme/widgets".into(),
            }
            .into_csv(false),
        )
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    scraper_with(&server, &store, 100, cancel)
        .download_files()
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("fetched")).unwrap(), "");
    assert_eq!(store.non_fetched_repos().await.unwrap().len(), 1);
}
