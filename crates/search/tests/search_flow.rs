use codesearch_indexer::MaintainerConfig;
use codesearch_protocol::{HintRequest, IndexDescriptor, IndexStatus, SearchRequest};
use codesearch_search::{hints_snapshot, search_snapshot, IndexManagement};
use codesearch_store::{IndexPoolRegistry, TantivyStore};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    management: IndexManagement,
    descriptor: IndexDescriptor,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("nested")).unwrap();
    fs::write(
        src.join("Program.cs"),
        "class Program { static void Main() { var FooBar = new FooBar(); } }",
    )
    .unwrap();
    fs::write(
        src.join("nested").join("notes.md"),
        "Configure the foobar service.\nIt's a content for test",
    )
    .unwrap();
    fs::write(src.join("lib.rs"), "pub fn configure() -> Config { todo() }").unwrap();

    let descriptor = IndexDescriptor::new("fixture", &src, temp.path().join("index"));
    let management = IndexManagement::new(
        Arc::new(IndexPoolRegistry::new(Arc::new(TantivyStore::persistent()))),
        MaintainerConfig::default(),
    );
    Fixture {
        _temp: temp,
        management,
        descriptor,
    }
}

fn names(hits: &[codesearch_protocol::CodeDocument]) -> Vec<String> {
    let mut names: Vec<String> = hits.iter().map(|h| h.file_name.clone()).collect();
    names.sort();
    names
}

#[tokio::test(flavor = "multi_thread")]
async fn search_over_a_running_index() {
    let fx = fixture();
    let id = fx.management.add_index(fx.descriptor.clone()).result.unwrap();
    assert!(fx.management.start_index(id).await.is_success());
    assert!(fx.management.status(id).result.unwrap().status.is_serving());

    let hits = fx
        .management
        .search(id, SearchRequest::content("foobar"))
        .await
        .result
        .unwrap();
    assert_eq!(names(&hits), vec!["Program.cs", "notes.md"]);

    let case_sensitive = SearchRequest {
        case_sensitive: true,
        ..SearchRequest::content("FooBar")
    };
    let hits = fx.management.search(id, case_sensitive).await.result.unwrap();
    assert_eq!(names(&hits), vec!["Program.cs"]);

    let scoped = SearchRequest {
        file_extension: Some("rs".to_string()),
        ..SearchRequest::content("config*")
    };
    let hits = fx.management.search(id, scoped).await.result.unwrap();
    assert_eq!(names(&hits), vec!["lib.rs"]);

    let phrase = SearchRequest {
        phrase_query: true,
        ..SearchRequest::content("new FooB*()")
    };
    let hits = fx.management.search(id, phrase).await.result.unwrap();
    assert_eq!(names(&hits), vec!["Program.cs"]);

    let by_pk = SearchRequest {
        code_pk: Some(hits[0].code_pk.clone()),
        ..SearchRequest::default()
    };
    let again = fx.management.search(id, by_pk).await.result.unwrap();
    assert_eq!(again, hits);

    let hints = fx
        .management
        .hints(
            id,
            HintRequest {
                prefix: "conf".to_string(),
                case_sensitive: false,
                limit: 10,
            },
        )
        .await
        .result
        .unwrap();
    assert_eq!(hints, vec!["Config", "Configure", "configure"]);

    assert!(fx.management.stop_index(id).await.is_success());
    assert_eq!(
        fx.management.status(id).result.unwrap().status,
        IndexStatus::Disposed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshot_reads_after_stop() {
    let fx = fixture();
    let id = fx.management.add_index(fx.descriptor.clone()).result.unwrap();
    assert!(fx.management.start_index(id).await.is_success());
    fx.management.shutdown().await;

    let hits = search_snapshot(&fx.descriptor, &SearchRequest::content("\"a content for\"")).unwrap();
    assert_eq!(names(&hits), vec!["notes.md"]);

    let hints = hints_snapshot(
        &fx.descriptor,
        &HintRequest {
            prefix: "Conf".to_string(),
            case_sensitive: true,
            limit: 10,
        },
    )
    .unwrap();
    assert_eq!(hints, vec!["Config", "Configure"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_requests_report_failures() {
    let fx = fixture();
    let id = fx.management.add_index(fx.descriptor.clone()).result.unwrap();
    assert!(fx.management.start_index(id).await.is_success());

    let empty = fx.management.search(id, SearchRequest::default()).await;
    assert!(!empty.is_success());

    let leading = fx.management.search(id, SearchRequest::content("*bar")).await;
    assert!(!leading.is_success());
    assert!(leading.status.status_desc.starts_with("Not supported"));

    let unbalanced = fx.management.search(id, SearchRequest::content("(foo")).await;
    assert!(!unbalanced.is_success());

    fx.management.shutdown().await;
}
