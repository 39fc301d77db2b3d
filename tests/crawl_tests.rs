//! Integration tests for the crawler
//!
//! A wiremock server plays the catalog site: a category index, per-category
//! listings, and per-book detail pages.

use std::path::Path;
use std::time::Duration;

use haodoo_shelf::{BookRecord, BookStatus, CatalogStore, Crawler, Settings, ShelfError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings(server_uri: &str, output: &Path) -> Settings {
    Settings {
        start_url: format!("{server_uri}/index?M=hd"),
        output: output.to_path_buf(),
        download_dir: output.parent().expect("temp parent").join("books"),
        sleep: Duration::ZERO,
        timeout: Duration::from_secs(5),
        user_agent: "shelf-test/1.0".to_string(),
        max_categories: 0,
        max_books: 0,
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body.to_string())
}

/// Mounts a small two-book catalog: index → one category → two details
async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(html(r#"<a href="/cat?M=hd&P=100">武俠小說</a>"#))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cat"))
        .respond_with(html(
            r#"<a href="/book?M=book&P=1">金庸《笑傲江湖》</a>
               <a href="/book?M=book&P=2">絕代雙驕</a>
               <a href="/index?M=hd">回首頁</a>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/book"))
        .and(query_param("P", "1"))
        .respond_with(html(
            r#"<font color="CC0000">金庸</font>《笑傲江湖》
               <a href="/files/p1.epub">直式 epub</a>
               <a href="/files/p1h.epub">epub</a>"#,
        ))
        .mount(server)
        .await;

    // Listing gave no author for book 2; the detail page is authoritative.
    Mock::given(method("GET"))
        .and(path("/book"))
        .and(query_param("P", "2"))
        .respond_with(html(
            r#"<font color="CC0000">古龍</font>《絕代雙驕》
               <a href="/files/p2.epub">epub</a>"#,
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_builds_catalog() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("books.csv");
    let settings = test_settings(&server.uri(), &output);

    let mut store = CatalogStore::new();
    let crawler = Crawler::new(settings.clone()).expect("crawler");
    let summary = crawler.run(&mut store).await.expect("crawl failed");

    assert_eq!(summary.categories, 1);
    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.page_errors, 0);
    assert_eq!(store.len(), 2);

    let first = store
        .get(&format!("{}/book?M=book&P=1", server.uri()))
        .expect("book 1");
    assert_eq!(first.category, "武俠小說");
    assert_eq!(first.author, "金庸");
    assert_eq!(first.title, "笑傲江湖");
    assert_eq!(first.status, BookStatus::Pending);
    // Vertical-layout epub wins over the plain one.
    assert_eq!(first.download_url, format!("{}/files/p1.epub", server.uri()));
    assert_eq!(first.download_name, "p1.epub");

    // Author missing from the listing is filled from the detail page.
    let second = store
        .get(&format!("{}/book?M=book&P=2", server.uri()))
        .expect("book 2");
    assert_eq!(second.author, "古龍");
    assert_eq!(second.download_url, format!("{}/files/p2.epub", server.uri()));

    // The table was persisted with the documented header.
    let text = std::fs::read_to_string(&output).expect("read csv");
    assert!(text.starts_with(
        "category,author,title,book_url,download_url,download_name,status,filepath,error"
    ));
}

#[tokio::test]
async fn test_crawl_twice_is_idempotent() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("books.csv");
    let settings = test_settings(&server.uri(), &output);

    let crawler = Crawler::new(settings.clone()).expect("crawler");

    let mut store = CatalogStore::new();
    crawler.run(&mut store).await.expect("first crawl");
    let first_pass = std::fs::read_to_string(&output).expect("read csv");

    // Second run resumes from the persisted table, as a real re-run would.
    let mut store = CatalogStore::load(&output).expect("reload");
    crawler.run(&mut store).await.expect("second crawl");
    let second_pass = std::fs::read_to_string(&output).expect("read csv");

    assert_eq!(first_pass, second_pass);
}

#[tokio::test]
async fn test_recrawl_keeps_detail_author() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(html(r#"<a href="/cat?M=hd&P=100">翻譯小說</a>"#))
        .mount(&server)
        .await;
    // The listing credits a fuller author name than the detail page does.
    Mock::given(method("GET"))
        .and(path("/cat"))
        .respond_with(html(r#"<a href="/book?M=book&P=1">J.K.羅琳《哈利波特》</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/book"))
        .respond_with(html(
            r#"<font color="CC0000">羅琳</font>《哈利波特》
               <a href="/files/hp.epub">epub</a>"#,
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("books.csv");
    let settings = test_settings(&server.uri(), &output);
    let crawler = Crawler::new(settings).expect("crawler");

    let book_url = format!("{}/book?M=book&P=1", server.uri());

    let mut store = CatalogStore::new();
    crawler.run(&mut store).await.expect("first crawl");
    assert_eq!(store.get(&book_url).expect("book").author, "羅琳");

    // A re-run resumes from the persisted table; the listing text must not
    // win back over the detail-page author.
    let mut store = CatalogStore::load(&output).expect("reload");
    crawler.run(&mut store).await.expect("second crawl");
    assert_eq!(store.get(&book_url).expect("book").author, "羅琳");
}

#[tokio::test]
async fn test_max_books_bounds_this_run_not_the_table() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("books.csv");
    let mut settings = test_settings(&server.uri(), &output);
    settings.max_books = 1;

    // A previous run already left a finished record in the table.
    let mut store = CatalogStore::new();
    let mut carried = BookRecord::discovered(
        "武俠",
        "古龍",
        "多情劍客無情劍",
        "https://elsewhere.example/?M=book&P=77",
    );
    carried.status = BookStatus::Done;
    carried.filepath = "/tmp/carried.epub".to_string();
    store.upsert(carried);

    let crawler = Crawler::new(settings).expect("crawler");
    let summary = crawler.run(&mut store).await.expect("crawl failed");

    // The limit counts this run's discoveries, not preexisting rows.
    assert_eq!(summary.discovered, 1);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_crawl_respects_limits() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("books.csv");
    let mut settings = test_settings(&server.uri(), &output);
    settings.max_books = 1;

    let mut store = CatalogStore::new();
    let crawler = Crawler::new(settings).expect("crawler");
    crawler.run(&mut store).await.expect("crawl failed");

    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_detail_error_is_recorded_not_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(html(r#"<a href="/cat?M=hd&P=100">武俠小說</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cat"))
        .respond_with(html(
            r#"<a href="/book?M=book&P=1">金庸《笑傲江湖》</a>
               <a href="/book?M=book&P=2">古龍《絕代雙驕》</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/book"))
        .and(query_param("P", "1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/book"))
        .and(query_param("P", "2"))
        .respond_with(html(r#"<a href="/files/p2.epub">epub</a>"#))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("books.csv");
    let settings = test_settings(&server.uri(), &output);

    let mut store = CatalogStore::new();
    let crawler = Crawler::new(settings).expect("crawler");
    let summary = crawler.run(&mut store).await.expect("crawl failed");

    assert_eq!(summary.page_errors, 1);

    let failed = store
        .get(&format!("{}/book?M=book&P=1", server.uri()))
        .expect("book 1");
    assert_eq!(failed.status, BookStatus::Error);
    assert!(failed.error.contains("500"), "error was: {}", failed.error);

    // The other record was still enriched.
    let ok = store
        .get(&format!("{}/book?M=book&P=2", server.uri()))
        .expect("book 2");
    assert_eq!(ok.status, BookStatus::Pending);
    assert!(!ok.download_url.is_empty());
}

#[tokio::test]
async fn test_crawl_halts_on_block() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(html(r#"<a href="/cat?M=hd&P=100">武俠小說</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cat"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("books.csv");
    let settings = test_settings(&server.uri(), &output);

    let mut store = CatalogStore::new();
    let crawler = Crawler::new(settings).expect("crawler");
    let err = crawler.run(&mut store).await.expect_err("must halt");
    assert!(matches!(err, ShelfError::Blocked { .. }));

    // The table was persisted before halting.
    assert!(output.exists());
}
