//! Directory and association crawls against mock sites

use crate::common::{fetcher, temp_storage, test_config};
use cattle_harvest::config::DirectorySite;
use cattle_harvest::discovery::{AssociationCrawler, DirectoryCrawler};
use cattle_harvest::extract::PageExtractor;
use cattle_harvest::state::UrlStatus;
use cattle_harvest::storage::{lock, UrlOrigin};
use cattle_harvest::worker::{ContactBook, Frontier, Shutdown, UrlProcessor};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn listing_page(mock: &str) -> String {
    format!(
        r#"<html><body><div class="search-results">
            <div class="result">
                <a class="business-name" href="/mip/lazy-k">Lazy K Ranch</a>
                <div class="phones">512.555.0142</div>
                <div class="locality">Lampasas, TX 76550</div>
                <a class="track-visit-website" href="{mock}/lazy-k">Website</a>
                <p>Email: info@lazykranch-test.com</p>
            </div>
            <div class="result">
                <a class="business-name" href="/mip/bar-s">Bar S Cattle</a>
            </div>
        </div></body></html>"#
    )
}

#[tokio::test]
async fn test_directory_contact_short_circuits_later_fetch() {
    let server = MockServer::start().await;
    let mock = server.uri();
    Mock::given(method("GET"))
        .and(path("/yp"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&mock)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/yp"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>No results</body></html>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/yp"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lazy-k"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(&mock);
    let (_dir, storage) = temp_storage();
    let fetcher = fetcher(&config);
    let contacts = ContactBook::new(storage.clone(), Arc::new(config.countries.clone()));
    let profile = config.country("US").unwrap();

    let crawler = DirectoryCrawler::new(fetcher.clone(), contacts.clone(), Shutdown::new());
    let report = crawler
        .crawl(DirectorySite::YellowPages, "US", profile, &["Texas".to_string()])
        .await
        .unwrap();
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.listings, 2);
    assert_eq!(report.contacts_saved, 1);

    let saved = lock(&storage)
        .unwrap()
        .get_contact("info@lazykranch-test.com")
        .unwrap()
        .unwrap();
    assert_eq!(saved.contact.farm_name.as_deref(), Some("Lazy K Ranch"));
    assert_eq!(saved.contact.region.as_deref(), Some("Texas"));
    assert_eq!(saved.contact.phone.as_deref(), Some("(512) 555-0142"));

    // The listing's website is later discovered by search
    let frontier = Frontier::new(storage.clone(), vec![], 100);
    let website = format!("{}/lazy-k", mock);
    let origin = UrlOrigin {
        source: "search".to_string(),
        discovered_by: Some("cattle ranch Texas".to_string()),
        country: "US".to_string(),
        region_hint: Some("Texas".to_string()),
    };
    frontier.enqueue(&[website.clone()], &origin).unwrap();
    let claimed = frontier.claim(1, None).unwrap();

    let processor = UrlProcessor::new(fetcher, Arc::new(PageExtractor::new()), frontier.clone(), contacts);
    assert_eq!(processor.process(&claimed[0]).await.unwrap(), 0);

    let record = lock(&storage).unwrap().get_url(&website).unwrap().unwrap();
    assert_eq!(record.status, UrlStatus::Completed);
    assert_eq!(record.emails_found, 1);
}

#[tokio::test]
async fn test_bare_origin_website_short_circuits_fetch() {
    let directory = MockServer::start().await;
    let farm = MockServer::start().await;
    let listing = format!(
        r#"<html><body><div class="search-results"><div class="result">
            <a class="business-name" href="/mip/circle-t">Circle T Cattle</a>
            <a class="track-visit-website" href="{}">Website</a>
            <p>Email: office@circlet-test.com</p>
        </div></div></body></html>"#,
        farm.uri()
    );
    Mock::given(method("GET"))
        .and(path("/yp"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .mount(&directory)
        .await;
    Mock::given(method("GET"))
        .and(path("/yp"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&directory)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&farm)
        .await;

    let config = test_config(&directory.uri());
    let (_dir, storage) = temp_storage();
    let fetcher = fetcher(&config);
    let contacts = ContactBook::new(storage.clone(), Arc::new(config.countries.clone()));
    let report = DirectoryCrawler::new(fetcher.clone(), contacts.clone(), Shutdown::new())
        .crawl(
            DirectorySite::YellowPages,
            "US",
            config.country("US").unwrap(),
            &["Texas".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(report.contacts_saved, 1);

    // The card links the bare origin, the frontier stores it with a slash
    let frontier = Frontier::new(storage.clone(), vec![], 100);
    let origin = UrlOrigin {
        source: "search".to_string(),
        discovered_by: None,
        country: "US".to_string(),
        region_hint: None,
    };
    frontier.enqueue(&[farm.uri()], &origin).unwrap();
    let claimed = frontier.claim(1, None).unwrap();
    assert_eq!(claimed[0].url, format!("{}/", farm.uri()));

    let processor = UrlProcessor::new(fetcher, Arc::new(PageExtractor::new()), frontier, contacts);
    assert_eq!(processor.process(&claimed[0]).await.unwrap(), 0);

    let record = lock(&storage).unwrap().get_url(&claimed[0].url).unwrap().unwrap();
    assert_eq!(record.status, UrlStatus::Completed);
    assert_eq!(record.emails_found, 1);
}

#[tokio::test]
async fn test_breed_directory_saves_inline_and_returns_links() {
    let server = MockServer::start().await;
    let mock = server.uri();
    let page = format!(
        r#"<html><head><title>Find a Breeder - Test Angus Association</title></head><body>
            <p>Questions? Write to <a href="mailto:breeders@angus-assoc-test.org">our office</a>.</p>
            <a href="/breeders/12">Profile</a>
            <a href="{mock}/breeders/40">Details</a>
            <a href="https://circlet-test.com/">Circle T Ranch</a>
            <a href="/news/spring-sale">Spring sale news</a>
        </body></html>"#
    );
    Mock::given(method("GET"))
        .and(path("/find-a-breeder"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&mock);
    let (_dir, storage) = temp_storage();
    let contacts = ContactBook::new(storage.clone(), Arc::new(config.countries.clone()));
    let crawler = AssociationCrawler::new(
        fetcher(&config),
        Arc::new(PageExtractor::new()),
        contacts.clone(),
        Shutdown::new(),
    );

    let report = crawler
        .crawl("US", config.country("US").unwrap(), &["Texas".to_string()])
        .await
        .unwrap();

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.contacts_saved, 1);
    assert_eq!(
        report.urls,
        vec![
            format!("{}/breeders/12", mock),
            format!("{}/breeders/40", mock),
            "https://circlet-test.com/".to_string(),
        ]
    );
    assert_eq!(contacts.count().unwrap(), 1);
}

#[tokio::test]
async fn test_requested_shutdown_stops_directory_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let (_dir, storage) = temp_storage();
    let contacts = ContactBook::new(storage, Arc::new(config.countries.clone()));
    let shutdown = Shutdown::new();
    shutdown.request();

    let crawler = DirectoryCrawler::new(fetcher(&config), contacts, shutdown);
    let report = crawler
        .crawl(
            DirectorySite::YellowPages,
            "US",
            config.country("US").unwrap(),
            &["Texas".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(report.pages_fetched, 0);
}
