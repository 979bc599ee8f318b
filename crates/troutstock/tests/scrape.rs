use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::RawQuery;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Html;
use axum::routing::get;
use chrono::NaiveDate;
use troutstock::table::TableBackend;
use troutstock::{Cache, DateRange, ScraperConfig, ScraperError, StockingEvent, WebScraper};

const SCHEDULE: &str = r#"
<html>
  <body>
    <table class="nav"><tr><td>Home</td><td>Fishing</td></tr></table>
    <table class="schedule">
      <thead>
        <tr><th>Date</th><th>County</th><th>Waterbody</th><th>Category</th><th>Species</th></tr>
      </thead>
      <tbody>
        <tr><td>June 3, 2024</td><td>Bath</td><td>Smith Creek</td><td>A</td><td>Rainbow TroutBrown Trout</td></tr>
        <tr><td>June 4, 2024</td><td>Alleghany</td><td></td><td>B</td><td>Brook</td></tr>
        <tr><td>Postponed</td><td>Bath</td><td>Jackson River</td><td>A</td><td>Rainbow</td></tr>
        <tr><td>June 5, 2024</td><td>Rockbridge</td><td>Mill Creek</td><td>C</td><td>Tiger Trout</td></tr>
      </tbody>
    </table>
  </body>
</html>
"#;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{address}/schedule/")
}

fn scraper(url: String) -> WebScraper {
    WebScraper::with_config(ScraperConfig {
        url,
        ..Default::default()
    })
    .expect("client")
}

fn june_2024() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_scrape_sends_range_and_browser_agent() {
    let seen: Arc<Mutex<Vec<(Option<String>, String)>>> = Arc::default();
    let recorder = Arc::clone(&seen);
    let app = Router::new().route(
        "/schedule/",
        get(move |RawQuery(query): RawQuery, headers: HeaderMap| {
            let recorder = Arc::clone(&recorder);
            async move {
                let agent = headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                recorder.lock().unwrap().push((query, agent));
                Html(SCHEDULE)
            }
        }),
    );
    let url = serve(app).await;

    let events = scraper(url).scrape(Some(june_2024())).await.expect("scrape");

    let water_bodies: Vec<&str> = events.iter().map(|e| e.water_body.as_str()).collect();
    assert_eq!(water_bodies, vec!["Smith Creek", "Mill Creek"]);
    assert_eq!(events[0].species, "Rainbow Trout + Brown Trout");
    assert_eq!(events[0].category.as_deref(), Some("A"));
    assert_eq!(events[1].county, "Rockbridge");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].0.as_deref(),
        Some("start_date=June+1%2C+2024&end_date=June+30%2C+2024")
    );
    assert!(seen[0].1.starts_with("Mozilla/5.0"));
}

#[tokio::test]
async fn test_failed_ranged_request_falls_back_to_plain_page() {
    let hits: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
    let recorder = Arc::clone(&hits);
    let app = Router::new().route(
        "/schedule/",
        get(move |RawQuery(query): RawQuery| {
            let recorder = Arc::clone(&recorder);
            async move {
                let ranged = query.is_some();
                recorder.lock().unwrap().push(query);
                if ranged {
                    (StatusCode::INTERNAL_SERVER_ERROR, Html(""))
                } else {
                    (StatusCode::OK, Html(SCHEDULE))
                }
            }
        }),
    );
    let url = serve(app).await;

    let events = scraper(url).scrape(Some(june_2024())).await.expect("scrape");

    assert_eq!(events.len(), 2);
    let hits = hits.lock().unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].is_some());
    assert!(hits[1].is_none());
}

#[tokio::test]
async fn test_plain_request_failure_is_an_error() {
    let app = Router::new().route(
        "/schedule/",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
    );
    let url = serve(app).await;
    let scraper = scraper(url);

    let plain = scraper.scrape(None).await;
    assert!(matches!(plain, Err(ScraperError::HttpError(_))));

    let ranged = scraper.scrape(Some(june_2024())).await;
    assert!(matches!(ranged, Err(ScraperError::HttpError(_))));
}

#[tokio::test]
async fn test_unreachable_host_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let address = listener.local_addr().expect("local addr");
    drop(listener);

    let result = scraper(format!("http://{address}/schedule/")).scrape(None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_page_without_schedule_is_empty_not_error() {
    let app = Router::new().route(
        "/schedule/",
        get(|| async { Html("<html><body><p>No stockings scheduled.</p></body></html>") }),
    );
    let url = serve(app).await;

    let events = scraper(url).scrape(None).await.expect("scrape");
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_regex_backend_matches_dom_backend() {
    let app = Router::new().route("/schedule/", get(|| async { Html(SCHEDULE) }));
    let url = serve(app).await;

    let dom = scraper(url.clone()).scrape(None).await.expect("dom scrape");
    let regex = WebScraper::with_config(ScraperConfig {
        url,
        backend: TableBackend::Regex,
        ..Default::default()
    })
    .expect("client")
    .scrape(None)
    .await
    .expect("regex scrape");

    assert_eq!(dom, regex);
}

#[tokio::test]
async fn test_results_cached_by_caller_key() {
    let app = Router::new().route("/schedule/", get(|| async { Html(SCHEDULE) }));
    let url = serve(app).await;
    let cache: Arc<Cache<Arc<Vec<StockingEvent>>>> = Arc::new(Cache::default());

    let events = Arc::new(scraper(url).scrape(None).await.expect("scrape"));
    cache.set("stocking:recent", Arc::clone(&events));

    let cached = cache.get("stocking:recent").expect("cached");
    assert!(Arc::ptr_eq(&cached, &events));
    assert!(cache.status("stocking:recent").is_cached);
}
