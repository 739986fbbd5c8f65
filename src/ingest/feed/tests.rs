use super::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Tech News</title>
    <link>https://news.example.com</link>
    <item>
      <title>Chipmaker posts record quarter</title>
      <link>https://news.example.com/chips</link>
      <description><![CDATA[<p>Revenue rose <b>40%</b> on AI demand.</p>]]></description>
    </item>
    <item>
      <title>Startup &amp; rival merge</title>
      <link>https://news.example.com/merge</link>
      <description>Two companies join forces.</description>
    </item>
    <item>
      <title>Third story</title>
      <link>https://news.example.com/third</link>
      <description>Another one.</description>
    </item>
  </channel>
</rss>"#;

const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Markets</title>
  <link href="https://markets.example.com/"/>
  <entry>
    <title>Rates hold steady</title>
    <link rel="alternate" href="https://markets.example.com/rates"/>
    <summary>The central bank left rates unchanged.</summary>
    <content type="html">Longer body that should not replace the summary.</content>
  </entry>
</feed>"#;

#[test]
fn parses_rss_items() {
    let items = parse_feed(RSS, 5).expect("should parse rss");

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].title, "Chipmaker posts record quarter");
    assert_eq!(items[0].link, "https://news.example.com/chips");
    assert_eq!(items[0].summary, "Revenue rose 40% on AI demand.");
    assert_eq!(items[1].title, "Startup & rival merge");
}

#[test]
fn respects_limit() {
    let items = parse_feed(RSS, 2).expect("should parse rss");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].link, "https://news.example.com/merge");
}

#[test]
fn parses_atom_entries() {
    let items = parse_feed(ATOM, 5).expect("should parse atom");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Rates hold steady");
    assert_eq!(items[0].link, "https://markets.example.com/rates");
    assert_eq!(items[0].summary, "The central bank left rates unchanged.");
}

#[test]
fn rejects_non_feed_documents() {
    let err = parse_feed("<html><body>nope</body></html>", 5).expect_err("should reject html");
    assert!(matches!(err, RagError::Load(_)));

    let err = parse_feed("<rss><channel><item></channel></rss>", 5).expect_err("should reject");
    assert!(matches!(err, RagError::Load(_)));
}

#[test]
fn items_render_one_block_each() {
    let url = Url::parse("https://news.example.com/rss").expect("should parse url");
    let items = parse_feed(RSS, 2).expect("should parse rss");
    let doc = items_to_document(&url, &items);

    assert_eq!(doc.metadata.source, "https://news.example.com/rss");
    assert_eq!(doc.metadata.page, None);
    assert_eq!(doc.text.split("\n\n").count(), 2);
    assert!(doc.text.starts_with("Title: Chipmaker posts record quarter\nLink: "));
}

#[test]
fn strips_markup_from_summaries() {
    assert_eq!(
        html_to_text("<p>Hello <a href=\"x\">world</a></p>\n\n  again"),
        "Hello world again"
    );
    assert_eq!(html_to_text("5 < 6 and 7 > 2"), "5 < 6 and 7 > 2");
}

#[test]
fn decodes_entities_in_escaped_descriptions() {
    let xml = r#"<rss><channel><item>
      <title>Cartoon</title>
      <link>https://news.example.com/cartoon</link>
      <description>&lt;p&gt;Tom&amp;#39;s &amp;amp; Jerry&amp;nbsp;win&lt;/p&gt;</description>
    </item></channel></rss>"#;

    let items = parse_feed(xml, 5).expect("should parse rss");

    assert_eq!(items[0].summary, "Tom's & Jerry\u{a0}win");
}

#[tokio::test]
async fn fetches_feed_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/rss", server.uri())).expect("should parse url");
    let items = fetch_feed(&HttpClient::default(), &url, 1).expect("should fetch feed");

    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn unreachable_feed_is_a_load_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/rss", server.uri())).expect("should parse url");
    let err = fetch_feed(&HttpClient::default(), &url, 5).expect_err("should fail");

    assert!(matches!(err, RagError::Load(_)));
}
