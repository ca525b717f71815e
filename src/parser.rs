use scraper::{Html, Selector};

#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub headers: Vec<String>,
    pub prettified: String,
    pub links: Vec<String>,
}

// Hrefs are returned exactly as written in the document; resolution against
// the page origin happens in the task that discovered them.
pub fn parse_page(document: &str) -> ParsedPage {
    let html = Html::parse_document(document);
    let header_sel = Selector::parse("h1").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();

    let mut headers = Vec::new();
    for el in html.select(&header_sel) {
        let text = el.text().collect::<Vec<_>>().join(" ");
        let cleaned = text.trim();
        if !cleaned.is_empty() {
            headers.push(cleaned.to_string());
        }
    }

    let mut links = Vec::new();
    for el in html.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            if !href.is_empty() {
                links.push(href.to_string());
            }
        }
    }

    ParsedPage {
        headers,
        prettified: html.root_element().html(),
        links,
    }
}
