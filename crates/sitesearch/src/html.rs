use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use scraper::{Html, Node};
use sitesearch_core::{DocumentParser, ParsedDocument};

/// Extracts outbound links and word tokens from HTML files.
///
/// A single traversal in document order collects both: `href` values of
/// anchor elements that point at local files, and the maximal alphanumeric
/// runs of every text node outside `<script>`/`<style>`. Links are
/// deduplicated keeping the first occurrence, as the indexer requires.
#[derive(Debug, Default)]
pub struct HtmlParser;

impl DocumentParser for HtmlParser {
    fn parse(&mut self, path: &Path) -> io::Result<ParsedDocument> {
        let contents = fs::read_to_string(path)?;
        Ok(extract(&contents))
    }
}

fn extract(contents: &str) -> ParsedDocument {
    let html = Html::parse_document(contents);
    let mut document = ParsedDocument::default();

    for node in html.tree.root().descendants() {
        match node.value() {
            Node::Element(element) if element.name() == "a" => {
                if let Some(link) = element.attr("href").and_then(local_target) {
                    if !document.links.contains(&link) {
                        document.links.push(link);
                    }
                }
            }
            Node::Text(text) => {
                let raw_text = node.ancestors().any(|ancestor| {
                    matches!(
                        ancestor.value(),
                        Node::Element(element) if matches!(element.name(), "script" | "style")
                    )
                });
                if raw_text {
                    continue;
                }
                let words = text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|word| !word.is_empty())
                    .map(str::to_owned);
                document.words.extend(words);
            }
            _ => (),
        }
    }

    document
}

/// Keeps only hrefs that can name a file on disk: scheme-qualified URLs and
/// pure fragments are dropped, a fragment or query suffix is cut off.
fn local_target(href: &str) -> Option<PathBuf> {
    let target = href.split(['#', '?']).next().unwrap_or_default();
    if target.is_empty()
        || target.contains("://")
        || target.starts_with("mailto:")
        || target.starts_with("javascript:")
    {
        return None;
    }
    Some(PathBuf::from(target))
}
