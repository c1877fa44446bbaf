use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use query_parser::{evaluate, BooleanQuery, CountSemantics, Item, SetSemantics, Token};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::graph::{Direction, Graph, VertexId};
use crate::trie::Trie;
use crate::{DocumentId, Position, Postings, Result};

/// What the parser collaborator extracts from one document: outbound links
/// and word tokens, both in document order. Links must not repeat.
#[derive(Debug, Default, Clone)]
pub struct ParsedDocument {
    pub links: Vec<PathBuf>,
    pub words: Vec<String>,
}

/// The collaborator that turns a file on disk into links and words.
pub trait DocumentParser {
    fn parse(&mut self, path: &Path) -> io::Result<ParsedDocument>;
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document: DocumentId,
    pub score: f64,
}

/// Per-query cache: postings per queried word and hit counts per phrase key,
/// filled while computing the result set and reused by the scoring pass.
#[derive(Default)]
struct QueryCache<'a> {
    words: HashMap<String, Option<&'a Postings>>,
    phrases: HashMap<String, BTreeMap<DocumentId, i64>>,
}

/// The in-memory indexes over one directory tree of documents.
///
/// Built once at startup and read-only afterwards: the trie maps every word
/// to its postings, the graph records which document links to which, and the
/// document table assigns ids in insertion order.
pub struct Index {
    trie: Trie<Postings>,
    graph: Graph<PathBuf, DocumentId>,
    /// Append-only document table; a `DocumentId` is an index into it.
    documents: Vec<VertexId>,
    /// Token count per document, the scoring universe for `NOT`.
    word_counts: Vec<u32>,
}

impl Index {
    pub fn new() -> Index {
        Index {
            trie: Trie::new(),
            graph: Graph::new(true),
            documents: Vec::new(),
            word_counts: Vec::new(),
        }
    }

    /// Walks the tree depth-first and indexes every `.html`/`.htm` file in
    /// the order the filesystem returns them. Returns the document count.
    pub fn index_directory(
        &mut self,
        root: &Path,
        parser: &mut dyn DocumentParser,
    ) -> Result<usize> {
        let started_at = Instant::now();
        let cwd = std::env::current_dir()?;
        let root = absolutize(&cwd, root);

        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let extension = entry
                .file_name()
                .to_str()
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, extension)| extension);
            if !matches!(extension, Some("html" | "htm")) {
                continue;
            }
            debug!("indexing {}", path.display());
            let parsed = parser.parse(path)?;
            self.index_document(path, parsed)?;
        }

        info!(
            "indexed {} documents under {} in {:.2?}",
            self.documents.len(),
            root.display(),
            started_at.elapsed()
        );
        Ok(self.documents.len())
    }

    /// Feeds one parsed document into the indexes: its links first, then its
    /// words. Returns the id assigned to the document.
    pub fn index_document(&mut self, path: &Path, document: ParsedDocument) -> Result<DocumentId> {
        let cwd = std::env::current_dir()?;
        let path = absolutize(&cwd, path);
        self.handle_links(&path, &document.links)?;
        self.handle_words(&path, document.words)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// The absolute path a document was indexed under.
    pub fn document_path(&self, document: DocumentId) -> Option<&Path> {
        let vertex = *self.documents.get(document as usize)?;
        Some(self.graph.vertex(vertex).ok()?.key().as_path())
    }

    /// The documents matching the expression, unranked.
    pub fn matching_documents(&self, expression: &str) -> Result<Vec<DocumentId>> {
        let query = BooleanQuery::parse(expression)?;
        let mut cache = QueryCache::default();
        self.evaluate_set(&query, &mut cache)
    }

    /// The documents matching the expression, ranked by composite score:
    /// the count-evaluation of the query for the document itself, plus 0.7
    /// per inbound link, plus 0.4 times the count-evaluation for every
    /// linking document. Ties keep the result-set order.
    pub fn search(&self, expression: &str) -> Result<Vec<SearchResult>> {
        let started_at = Instant::now();
        let query = BooleanQuery::parse(expression)?;
        let mut cache = QueryCache::default();
        let matching = self.evaluate_set(&query, &mut cache)?;
        let results = self.rank(matching, &query, &cache)?;
        debug!("query answered in {:.2?}", started_at.elapsed());
        Ok(results)
    }

    fn handle_links(&mut self, path: &PathBuf, links: &[PathBuf]) -> Result<()> {
        if self.graph.get_node(path).is_none() {
            self.graph.create_node(path.clone())?;
        }
        // links are relative to the document that contains them
        let base = path.parent().unwrap_or(Path::new("/")).to_path_buf();
        for link in links {
            let link = absolutize(&base, link);
            if self.graph.get_node(&link).is_none() {
                self.graph.create_node(link.clone())?;
            }
            let start = self.graph.node(path)?;
            let end = self.graph.node(&link)?;
            self.graph.connect_nodes(start, end)?;
        }
        Ok(())
    }

    fn handle_words(&mut self, path: &PathBuf, words: Vec<String>) -> Result<DocumentId> {
        let document = self.documents.len() as DocumentId;
        let vertex = self.graph.node(path)?;
        self.graph.vertex_mut(vertex)?.set_data(document);
        self.documents.push(vertex);
        self.word_counts.push(words.len() as u32);

        for (position, word) in words.iter().enumerate() {
            let node = self.trie.add_word(word, true);
            let postings = self.trie.node_mut(node).payload_or_default();
            postings.entry(document).or_default().push(position as Position);
        }
        Ok(document)
    }

    /// Substitutes every word token with its posting document list and every
    /// phrase key with its phrase matches, then evaluates over sets.
    fn evaluate_set<'a>(
        &'a self,
        query: &BooleanQuery,
        cache: &mut QueryCache<'a>,
    ) -> Result<Vec<DocumentId>> {
        let mut items = Vec::with_capacity(query.postfix.len());
        for token in &query.postfix {
            match token {
                Token::Operator(operator) => items.push(Item::Operator(*operator)),
                Token::Word(word) if token.is_phrase_key() => {
                    let matches = self.evaluate_phrase(word, query, cache)?;
                    items.push(Item::Operand(matches));
                }
                Token::Word(word) => {
                    let documents = self
                        .word_postings(word, cache)
                        .map(|postings| postings.keys().copied().collect())
                        .unwrap_or_default();
                    items.push(Item::Operand(documents));
                }
            }
        }

        let universe: Vec<DocumentId> = (0..self.documents.len() as DocumentId).collect();
        Ok(evaluate(&mut items, &SetSemantics { universe: &universe })?)
    }

    fn word_postings<'a>(&'a self, word: &str, cache: &mut QueryCache<'a>) -> Option<&'a Postings> {
        *cache.words.entry(word.to_owned()).or_insert_with(|| {
            self.trie.get_node(word, true).and_then(|node| self.trie.node(node).payload())
        })
    }

    /// Runs the adjacency check for one quoted phrase: a candidate document
    /// matches when the phrase words occur at consecutive positions, once
    /// per occurrence of the first word. The hit counts are cached under the
    /// phrase key for the scoring pass.
    fn evaluate_phrase<'a>(
        &'a self,
        key: &str,
        query: &BooleanQuery,
        cache: &mut QueryCache<'a>,
    ) -> Result<Vec<DocumentId>> {
        let text = query.phrase(key).unwrap_or_default();
        let candidates = {
            let phrase_query = BooleanQuery::parse(text)?;
            self.evaluate_set(&phrase_query, cache)?
        };
        let words: Vec<&str> = text.split_whitespace().collect();

        let mut matched = Vec::new();
        let mut hits = BTreeMap::new();
        for document in candidates {
            // a word missing from this document is an empty position list
            let positions: Vec<&[Position]> = words
                .iter()
                .map(|word| {
                    self.word_postings(word, cache)
                        .and_then(|postings| postings.get(&document))
                        .map(|positions| positions.as_slice())
                        .unwrap_or(&[])
                })
                .collect();
            let Some((first, rest)) = positions.split_first() else { continue };

            let count = first
                .iter()
                .filter(|&&start| {
                    rest.iter().enumerate().all(|(offset, positions)| {
                        positions.binary_search(&(start + 1 + offset as Position)).is_ok()
                    })
                })
                .count() as i64;
            if count > 0 {
                matched.push(document);
                hits.insert(document, count);
            }
        }

        cache.phrases.insert(key.to_owned(), hits);
        Ok(matched)
    }

    fn rank(
        &self,
        matching: Vec<DocumentId>,
        query: &BooleanQuery,
        cache: &QueryCache<'_>,
    ) -> Result<Vec<SearchResult>> {
        let mut results = Vec::with_capacity(matching.len());
        for document in matching {
            let own = self.count_score(document, query, cache)?;
            let vertex = self.documents[document as usize];
            let inbound = self.graph.edge_count(vertex, Direction::Incoming)?;

            let mut linked = 0;
            let linkers: Vec<VertexId> =
                self.graph.neighbors(vertex, Direction::Incoming)?.collect();
            for linker in linkers {
                if let Some(&linker_document) = self.graph.vertex(linker)?.data() {
                    linked += self.count_score(linker_document, query, cache)?;
                }
            }

            let score = own as f64 + 0.7 * inbound as f64 + 0.4 * linked as f64;
            results.push(SearchResult { document, score });
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }

    /// Re-evaluates the postfix for one document, every word replaced by its
    /// occurrence count in that document.
    fn count_score(
        &self,
        document: DocumentId,
        query: &BooleanQuery,
        cache: &QueryCache<'_>,
    ) -> Result<i64> {
        let mut items: Vec<Item<i64>> = query
            .postfix
            .iter()
            .map(|token| match token {
                Token::Operator(operator) => Item::Operator(*operator),
                Token::Word(word) if token.is_phrase_key() => Item::Operand(
                    cache
                        .phrases
                        .get(word)
                        .and_then(|hits| hits.get(&document))
                        .copied()
                        .unwrap_or(0),
                ),
                Token::Word(word) => Item::Operand(
                    cache
                        .words
                        .get(word)
                        .copied()
                        .flatten()
                        .and_then(|postings| postings.get(&document))
                        .map(|positions| positions.len() as i64)
                        .unwrap_or(0),
                ),
            })
            .collect();

        let total = self.word_counts[document as usize] as i64;
        Ok(evaluate(&mut items, &CountSemantics { total })?)
    }
}

impl Default for Index {
    fn default() -> Index {
        Index::new()
    }
}

/// Lexical absolutization: joins a relative path onto `base` and folds `.`
/// and `..` away without touching the filesystem, so links to files that do
/// not exist still get a canonical key.
fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() { path.to_path_buf() } else { base.join(path) };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            component => normalized.push(component),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use std::fs;

    use big_s::S;

    use super::*;
    use crate::Error;

    /// Hands out canned documents, splitting plain text on whitespace.
    struct StubParser;

    impl DocumentParser for StubParser {
        fn parse(&mut self, path: &Path) -> io::Result<ParsedDocument> {
            let contents = fs::read_to_string(path)?;
            Ok(ParsedDocument {
                links: Vec::new(),
                words: contents.split_whitespace().map(str::to_owned).collect(),
            })
        }
    }

    fn parsed(words: &str, links: &[&Path]) -> ParsedDocument {
        ParsedDocument {
            links: links.iter().map(|link| link.to_path_buf()).collect(),
            words: words.split_whitespace().map(str::to_owned).collect(),
        }
    }

    /// doc0 `python class python`, doc1 `class java`, doc2 `python`;
    /// doc2 links to doc0.
    fn corpus() -> Index {
        let mut index = Index::new();
        let doc0 = Path::new("/db/doc0.html");
        index.index_document(doc0, parsed("python class python", &[])).unwrap();
        index.index_document(Path::new("/db/doc1.html"), parsed("class java", &[])).unwrap();
        index.index_document(Path::new("/db/doc2.html"), parsed("python", &[doc0])).unwrap();
        index
    }

    #[track_caller]
    fn assert_scores(results: &[SearchResult], expected: &[(DocumentId, f64)]) {
        let flat: Vec<(DocumentId, f64)> =
            results.iter().map(|result| (result.document, result.score)).collect();
        assert_eq!(flat.len(), expected.len(), "{flat:?} vs {expected:?}");
        for ((document, score), (expected_document, expected_score)) in
            flat.iter().zip(expected.iter())
        {
            assert_eq!(document, expected_document);
            assert!((score - expected_score).abs() < 1e-9, "{flat:?} vs {expected:?}");
        }
    }

    #[test]
    fn single_word() {
        let index = corpus();
        assert_eq!(index.matching_documents("python").unwrap(), vec![0, 2]);
        // doc0: two occurrences, one inbound link whose owner has one match
        let results = index.search("python").unwrap();
        assert_scores(&results, &[(0, 2.0 + 0.7 + 0.4), (2, 1.0)]);
    }

    #[test]
    fn conjunction() {
        let index = corpus();
        assert_eq!(index.matching_documents("python AND class").unwrap(), vec![0]);
        let results = index.search("python AND class").unwrap();
        // |2 - 1| for doc0 itself, |1 - 0| for the linking doc2
        assert_scores(&results, &[(0, 1.0 + 0.7 + 0.4)]);

        assert_eq!(index.matching_documents("python class").unwrap(), vec![0]);
    }

    #[test]
    fn disjunction() {
        let index = corpus();
        assert_eq!(index.matching_documents("python OR java").unwrap(), vec![0, 1, 2]);
        let results = index.search("python OR java").unwrap();
        assert_scores(&results, &[(0, 2.0 + 0.7 + 0.4), (1, 1.0), (2, 1.0)]);
    }

    #[test]
    fn negation() {
        let index = corpus();
        assert_eq!(index.matching_documents("python NOT class").unwrap(), vec![2]);
        // doc2: python count 1, NOT class = 1 - 0, |1 - 1| = 0
        let results = index.search("python NOT class").unwrap();
        assert_scores(&results, &[(2, 0.0)]);
    }

    #[test]
    fn phrase() {
        let index = corpus();
        assert_eq!(index.matching_documents("\"python class\"").unwrap(), vec![0]);
        // one adjacency hit at positions 0 → 1; doc2 links in but has no hit
        let results = index.search("\"python class\"").unwrap();
        assert_scores(&results, &[(0, 1.0 + 0.7 + 0.0)]);

        assert!(index.matching_documents("\"class python\"").unwrap().is_empty());
    }

    #[test]
    fn repeated_phrase_counts_every_hit() {
        let mut index = Index::new();
        index
            .index_document(Path::new("/db/a.html"), parsed("big dog big dog big", &[]))
            .unwrap();
        index.index_document(Path::new("/db/b.html"), parsed("dog big dog", &[])).unwrap();

        // a: hits at 0→1 and 2→3, the trailing `big` has no follower;
        // b: one hit at 1→2
        assert_eq!(index.matching_documents("\"big dog\"").unwrap(), vec![0, 1]);
        let results = index.search("\"big dog\"").unwrap();
        assert_scores(&results, &[(0, 2.0), (1, 1.0)]);
    }

    #[test]
    fn quit_and_invalid_input() {
        let index = corpus();
        assert!(matches!(
            index.search("QUIT").unwrap_err(),
            Error::Query(query_parser::Error::QuitRequested)
        ));
        assert!(matches!(
            index.search("python AND").unwrap_err(),
            Error::Query(query_parser::Error::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_words_are_empty() {
        let index = corpus();
        assert!(index.matching_documents("rust").unwrap().is_empty());
        assert_eq!(index.matching_documents("NOT rust").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn queries_fold_case() {
        let index = corpus();
        assert_eq!(index.matching_documents("Python").unwrap(), vec![0, 2]);
        assert_eq!(index.matching_documents("JAVA OR PYTHON").unwrap(), vec![1, 0, 2]);
    }

    #[test]
    fn links_resolve_relative_to_their_document() {
        let mut index = Index::new();
        index
            .index_document(
                Path::new("/db/sub/page.html"),
                parsed("hello", &[Path::new("../other.html")]),
            )
            .unwrap();
        index.index_document(Path::new("/db/other.html"), parsed("hello world", &[])).unwrap();

        // the inbound edge lands on /db/other.html
        let results = index.search("hello").unwrap();
        assert_scores(&results, &[(1, 1.0 + 0.7 + 0.4), (0, 1.0)]);
    }

    #[test]
    fn duplicate_links_surface_already_connected() {
        let mut index = Index::new();
        let target = Path::new("/db/target.html");
        let error = index
            .index_document(Path::new("/db/source.html"), parsed("a", &[target, target]))
            .unwrap_err();
        assert!(matches!(error, Error::Graph(crate::GraphError::AlreadyConnected(..))));
    }

    #[test]
    fn ties_keep_result_order() {
        let mut index = Index::new();
        index.index_document(Path::new("/db/a.html"), parsed("same", &[])).unwrap();
        index.index_document(Path::new("/db/b.html"), parsed("same", &[])).unwrap();
        let results = index.search("same").unwrap();
        assert_scores(&results, &[(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn index_directory_walks_html_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.html"), "alpha beta").unwrap();
        fs::write(dir.path().join("sub/b.htm"), "beta gamma").unwrap();
        fs::write(dir.path().join("notes.txt"), "alpha").unwrap();
        fs::write(dir.path().join("upper.HTML"), "alpha").unwrap();

        let mut index = Index::new();
        let count = index.index_directory(dir.path(), &mut StubParser).unwrap();
        assert_eq!(count, 2);
        assert_eq!(index.document_count(), 2);
        assert_eq!(index.matching_documents("beta").unwrap().len(), 2);
        assert_eq!(index.matching_documents("alpha").unwrap().len(), 1);
    }

    #[test]
    fn document_paths_are_absolute() {
        let index = corpus();
        assert_eq!(index.document_path(0), Some(Path::new("/db/doc0.html")));
        assert_eq!(index.document_path(7), None);
    }

    #[test]
    fn absolutize_folds_dots() {
        let base = Path::new("/db/sub");
        assert_eq!(absolutize(base, Path::new("page.html")), PathBuf::from("/db/sub/page.html"));
        assert_eq!(absolutize(base, Path::new("../other.html")), PathBuf::from("/db/other.html"));
        assert_eq!(absolutize(base, Path::new("./x/../y.html")), PathBuf::from("/db/sub/y.html"));
        assert_eq!(absolutize(base, Path::new("/abs/z.html")), PathBuf::from("/abs/z.html"));
    }

    #[test]
    fn word_counts_feed_not_scoring() {
        let mut index = Index::new();
        index.index_document(Path::new("/db/a.html"), parsed("one two three four", &[])).unwrap();
        index.index_document(Path::new("/db/b.html"), parsed("two two five", &[])).unwrap();

        let results = index.search("two NOT one").unwrap();
        // b is the only match; NOT one = 3 - 0 against b's token count,
        // then |2 - 3|
        assert_scores(&results, &[(1, 1.0)]);
    }

    #[test]
    fn stub_parser_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.html");
        fs::write(&path, "hello hello world").unwrap();
        let parsed = StubParser.parse(&path).unwrap();
        assert_eq!(parsed.words, vec![S("hello"), S("hello"), S("world")]);
    }
}
