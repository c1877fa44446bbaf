//! The in-memory indexes and the search orchestrator.
//!
//! [`Index`] owns everything built at startup: a [`Trie`] mapping every word
//! to its postings, a directed [`Graph`] of the links between documents, and
//! the append-only document table that assigns [`DocumentId`]s. Queries are
//! parsed by the `query-parser` crate, evaluated once over posting lists to
//! find the matching documents and once per match over occurrence counts to
//! rank them.

mod error;
mod graph;
mod index;
mod trie;

use std::collections::BTreeMap;

pub use error::Error;
pub use graph::{Direction, Edge, EdgeId, Graph, GraphError, Vertex, VertexId};
pub use index::{DocumentParser, Index, ParsedDocument, SearchResult};
pub use trie::{NodeId, Trie, TrieNode};

pub type Result<T> = std::result::Result<T, Error>;

/// Identifier of an indexed document: its insertion index in the table.
pub type DocumentId = u32;

/// Token position inside a document.
pub type Position = u32;

/// For one word: where it occurs, per document, in token order.
pub type Postings = BTreeMap<DocumentId, Vec<Position>>;
