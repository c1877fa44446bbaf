use std::borrow::Cow;
use std::collections::BTreeMap;

/// Index of a node in the trie arena. The root is always id 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// One node of the prefix tree.
///
/// The path from the root to a node, excluding the root, spells the node's
/// accumulated string. The end flag marks that the string is a complete
/// word; once set it is never cleared. The payload slot is usable on any
/// node but in practice only end-of-word nodes carry one.
#[derive(Debug)]
pub struct TrieNode<P> {
    key: Option<char>,
    parent: Option<NodeId>,
    end: bool,
    payload: Option<P>,
    children: BTreeMap<char, NodeId>,
}

impl<P> TrieNode<P> {
    /// The node's character, `None` for the root sentinel.
    pub fn key(&self) -> Option<char> {
        self.key
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_end(&self) -> bool {
        self.end
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut P> {
        self.payload.as_mut()
    }

    pub fn set_payload(&mut self, payload: P) {
        self.payload = Some(payload);
    }

    pub fn payload_or_default(&mut self) -> &mut P
    where
        P: Default,
    {
        self.payload.get_or_insert_with(P::default)
    }

    pub fn has_child(&self, key: char) -> bool {
        self.children.contains_key(&key)
    }

    pub fn child(&self, key: char) -> Option<NodeId> {
        self.children.get(&key).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = (char, NodeId)> + '_ {
        self.children.iter().map(|(&key, &id)| (key, id))
    }
}

/// Prefix tree over the characters of the inserted words.
///
/// Nodes live in an arena and reference each other through [`NodeId`]s, so
/// parent links come for free and nodes stay addressable for the lifetime
/// of the trie. Nothing is ever removed.
#[derive(Debug)]
pub struct Trie<P> {
    nodes: Vec<TrieNode<P>>,
}

impl<P> Trie<P> {
    pub fn new() -> Trie<P> {
        let root =
            TrieNode { key: None, parent: None, end: false, payload: None, children: BTreeMap::new() };
        Trie { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &TrieNode<P> {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TrieNode<P> {
        &mut self.nodes[id.0 as usize]
    }

    /// Inserts a word, creating the missing nodes along its characters, and
    /// marks the terminal node as end-of-word. Re-adding a word changes
    /// nothing. Returns the terminal node.
    pub fn add_word(&mut self, word: &str, ignore_case: bool) -> NodeId {
        let word = fold(word, ignore_case);
        let mut current = self.root();
        for key in word.chars() {
            current = match self.node(current).child(key) {
                Some(child) => child,
                None => self.insert_child(current, key),
            };
        }
        self.node_mut(current).end = true;
        current
    }

    /// True when every character resolves and the terminal node ends a word.
    pub fn has_word(&self, word: &str, ignore_case: bool) -> bool {
        self.get_node(word, ignore_case).is_some_and(|id| self.node(id).is_end())
    }

    /// The node at the last character, end-of-word or not, which makes
    /// interior prefix nodes reachable. `None` when a character is missing.
    pub fn get_node(&self, word: &str, ignore_case: bool) -> Option<NodeId> {
        let word = fold(word, ignore_case);
        let mut current = self.root();
        for key in word.chars() {
            current = self.node(current).child(key)?;
        }
        Some(current)
    }

    fn insert_child(&mut self, parent: NodeId, key: char) -> NodeId {
        // an existing child for the same key always wins
        if let Some(existing) = self.node(parent).child(key) {
            return existing;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TrieNode {
            key: Some(key),
            parent: Some(parent),
            end: false,
            payload: None,
            children: BTreeMap::new(),
        });
        self.node_mut(parent).children.insert(key, id);
        id
    }
}

impl<P> Default for Trie<P> {
    fn default() -> Trie<P> {
        Trie::new()
    }
}

fn fold(word: &str, ignore_case: bool) -> Cow<'_, str> {
    if ignore_case {
        Cow::Owned(word.to_lowercase())
    } else {
        Cow::Borrowed(word)
    }
}
