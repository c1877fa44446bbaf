use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

/// Index of a vertex in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexId(u32);

/// Index of an edge in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(u32);

/// Which of a vertex's two edge lists an operation targets. Undirected
/// graphs keep a single list for both roles and ignore the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("a vertex with the key `{0}` already exists in the graph")]
    DuplicateKey(String),
    #[error("no vertex with the key `{0}` in the graph")]
    MissingKey(String),
    #[error("the vertices `{0}` and `{1}` are already connected")]
    AlreadyConnected(String, String),
    #[error("the vertex is no longer part of the graph")]
    NotInGraph,
}

#[derive(Debug)]
pub struct Vertex<K, D> {
    key: K,
    data: Option<D>,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

impl<K, D> Vertex<K, D> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: D) {
        self.data = Some(data);
    }
}

#[derive(Debug)]
pub struct Edge<E> {
    start: VertexId,
    end: VertexId,
    data: Option<E>,
}

impl<E> Edge<E> {
    pub fn start(&self) -> VertexId {
        self.start
    }

    pub fn end(&self) -> VertexId {
        self.end
    }

    pub fn data(&self) -> Option<&E> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: E) {
        self.data = Some(data);
    }

    fn other_side(&self, vertex: VertexId) -> VertexId {
        if self.start == vertex {
            self.end
        } else {
            self.start
        }
    }
}

/// A directed or undirected graph over keyed vertices.
///
/// Vertices and edges live in arenas and refer to each other through ids;
/// removing a vertex frees its slot together with every incident edge slot,
/// so an id is only valid while its target lives. An edge is registered in
/// the outgoing list of its start and the incoming list of its end; multiple
/// edges between the same ordered pair are forbidden.
#[derive(Debug)]
pub struct Graph<K, D = (), E = ()> {
    directed: bool,
    vertices: Vec<Option<Vertex<K, D>>>,
    edges: Vec<Option<Edge<E>>>,
    keys: HashMap<K, VertexId>,
}

impl<K, D, E> Graph<K, D, E>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new(directed: bool) -> Graph<K, D, E> {
        Graph { directed, vertices: Vec::new(), edges: Vec::new(), keys: HashMap::new() }
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Adds a vertex under a key that must not be taken yet.
    pub fn create_node(&mut self, key: K) -> Result<VertexId, GraphError> {
        if self.keys.contains_key(&key) {
            return Err(GraphError::DuplicateKey(format!("{key:?}")));
        }
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(Some(Vertex {
            key: key.clone(),
            data: None,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }));
        self.keys.insert(key, id);
        Ok(id)
    }

    pub fn exists(&self, key: &K) -> bool {
        self.keys.contains_key(key)
    }

    pub fn get_node(&self, key: &K) -> Option<VertexId> {
        self.keys.get(key).copied()
    }

    /// The vertex under a key that must be present.
    pub fn node(&self, key: &K) -> Result<VertexId, GraphError> {
        self.get_node(key).ok_or_else(|| GraphError::MissingKey(format!("{key:?}")))
    }

    pub fn get_all_nodes(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.keys.values().copied()
    }

    pub fn vertex(&self, id: VertexId) -> Result<&Vertex<K, D>, GraphError> {
        self.vertices[id.0 as usize].as_ref().ok_or(GraphError::NotInGraph)
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Result<&mut Vertex<K, D>, GraphError> {
        self.vertices[id.0 as usize].as_mut().ok_or(GraphError::NotInGraph)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge<E>> {
        self.edges[id.0 as usize].as_ref()
    }

    /// Adds a single edge from `start` to `end`, registered on both sides.
    pub fn connect_nodes(&mut self, start: VertexId, end: VertexId) -> Result<EdgeId, GraphError> {
        let start_key = format!("{:?}", self.vertex(start)?.key());
        let end_key = format!("{:?}", self.vertex(end)?.key());
        if self.get_edge(start, end, Direction::Outgoing)?.is_some() {
            return Err(GraphError::AlreadyConnected(start_key, end_key));
        }

        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Some(Edge { start, end, data: None }));
        self.list_mut(start, Direction::Outgoing).push(id);
        self.list_mut(end, Direction::Incoming).push(id);
        Ok(id)
    }

    /// `connect_nodes` in both directions, atomic only in its checks.
    pub fn connect_both_ways(
        &mut self,
        first: VertexId,
        second: VertexId,
    ) -> Result<(EdgeId, EdgeId), GraphError> {
        let forward = self.connect_nodes(first, second)?;
        let backward = self.connect_nodes(second, first)?;
        Ok((forward, backward))
    }

    /// Removes every edge between the two vertices, from all endpoint lists.
    pub fn disconnect(&mut self, first: VertexId, second: VertexId) -> Result<(), GraphError> {
        let mut removed = false;
        if let Some(edge) = self.get_edge(first, second, Direction::Outgoing)? {
            self.remove_edge(edge);
            removed = true;
        }
        if self.directed {
            if let Some(edge) = self.get_edge(first, second, Direction::Incoming)? {
                self.remove_edge(edge);
                removed = true;
            }
        }
        if !removed {
            let key = format!("{:?}", self.vertex(second)?.key());
            return Err(GraphError::MissingKey(key));
        }
        Ok(())
    }

    /// Removes the vertex under the key after disconnecting every incident
    /// edge; nothing in the graph refers to the vertex afterwards.
    pub fn remove_node(&mut self, key: &K) -> Result<(), GraphError> {
        let id = self.node(key)?;
        let mut incident = self.list(id, Direction::Outgoing)?.to_vec();
        if self.directed {
            incident.extend(self.list(id, Direction::Incoming)?);
        }
        for edge in incident {
            self.remove_edge(edge);
        }
        self.keys.remove(key);
        self.vertices[id.0 as usize] = None;
        Ok(())
    }

    /// The edge in `direction` whose other end is `other`, if any.
    pub fn get_edge(
        &self,
        vertex: VertexId,
        other: VertexId,
        direction: Direction,
    ) -> Result<Option<EdgeId>, GraphError> {
        let list = self.list(vertex, direction)?;
        Ok(list
            .iter()
            .copied()
            .find(|&id| self.edge(id).is_some_and(|edge| edge.other_side(vertex) == other)))
    }

    pub fn edge_count(&self, vertex: VertexId, direction: Direction) -> Result<usize, GraphError> {
        Ok(self.list(vertex, direction)?.len())
    }

    pub fn edges_of(
        &self,
        vertex: VertexId,
        direction: Direction,
    ) -> Result<impl Iterator<Item = EdgeId> + '_, GraphError> {
        Ok(self.list(vertex, direction)?.iter().copied())
    }

    /// The vertices at the other end of every edge in `direction`.
    pub fn neighbors(
        &self,
        vertex: VertexId,
        direction: Direction,
    ) -> Result<impl Iterator<Item = VertexId> + '_, GraphError> {
        let list = self.list(vertex, direction)?;
        Ok(list.iter().filter_map(move |&id| Some(self.edge(id)?.other_side(vertex))))
    }

    fn list(&self, vertex: VertexId, direction: Direction) -> Result<&Vec<EdgeId>, GraphError> {
        let vertex = self.vertex(vertex)?;
        match direction {
            // undirected graphs carry both roles in the outgoing list
            Direction::Incoming if self.directed => Ok(&vertex.incoming),
            _ => Ok(&vertex.outgoing),
        }
    }

    fn list_mut(&mut self, vertex: VertexId, direction: Direction) -> &mut Vec<EdgeId> {
        let directed = self.directed;
        let vertex = self.vertices[vertex.0 as usize]
            .as_mut()
            .unwrap_or_else(|| unreachable!("endpoints are checked before insertion"));
        match direction {
            Direction::Incoming if directed => &mut vertex.incoming,
            _ => &mut vertex.outgoing,
        }
    }

    fn remove_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges[id.0 as usize].take() else { return };
        for endpoint in [edge.start, edge.end] {
            if let Some(vertex) = self.vertices[endpoint.0 as usize].as_mut() {
                vertex.outgoing.retain(|&e| e != id);
                vertex.incoming.retain(|&e| e != id);
            }
        }
    }
}
