use std::collections::{HashMap, HashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{Memo, SlotCache};
use crate::{GoError, Namespace, RelationKind, Result};

#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone)]
pub struct TermKey(pub(crate) usize);

impl TermKey {
    pub fn index(&self) -> usize {
        self.0
    }
}

pub type TermSet = HashSet<TermKey>;

/// A term as delivered by an ontology decoder, before it is linked into a graph.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    pub id: String,
    pub name: String,
    pub namespace: Namespace,
    pub relations: Vec<(RelationKind, String)>,
    #[serde(default)]
    pub alt_ids: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub obsolete: bool,
}

impl TermRecord {
    pub fn new(id: &str, name: &str, namespace: Namespace) -> TermRecord {
        TermRecord {
            id: id.to_string(),
            name: name.to_string(),
            namespace,
            relations: Vec::new(),
            alt_ids: Vec::new(),
            synonyms: Vec::new(),
            obsolete: false,
        }
    }

    pub fn is_a(mut self, target: &str) -> TermRecord {
        self.relations.push((RelationKind::IsA, target.to_string()));
        self
    }

    pub fn part_of(mut self, target: &str) -> TermRecord {
        self.relations.push((RelationKind::PartOf, target.to_string()));
        self
    }
}

#[derive(Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub struct Relation {
    pub kind: RelationKind,
    pub target: TermKey,
}

#[derive(Debug, Clone)]
pub struct Term {
    id: String,
    name: String,
    namespace: Namespace,
    relations: Vec<Relation>,
    parents: Vec<TermKey>,
    children: Vec<TermKey>,
    alt_ids: Vec<String>,
    synonyms: Vec<String>,
    obsolete: bool,
}

impl Term {
    fn new(id: &str, name: &str, namespace: Namespace) -> Term {
        Term {
            id: id.to_string(),
            name: name.to_string(),
            namespace,
            relations: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            alt_ids: Vec::new(),
            synonyms: Vec::new(),
            obsolete: false,
        }
    }

    #[inline(always)]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Distinct direct parents, regardless of relation kind.
    pub fn parents(&self) -> &[TermKey] {
        &self.parents
    }

    pub fn children(&self) -> &[TermKey] {
        &self.children
    }

    pub fn alt_ids(&self) -> &[String] {
        &self.alt_ids
    }

    pub fn synonyms(&self) -> &[String] {
        &self.synonyms
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete
    }
}

#[derive(Debug, Default)]
pub struct TermGraphBuilder {
    terms: Vec<Term>,
    index: HashMap<String, TermKey>,
    alt_ids: HashMap<String, TermKey>,
    relation_count: usize,
}

impl TermGraphBuilder {
    pub fn new() -> TermGraphBuilder {
        TermGraphBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn add_term(&mut self, id: &str, name: &str, namespace: Namespace) -> Result<TermKey> {
        if self.is_taken(id) {
            return Err(GoError::DuplicateTerm(id.to_string()));
        }
        let key = TermKey(self.terms.len());
        self.terms.push(Term::new(id, name, namespace));
        self.index.insert(id.to_string(), key);
        Ok(key)
    }

    pub fn add_alt_id(&mut self, term_id: &str, alt_id: &str) -> Result<()> {
        let key = self.resolve(term_id)?;
        if self.is_taken(alt_id) {
            return Err(GoError::DuplicateTerm(alt_id.to_string()));
        }
        self.alt_ids.insert(alt_id.to_string(), key);
        self.terms[key.0].alt_ids.push(alt_id.to_string());
        Ok(())
    }

    pub fn add_synonym(&mut self, term_id: &str, synonym: &str) -> Result<()> {
        let key = self.resolve(term_id)?;
        self.terms[key.0].synonyms.push(synonym.to_string());
        Ok(())
    }

    pub fn mark_obsolete(&mut self, term_id: &str) -> Result<()> {
        let key = self.resolve(term_id)?;
        self.terms[key.0].obsolete = true;
        Ok(())
    }

    /// Repeating an identical edge is a no-op.
    pub fn add_relation(&mut self, source_id: &str, kind: RelationKind, target_id: &str) -> Result<()> {
        let source = self.resolve(source_id)?;
        let target = self.resolve(target_id)?;
        let relation = Relation { kind, target };

        let term = &mut self.terms[source.0];
        if term.relations.contains(&relation) {
            return Ok(());
        }
        term.relations.push(relation);
        if !term.parents.contains(&target) {
            term.parents.push(target);
        }
        self.relation_count += 1;
        Ok(())
    }

    pub fn finalize(self) -> Result<TermGraph> {
        if let Some(key) = smallest_cyclic_term(&self.terms) {
            return Err(GoError::CycleDetected(self.terms[key.0].id.clone()));
        }

        let TermGraphBuilder { mut terms, index, alt_ids, relation_count } = self;

        // Children are the transpose of the deduplicated parent lists
        let mut children: Vec<Vec<TermKey>> = vec![Vec::new(); terms.len()];
        for (i, term) in terms.iter().enumerate() {
            for parent in &term.parents {
                children[parent.0].push(TermKey(i));
            }
        }

        let mut names = HashMap::with_capacity(terms.len());
        let mut synonyms = HashMap::new();
        for ((i, term), term_children) in terms.iter_mut().enumerate().zip(children) {
            term.children = term_children;
            names.entry(term.name.clone()).or_insert(TermKey(i));
            for synonym in &term.synonyms {
                synonyms.entry(synonym.clone()).or_insert(TermKey(i));
            }
        }

        info!(terms = terms.len(), relations = relation_count, "finalized term graph");

        let slots = terms.len();
        Ok(TermGraph {
            terms,
            index,
            alt_ids,
            names,
            synonyms,
            relation_count,
            ancestors: SlotCache::with_slots(slots),
            descendants: SlotCache::with_slots(slots),
        })
    }

    fn is_taken(&self, id: &str) -> bool {
        self.index.contains_key(id) || self.alt_ids.contains_key(id)
    }

    fn resolve(&self, id: &str) -> Result<TermKey> {
        self.index.get(id)
            .or_else(|| self.alt_ids.get(id))
            .copied()
            .ok_or_else(|| GoError::UnknownTerm(id.to_string()))
    }
}

/// Registers all terms before linking relations, so records may point forward.
pub fn build_term_graph<I>(records: I) -> Result<TermGraph>
    where I: IntoIterator<Item=TermRecord>
{
    let records: Vec<TermRecord> = records.into_iter().collect();
    let mut builder = TermGraphBuilder::new();

    for record in &records {
        builder.add_term(&record.id, &record.name, record.namespace)?;
        for alt_id in &record.alt_ids {
            builder.add_alt_id(&record.id, alt_id)?;
        }
        for synonym in &record.synonyms {
            builder.add_synonym(&record.id, synonym)?;
        }
        if record.obsolete {
            builder.mark_obsolete(&record.id)?;
        }
    }

    for record in &records {
        for (kind, target) in &record.relations {
            builder.add_relation(&record.id, *kind, target)?;
        }
    }

    builder.finalize()
}

/// Smallest id over every cyclic strongly connected component (iterative Tarjan).
fn smallest_cyclic_term(terms: &[Term]) -> Option<TermKey> {
    const UNVISITED: usize = usize::MAX;

    let len = terms.len();
    let mut order = vec![UNVISITED; len];
    let mut low = vec![0; len];
    let mut on_stack = vec![false; len];
    let mut stack: Vec<usize> = Vec::new();
    let mut counter = 0;
    let mut smallest: Option<usize> = None;

    for start in 0..len {
        if order[start] != UNVISITED {
            continue;
        }

        order[start] = counter;
        low[start] = counter;
        counter += 1;
        stack.push(start);
        on_stack[start] = true;
        let mut work: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(frame) = work.last_mut() {
            let (node, edge) = *frame;
            let parents = &terms[node].parents;

            if edge < parents.len() {
                frame.1 += 1;
                let next = parents[edge].0;
                if order[next] == UNVISITED {
                    order[next] = counter;
                    low[next] = counter;
                    counter += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    work.push((next, 0));
                } else if on_stack[next] {
                    low[node] = low[node].min(order[next]);
                }
                continue;
            }

            work.pop();
            if let Some(&(caller, _)) = work.last() {
                low[caller] = low[caller].min(low[node]);
            }
            if low[node] != order[node] {
                continue;
            }

            let mut component = Vec::new();
            while let Some(member) = stack.pop() {
                on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }

            let cyclic = component.len() > 1
                || terms[node].parents.iter().any(|parent| parent.0 == node);
            if !cyclic {
                continue;
            }
            for member in component {
                let replace = smallest
                    .map(|current| terms[member].id < terms[current].id)
                    .unwrap_or(true);
                if replace {
                    smallest = Some(member);
                }
            }
        }
    }

    smallest.map(TermKey)
}

#[derive(Debug, Copy, Clone)]
enum Direction {
    Ancestors,
    Descendants,
}

#[derive(Debug)]
pub struct TermGraph {
    terms: Vec<Term>,
    index: HashMap<String, TermKey>,
    alt_ids: HashMap<String, TermKey>,
    names: HashMap<String, TermKey>,
    synonyms: HashMap<String, TermKey>,
    relation_count: usize,
    ancestors: SlotCache<TermSet>,
    descendants: SlotCache<TermSet>,
}

impl TermGraph {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn relation_count(&self) -> usize {
        self.relation_count
    }

    /// Resolves a primary or alternate id to its term's key.
    pub fn key_of(&self, id: &str) -> Option<TermKey> {
        self.index.get(id).or_else(|| self.alt_ids.get(id)).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Term> {
        self.key_of(id).map(|key| &self.terms[key.0])
    }

    pub fn term(&self, key: TermKey) -> Option<&Term> {
        self.terms.get(key.0)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.key_of(id).is_some()
    }

    /// Looks a term up by its exact name, falling back to EXACT synonyms.
    pub fn term_by_name(&self, name: &str) -> Option<&Term> {
        self.names.get(name)
            .or_else(|| self.synonyms.get(name))
            .map(|key| &self.terms[key.0])
    }

    pub fn iter_terms(&self) -> impl Iterator<Item=(TermKey, &Term)> {
        self.terms.iter().enumerate().map(|(i, term)| (TermKey(i), term))
    }

    /// Terms without any parent.
    pub fn roots(&self) -> impl Iterator<Item=&Term> {
        self.terms.iter().filter(|term| term.parents.is_empty())
    }

    pub fn parents_of(&self, id: &str) -> Result<HashSet<&str>> {
        let key = self.require(id)?;
        Ok(self.terms[key.0].parents.iter().map(|parent| self.id_of(*parent)).collect())
    }

    pub fn children_of(&self, id: &str) -> Result<HashSet<&str>> {
        let key = self.require(id)?;
        Ok(self.terms[key.0].children.iter().map(|child| self.id_of(*child)).collect())
    }

    /// All terms reachable along `is_a` / `part_of` edges, excluding the term itself.
    pub fn ancestors_of(&self, id: &str) -> Result<HashSet<&str>> {
        let key = self.require(id)?;
        Ok(self.ids(self.ancestor_keys(key)))
    }

    /// All terms that reach this one along `is_a` / `part_of` edges.
    pub fn descendants_of(&self, id: &str) -> Result<HashSet<&str>> {
        let key = self.require(id)?;
        Ok(self.ids(self.descendant_keys(key)))
    }

    /// Panics if `key` does not belong to this graph.
    pub fn ancestor_keys(&self, key: TermKey) -> &TermSet {
        self.closure(key, Direction::Ancestors)
    }

    pub fn descendant_keys(&self, key: TermKey) -> &TermSet {
        self.closure(key, Direction::Descendants)
    }

    /// Fills both closure caches for every term, in parallel.
    pub fn precompute_closures(&self) {
        (0..self.terms.len()).into_par_iter().for_each(|i| {
            self.ancestor_keys(TermKey(i));
            self.descendant_keys(TermKey(i));
        });
        debug!(
            ancestors = self.ancestors.populated(),
            descendants = self.descendants.populated(),
            "precomputed term closures"
        );
    }

    pub fn cached_ancestor_count(&self) -> usize {
        self.ancestors.populated()
    }

    pub(crate) fn id_of(&self, key: TermKey) -> &str {
        &self.terms[key.0].id
    }

    pub(crate) fn lookup_table(&self) -> HashMap<String, TermKey> {
        self.index.iter()
            .chain(self.alt_ids.iter())
            .map(|(id, key)| (id.clone(), *key))
            .collect()
    }

    fn require(&self, id: &str) -> Result<TermKey> {
        self.key_of(id).ok_or_else(|| GoError::UnknownTerm(id.to_string()))
    }

    fn ids<'a>(&'a self, keys: &'a TermSet) -> HashSet<&'a str> {
        keys.iter().map(|key| self.id_of(*key)).collect()
    }

    fn cache(&self, direction: Direction) -> &SlotCache<TermSet> {
        match direction {
            Direction::Ancestors => &self.ancestors,
            Direction::Descendants => &self.descendants,
        }
    }

    fn neighbors(&self, key: TermKey, direction: Direction) -> &[TermKey] {
        let term = &self.terms[key.0];
        match direction {
            Direction::Ancestors => &term.parents,
            Direction::Descendants => &term.children,
        }
    }

    fn closure(&self, key: TermKey, direction: Direction) -> &TermSet {
        let cache = self.cache(direction);
        if let Some(closure) = cache.lookup(key.0) {
            return closure;
        }

        // Fill everything still missing beneath `key` bottom-up so that each
        // computation only unions closures that are already cached.
        for pending in self.uncached_postorder(key, direction) {
            if pending != key {
                cache.get_or_compute(pending.0, || self.closure_from_neighbors(pending, direction));
            }
        }
        cache.get_or_compute(key.0, || self.closure_from_neighbors(key, direction))
    }

    fn closure_from_neighbors(&self, key: TermKey, direction: Direction) -> TermSet {
        let mut closure = TermSet::new();
        for &next in self.neighbors(key, direction) {
            closure.insert(next);
            closure.extend(self.closure(next, direction).iter().copied());
        }
        closure
    }

    fn uncached_postorder(&self, key: TermKey, direction: Direction) -> Vec<TermKey> {
        let cache = self.cache(direction);
        let mut order = Vec::new();
        let mut visited: TermSet = TermSet::new();
        let mut stack = vec![(key, 0)];
        visited.insert(key);

        while let Some(frame) = stack.last_mut() {
            let (current, edge) = *frame;
            let neighbors = self.neighbors(current, direction);
            if edge < neighbors.len() {
                frame.1 += 1;
                let next = neighbors[edge];
                if cache.lookup(next.0).is_none() && visited.insert(next) {
                    stack.push((next, 0));
                }
            } else {
                stack.pop();
                order.push(current);
            }
        }

        order
    }
}
