//! Entity resolution and unification.
//!
//! Mentions arrive as surface forms; the resolver clusters them with a
//! union-find seeded by name/alias equality (plus explicit alias links from
//! extraction) and matches each cluster against the graph. Cross-chapter
//! merges happen only on strong-alias intersection or an explicit rename;
//! ambiguous matches stay separate and go to the manual-review queue, so
//! precision beats recall and nothing is silently discarded.
//!
//! Temporal identity is fixed at triplet-insertion time: triplets reference
//! entity ids, and renames only append history, so facts recorded before a
//! rename keep the pre-rename identity forever.

use crate::error::{ResolveError, ResolveResult};
use crate::extract::RawMention;
use crate::graph::{Alias, AliasStrength, Entity, KnowledgeGraph};
use crate::id::EntityId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Disjoint-set over mention indices
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self { parent: (0..len).collect() }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// A merge the resolver refused to make automatically
#[derive(Debug, Clone)]
pub struct AmbiguousMerge {
    /// Chapter the mention came from
    pub chapter: u32,
    /// The mention's primary surface form
    pub mention: String,
    /// Distinct existing entities the mention could belong to
    pub candidates: Vec<EntityId>,
    /// Provisional entity the translation proceeds under
    pub provisional: EntityId,
}

/// The outcome of resolving one chapter's mentions
#[derive(Debug, Default)]
pub struct Resolution {
    assignments: HashMap<String, EntityId>,
    /// Entities created this chapter
    pub created: Vec<EntityId>,
    /// Merges deferred to manual review this chapter
    pub flagged: Vec<AmbiguousMerge>,
}

impl Resolution {
    /// The entity a surface form resolved to, case-insensitively
    pub fn entity_for(&self, name: &str) -> Option<EntityId> {
        self.assignments.get(&name.to_lowercase()).copied()
    }

    fn assign(&mut self, name: &str, id: EntityId) {
        self.assignments.insert(name.to_lowercase(), id);
    }
}

/// Clusters mentions into canonical entities against the knowledge graph
pub struct EntityResolver {
    graph: Arc<dyn KnowledgeGraph>,
    review_queue: StdMutex<Vec<AmbiguousMerge>>,
    cluster_locks: Mutex<HashMap<EntityId, Arc<Mutex<()>>>>,
}

impl EntityResolver {
    /// Create a resolver over the given graph
    pub fn new(graph: Arc<dyn KnowledgeGraph>) -> Self {
        Self {
            graph,
            review_queue: StdMutex::new(Vec::new()),
            cluster_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Merges waiting for manual review, oldest first
    pub fn pending_reviews(&self) -> Vec<AmbiguousMerge> {
        self.review_queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// One writer per entity cluster: all mutations of a matched entity
    /// happen under its lock.
    async fn cluster_lock(&self, id: EntityId) -> Arc<Mutex<()>> {
        let mut locks = self.cluster_locks.lock().await;
        locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Resolve a chapter's mentions into canonical entity ids.
    ///
    /// `alias_links` are explicit same-referent pairs extracted from the
    /// text (ALIAS_OF relations); they union mention clusters before any
    /// graph matching happens.
    pub async fn resolve_chapter(
        &self,
        chapter: u32,
        mentions: &[RawMention],
        alias_links: &[(String, String)],
    ) -> ResolveResult<Resolution> {
        let mut resolution = Resolution::default();
        if mentions.is_empty() {
            return Ok(resolution);
        }

        let clusters = cluster_mentions(mentions, alias_links);
        debug!(chapter, clusters = clusters.len(), "seeded mention clusters");

        for cluster in clusters {
            self.resolve_cluster(chapter, &cluster, &mut resolution).await?;
        }

        // Renames are applied after the clusters resolve so the old name is
        // already a known identity.
        for mention in mentions {
            if let Some(old_name) = &mention.renamed_from {
                self.apply_rename(chapter, old_name, &mention.name, &mut resolution)
                    .await?;
            }
        }

        Ok(resolution)
    }

    async fn resolve_cluster(
        &self,
        chapter: u32,
        cluster: &MentionCluster<'_>,
        resolution: &mut Resolution,
    ) -> ResolveResult<()> {
        // Only strong names are merge evidence, and only strong aliases on
        // the stored entity count as a hit.
        let mut candidates: Vec<EntityId> = Vec::new();
        for name in &cluster.strong_names {
            for entity in self.graph.query_entities_by_alias(name).await? {
                let strong_hit = entity
                    .aliases
                    .iter()
                    .any(|a| a.strength == AliasStrength::Strong && a.name.eq_ignore_ascii_case(name));
                if strong_hit && !candidates.contains(&entity.id) {
                    candidates.push(entity.id);
                }
            }
        }

        let id = match candidates.len() {
            0 => {
                let id = self.create_entity(chapter, cluster).await?;
                resolution.created.push(id);
                id
            }
            1 => {
                let id = candidates[0];
                let lock = self.cluster_lock(id).await;
                let _guard = lock.lock().await;
                self.extend_entity(id, chapter, cluster).await?;
                id
            }
            _ => {
                // Ambiguous: stay separate, flag for review, translate under
                // a provisional identity.
                let provisional = self.create_entity(chapter, cluster).await?;
                resolution.created.push(provisional);
                let flag = AmbiguousMerge {
                    chapter,
                    mention: cluster.primary.name.clone(),
                    candidates,
                    provisional,
                };
                warn!(
                    chapter,
                    mention = %flag.mention,
                    candidates = flag.candidates.len(),
                    "ambiguous merge deferred to manual review"
                );
                self.review_queue
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(flag.clone());
                resolution.flagged.push(flag);
                provisional
            }
        };

        for name in cluster.strong_names.iter().chain(cluster.weak_names.iter()) {
            resolution.assign(name, id);
        }
        Ok(())
    }

    async fn create_entity(
        &self,
        chapter: u32,
        cluster: &MentionCluster<'_>,
    ) -> ResolveResult<EntityId> {
        let mut entity = Entity::new(
            cluster.primary.name.clone(),
            cluster.primary.entity_type,
            chapter,
        )
        .with_description(cluster.primary.description.clone());

        for name in &cluster.strong_names {
            entity.add_alias(Alias::strong(name.clone(), chapter));
        }
        for name in &cluster.weak_names {
            entity.add_alias(Alias::weak(name.clone(), chapter));
        }

        let id = self.graph.upsert_entity(entity).await?;
        if let Some(term) = cluster.suggested_term {
            self.graph.lock_term(id, term, chapter).await?;
        }
        info!(chapter, name = %cluster.primary.name, %id, "created entity");
        Ok(id)
    }

    async fn extend_entity(
        &self,
        id: EntityId,
        chapter: u32,
        cluster: &MentionCluster<'_>,
    ) -> ResolveResult<()> {
        for name in &cluster.strong_names {
            self.graph
                .upsert_alias(id, Alias::strong(name.clone(), chapter))
                .await?;
        }
        for name in &cluster.weak_names {
            self.graph
                .upsert_alias(id, Alias::weak(name.clone(), chapter))
                .await?;
        }
        // Keep the appearance record current even when no alias is new.
        let found = self
            .graph
            .query_entities_by_alias(&cluster.primary.name)
            .await?
            .into_iter()
            .find(|e| e.id == id);
        let Some(mut refreshed) = found else {
            return Ok(());
        };
        refreshed.record_chapter(chapter);
        self.graph.upsert_entity(refreshed).await?;

        if let Some(term) = cluster.suggested_term {
            self.graph.lock_term(id, term, chapter).await?;
        }
        Ok(())
    }

    async fn apply_rename(
        &self,
        chapter: u32,
        old_name: &str,
        new_name: &str,
        resolution: &mut Resolution,
    ) -> ResolveResult<()> {
        let id = match resolution.entity_for(old_name) {
            Some(id) => id,
            None => {
                let matches = self.graph.query_entities_by_alias(old_name).await?;
                match matches.len() {
                    1 => matches[0].id,
                    _ => {
                        return Err(ResolveError::UnknownRenameTarget {
                            name: old_name.to_string(),
                            chapter,
                        })
                    }
                }
            }
        };

        let lock = self.cluster_lock(id).await;
        let _guard = lock.lock().await;
        self.graph.rename_entity(id, new_name, chapter).await?;
        resolution.assign(new_name, id);
        resolution.assign(old_name, id);
        info!(chapter, %old_name, %new_name, "applied rename event");
        Ok(())
    }
}

struct MentionCluster<'a> {
    primary: &'a RawMention,
    strong_names: Vec<String>,
    weak_names: Vec<String>,
    suggested_term: Option<&'a str>,
}

/// Seed clusters by name/alias equality plus explicit alias links
fn cluster_mentions<'a>(
    mentions: &'a [RawMention],
    alias_links: &[(String, String)],
) -> Vec<MentionCluster<'a>> {
    let mut uf = UnionFind::new(mentions.len());

    // Index every surface form to the mentions carrying it.
    let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, mention) in mentions.iter().enumerate() {
        for name in mention_names(mention) {
            by_name.entry(name.to_lowercase()).or_default().push(i);
        }
    }
    for indices in by_name.values() {
        for window in indices.windows(2) {
            uf.union(window[0], window[1]);
        }
    }

    for (left, right) in alias_links {
        let l = by_name.get(&left.to_lowercase()).and_then(|v| v.first());
        let r = by_name.get(&right.to_lowercase()).and_then(|v| v.first());
        if let (Some(&l), Some(&r)) = (l, r) {
            uf.union(l, r);
        }
    }

    let mut grouped: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..mentions.len() {
        grouped.entry(uf.find(i)).or_default().push(i);
    }

    let mut clusters: Vec<MentionCluster<'a>> = grouped
        .into_values()
        .map(|indices| {
            let primary = &mentions[indices[0]];
            let mut strong_names: Vec<String> = Vec::new();
            let mut weak_names: Vec<String> = Vec::new();
            let mut suggested_term = None;
            for &i in &indices {
                let mention = &mentions[i];
                push_unique(&mut strong_names, &mention.name);
                for alias in &mention.aliases {
                    push_unique(&mut strong_names, alias);
                }
                // A rename edge links the cluster to its pre-rename identity.
                if let Some(old_name) = &mention.renamed_from {
                    push_unique(&mut strong_names, old_name);
                }
                for alias in &mention.weak_aliases {
                    push_unique(&mut weak_names, alias);
                }
                if suggested_term.is_none() {
                    suggested_term = mention.suggested_term.as_deref();
                }
            }
            weak_names.retain(|w| !strong_names.iter().any(|s| s.eq_ignore_ascii_case(w)));
            MentionCluster { primary, strong_names, weak_names, suggested_term }
        })
        .collect();

    // Deterministic order regardless of hash iteration
    clusters.sort_by(|a, b| a.primary.name.cmp(&b.primary.name));
    clusters
}

fn mention_names(mention: &RawMention) -> impl Iterator<Item = &str> {
    std::iter::once(mention.name.as_str())
        .chain(mention.aliases.iter().map(String::as_str))
        .chain(mention.weak_aliases.iter().map(String::as_str))
        .chain(mention.renamed_from.iter().map(String::as_str))
}

fn push_unique(names: &mut Vec<String>, candidate: &str) {
    if !names.iter().any(|n| n.eq_ignore_ascii_case(candidate)) {
        names.push(candidate.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityType, MemoryGraph};

    fn mention(name: &str) -> RawMention {
        RawMention {
            name: name.to_string(),
            entity_type: EntityType::Person,
            description: String::new(),
            aliases: Vec::new(),
            weak_aliases: Vec::new(),
            suggested_term: None,
            renamed_from: None,
        }
    }

    fn mention_with_aliases(name: &str, aliases: &[&str], weak: &[&str]) -> RawMention {
        let mut m = mention(name);
        m.aliases = aliases.iter().map(|s| s.to_string()).collect();
        m.weak_aliases = weak.iter().map(|s| s.to_string()).collect();
        m
    }

    #[test]
    fn test_union_find_clusters_shared_names() {
        let mentions = vec![
            mention_with_aliases("Klein", &["Klein Moretti"], &[]),
            mention_with_aliases("Klein Moretti", &[], &["the detective"]),
            mention("Benson"),
        ];
        let clusters = cluster_mentions(&mentions, &[]);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_alias_links_union_clusters() {
        let mentions = vec![mention("Gehrman Sparrow"), mention("Klein")];
        let links = vec![("Gehrman Sparrow".to_string(), "Klein".to_string())];
        let clusters = cluster_mentions(&mentions, &links);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].strong_names.len(), 2);
    }

    #[tokio::test]
    async fn test_new_mention_creates_entity() {
        let graph = Arc::new(MemoryGraph::new());
        let resolver = EntityResolver::new(graph.clone());

        let resolution = resolver
            .resolve_chapter(1, &[mention("Klein")], &[])
            .await
            .unwrap();

        assert_eq!(resolution.created.len(), 1);
        assert!(resolution.entity_for("klein").is_some());
        assert_eq!(graph.entity_count().await, 1);
    }

    #[tokio::test]
    async fn test_same_strong_name_merges_across_chapters() {
        let graph = Arc::new(MemoryGraph::new());
        let resolver = EntityResolver::new(graph.clone());

        let first = resolver
            .resolve_chapter(1, &[mention("Klein")], &[])
            .await
            .unwrap();
        let second = resolver
            .resolve_chapter(2, &[mention_with_aliases("Klein", &[], &["the seer"])], &[])
            .await
            .unwrap();

        assert_eq!(first.entity_for("Klein"), second.entity_for("Klein"));
        assert_eq!(graph.entity_count().await, 1);
    }

    #[tokio::test]
    async fn test_weak_alias_is_not_merge_evidence() {
        let graph = Arc::new(MemoryGraph::new());
        let resolver = EntityResolver::new(graph.clone());

        resolver
            .resolve_chapter(1, &[mention_with_aliases("Klein", &[], &["the detective"])], &[])
            .await
            .unwrap();
        // A different person described with the same epithet must not merge.
        resolver
            .resolve_chapter(2, &[mention_with_aliases("Isaac", &[], &["the detective"])], &[])
            .await
            .unwrap();

        assert_eq!(graph.entity_count().await, 2);
    }

    #[tokio::test]
    async fn test_ambiguous_match_stays_separate_and_flags() {
        let graph = Arc::new(MemoryGraph::new());
        let resolver = EntityResolver::new(graph.clone());

        // Two distinct entities both strongly known as "Li".
        let mut wei = crate::graph::Entity::new("Li Wei", EntityType::Person, 1);
        wei.add_alias(crate::graph::Alias::strong("Li", 1));
        graph.upsert_entity(wei).await.unwrap();
        let mut na = crate::graph::Entity::new("Li Na", EntityType::Person, 1);
        na.add_alias(crate::graph::Alias::strong("Li", 1));
        graph.upsert_entity(na).await.unwrap();

        let resolution = resolver
            .resolve_chapter(2, &[mention("Li")], &[])
            .await
            .unwrap();

        assert_eq!(resolution.flagged.len(), 1);
        assert_eq!(resolution.flagged[0].candidates.len(), 2);
        assert_eq!(resolver.pending_reviews().len(), 1);
        // Best-effort provisional identity still resolves for translation.
        assert!(resolution.entity_for("Li").is_some());
        assert_eq!(graph.entity_count().await, 3);
    }

    #[tokio::test]
    async fn test_rename_applies_to_new_facts_only() {
        let graph = Arc::new(MemoryGraph::new());
        let resolver = EntityResolver::new(graph.clone());

        let first = resolver
            .resolve_chapter(1, &[mention("Anna")], &[])
            .await
            .unwrap();
        let id = first.entity_for("Anna").unwrap();

        let mut renamed = mention("Bella");
        renamed.renamed_from = Some("Anna".to_string());
        let second = resolver.resolve_chapter(2, &[renamed], &[]).await.unwrap();

        // Same identity before and after the rename
        assert_eq!(second.entity_for("Bella"), Some(id));
        assert_eq!(graph.canonical_name_at(id, 1).await.unwrap(), "Anna");
        assert_eq!(graph.canonical_name_at(id, 2).await.unwrap(), "Bella");
    }
}
