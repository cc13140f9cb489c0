//! Solution-wide dependency graph
//!
//! Aggregates every project's direct and transitive package references into
//! one node per package, then layers on families, conflicts and critical
//! paths. Every enrichment step is optional and degrades to less data.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use super::families::FamilyDetector;
use crate::ai::Oracle;
use crate::config::Config;
use crate::constants::graph::{MAX_CRITICAL_PATHS, MIN_CRITICAL_PATH_LEN};
use crate::dotnet::{
    PackageMetadata, RegistryClient, SharedPackageManager, read_package_references,
    solution_projects,
};
use crate::types::{DependencyGraph, PackageNode, Result, VersionConflict};

/// Upper bound on chains enumerated before ranking
const PATH_ENUMERATION_LIMIT: usize = 1000;

pub struct DependencyGraphBuilder {
    package_manager: SharedPackageManager,
    detector: FamilyDetector,
    registry: Option<RegistryClient>,
    probe: bool,
}

impl DependencyGraphBuilder {
    pub fn new(package_manager: SharedPackageManager, config: &Config, oracle: Oracle) -> Result<Self> {
        let registry = if config.registry.enabled {
            Some(RegistryClient::new(&config.registry)?)
        } else {
            None
        };
        Ok(Self {
            package_manager,
            detector: FamilyDetector::new(config.families.clone(), oracle),
            registry,
            probe: config.dotnet.probe_dependencies,
        })
    }

    #[instrument(skip(self), fields(solution = %solution_path.display()))]
    pub async fn analyze_solution_dependencies(&self, solution_path: &Path) -> Result<DependencyGraph> {
        let projects = solution_projects(solution_path)?;
        info!("Analyzing {} projects", projects.len());

        let mut packages: BTreeMap<String, PackageNode> = BTreeMap::new();

        for project in &projects {
            let key = project.path.to_string_lossy().into_owned();

            let direct = match read_package_references(&project.path) {
                Ok(direct) => direct,
                Err(e) => {
                    warn!("Skipping unreadable project {}: {}", key, e);
                    continue;
                }
            };
            for (name, version) in &direct {
                // Centrally managed versions arrive with the listing below
                if !version.is_empty() {
                    record(&mut packages, name, version, &key, true);
                }
            }

            match self.package_manager.list_packages(&project.path, true).await {
                Ok(listing) => {
                    for package in &listing.top_level {
                        record(&mut packages, &package.name, &package.resolved, &key, true);
                    }
                    for package in &listing.transitive {
                        record(&mut packages, &package.name, &package.resolved, &key, false);
                    }
                }
                Err(e) => warn!(
                    "Transitive listing failed for {}: {}; keeping direct references",
                    key, e
                ),
            }
        }

        let metadata = self.enrich(&mut packages).await;

        let families = self
            .detector
            .detect_package_families(&packages, metadata.as_ref())
            .await;
        for family in &families {
            for member in &family.packages {
                if let Some(node) = packages.get_mut(member)
                    && node.package_family.is_none()
                {
                    node.package_family = Some(family.id.clone());
                }
            }
        }

        link_dependents(&mut packages);
        let conflicts = detect_conflicts(&packages);
        let critical_paths = find_critical_paths(&packages);

        info!(
            packages = packages.len(),
            families = families.len(),
            conflicts = conflicts.len(),
            "Dependency graph built"
        );

        Ok(DependencyGraph {
            packages,
            package_families: families,
            conflicts,
            critical_paths,
        })
    }

    /// Registry metadata and probe closures for direct references
    async fn enrich(
        &self,
        packages: &mut BTreeMap<String, PackageNode>,
    ) -> Option<BTreeMap<String, PackageMetadata>> {
        let mut metadata = BTreeMap::new();

        if let Some(registry) = &self.registry {
            for (name, node) in packages.iter_mut().filter(|(_, n)| n.is_direct_reference) {
                match registry.fetch_metadata(name, &node.current_version).await {
                    Ok(meta) => {
                        for (dependency, range) in meta.all_dependencies() {
                            node.direct_dependencies.entry(dependency).or_insert(range);
                        }
                        metadata.insert(name.clone(), meta);
                    }
                    Err(e) => warn!("No registry metadata for {}: {}", name, e),
                }
            }
        }

        if self.probe {
            for (name, node) in packages.iter_mut().filter(|(_, n)| n.is_direct_reference) {
                match self
                    .package_manager
                    .probe_dependencies(name, &node.current_version)
                    .await
                {
                    Ok(listing) => {
                        for package in listing.transitive {
                            node.transitive_dependencies
                                .insert(package.name, package.resolved);
                        }
                    }
                    Err(e) => warn!("Probe failed for {}: {}", name, e),
                }
            }
        }

        (!metadata.is_empty()).then_some(metadata)
    }
}

fn record(
    packages: &mut BTreeMap<String, PackageNode>,
    name: &str,
    version: &str,
    project: &str,
    is_direct: bool,
) {
    match packages.get_mut(name) {
        Some(node) => node.record(version, project, is_direct),
        None => {
            packages.insert(
                name.to_string(),
                PackageNode::new(name, version, project, is_direct),
            );
        }
    }
}

/// Solution package a dependency id refers to, ignoring case
fn resolve<'a>(lookup: &HashMap<String, &'a str>, dependency: &str) -> Option<&'a str> {
    lookup.get(&dependency.to_lowercase()).copied()
}

fn lowercase_lookup(packages: &BTreeMap<String, PackageNode>) -> HashMap<String, &str> {
    packages
        .keys()
        .map(|name| (name.to_lowercase(), name.as_str()))
        .collect()
}

/// Fill `dependents` from every node's direct dependencies
pub(crate) fn link_dependents(packages: &mut BTreeMap<String, PackageNode>) {
    let pairs: Vec<(String, String)> = {
        let lookup = lowercase_lookup(packages);
        packages
            .iter()
            .flat_map(|(name, node)| {
                node.direct_dependencies
                    .keys()
                    .filter_map(|d| resolve(&lookup, d))
                    .filter(|target| *target != name.as_str())
                    .map(|target| (target.to_string(), name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    for (target, dependent) in pairs {
        if let Some(node) = packages.get_mut(&target)
            && !node.dependents.contains(&dependent)
        {
            node.dependents.push(dependent);
        }
    }
    for node in packages.values_mut() {
        node.dependents.sort();
    }
}

pub(crate) fn detect_conflicts(packages: &BTreeMap<String, PackageNode>) -> Vec<VersionConflict> {
    let conflicts: Vec<VersionConflict> = packages
        .values()
        .filter_map(|node| VersionConflict::from_project_versions(&node.name, &node.project_versions))
        .collect();
    debug!("{} version conflicts", conflicts.len());
    conflicts
}

/// Longest dependency chains among solution packages.
///
/// Chains start at packages nothing depends on and stop at packages with no
/// further dependencies or where the next step would revisit the chain.
pub(crate) fn find_critical_paths(packages: &BTreeMap<String, PackageNode>) -> Vec<Vec<String>> {
    let lookup = lowercase_lookup(packages);
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: BTreeMap<&str, NodeIndex> = BTreeMap::new();

    for name in packages.keys() {
        index.insert(name.as_str(), graph.add_node(name.as_str()));
    }
    for (name, node) in packages {
        for dependency in node.direct_dependencies.keys() {
            if let Some(target) = resolve(&lookup, dependency)
                && target != name.as_str()
            {
                let (from, to) = (index[name.as_str()], index[target]);
                if !graph.contains_edge(from, to) {
                    graph.add_edge(from, to, ());
                }
            }
        }
    }

    let roots: Vec<NodeIndex> = index
        .values()
        .copied()
        .filter(|&n| {
            graph.neighbors_directed(n, Direction::Incoming).next().is_none()
                && graph.neighbors_directed(n, Direction::Outgoing).next().is_some()
        })
        .collect();

    let mut paths: Vec<Vec<String>> = Vec::new();
    for root in roots {
        let mut chain = vec![root];
        walk(&graph, &mut chain, &mut paths);
        if paths.len() >= PATH_ENUMERATION_LIMIT {
            debug!("Critical path enumeration truncated");
            break;
        }
    }

    paths.retain(|p| p.len() >= MIN_CRITICAL_PATH_LEN);
    paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    paths.dedup();
    paths.truncate(MAX_CRITICAL_PATHS);
    paths
}

fn walk(graph: &DiGraph<&str, ()>, chain: &mut Vec<NodeIndex>, paths: &mut Vec<Vec<String>>) {
    if paths.len() >= PATH_ENUMERATION_LIMIT {
        return;
    }
    let Some(&last) = chain.last() else {
        return;
    };

    let mut next: Vec<NodeIndex> = graph
        .neighbors_directed(last, Direction::Outgoing)
        .filter(|n| !chain.contains(n))
        .collect();
    next.sort_by_key(|n| graph[*n]);

    if next.is_empty() {
        paths.push(chain.iter().map(|n| graph[*n].to_string()).collect());
        return;
    }
    for n in next {
        chain.push(n);
        walk(graph, chain, paths);
        chain.pop();
    }
}
