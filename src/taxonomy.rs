use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::domain::TaxId;
use crate::error::JarvisError;

pub const RANK_FAMILY: &str = "family";
pub const RANK_GENUS: &str = "genus";
pub const RANK_SPECIES: &str = "species";

const NODES_FILE: &str = "nodes.dmp";
const NAMES_FILE: &str = "names.dmp";
const MERGED_FILE: &str = "merged.dmp";
const ARCHIVE_FILE: &str = "taxdmp.zip";

#[derive(Debug, Clone, Copy)]
pub struct DescendantBudget {
    pub max_nodes: usize,
    pub timeout: Duration,
}

impl Default for DescendantBudget {
    fn default() -> Self {
        Self {
            max_nodes: 50_000,
            timeout: Duration::from_millis(2_000),
        }
    }
}

pub trait TaxonomyStore: Send + Sync {
    /// Returns `id` if it is a live node, or the node it was merged into.
    fn current_id(&self, id: TaxId) -> Option<TaxId>;

    fn lineage(&self, id: TaxId) -> Result<Vec<TaxId>, JarvisError>;

    fn rank_of(&self, ids: &[TaxId]) -> HashMap<TaxId, String>;

    fn name_of(&self, ids: &[TaxId]) -> HashMap<TaxId, String>;

    fn name_to_ids(&self, name: &str) -> Vec<TaxId>;

    fn merged_predecessors(&self, id: TaxId) -> BTreeSet<TaxId>;

    fn children(&self, id: TaxId) -> BTreeSet<TaxId>;

    fn descendants(
        &self,
        id: TaxId,
        budget: &DescendantBudget,
    ) -> Result<BTreeSet<TaxId>, JarvisError>;

    /// Name of the first lineage node (root side first) carrying `rank`.
    fn rank_name(&self, id: TaxId, rank: &str) -> Result<Option<String>, JarvisError> {
        let lineage = self.lineage(id)?;
        let ranks = self.rank_of(&lineage);
        let names = self.name_of(&lineage);
        for taxon in &lineage {
            if ranks.get(taxon).map(String::as_str) == Some(rank) {
                return Ok(names.get(taxon).cloned());
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Clone)]
struct Node {
    parent: TaxId,
    rank: String,
}

#[derive(Debug, Default)]
pub struct NcbiTaxonomy {
    nodes: HashMap<TaxId, Node>,
    children: HashMap<TaxId, Vec<TaxId>>,
    names: HashMap<TaxId, String>,
    scientific_index: HashMap<String, Vec<TaxId>>,
    synonym_index: HashMap<String, Vec<TaxId>>,
    merged: HashMap<TaxId, TaxId>,
    merged_into: HashMap<TaxId, Vec<TaxId>>,
}

impl NcbiTaxonomy {
    /// Loads from a directory of `.dmp` files (plain or `.gz`), a directory
    /// holding `taxdmp.zip`, or the zip archive itself.
    pub fn load(path: &Path) -> Result<Self, JarvisError> {
        let taxonomy = if path.is_file() {
            Self::from_zip(path)?
        } else if path.join(NODES_FILE).exists() || path.join(format!("{NODES_FILE}.gz")).exists()
        {
            Self::from_dir(path)?
        } else if path.join(ARCHIVE_FILE).exists() {
            Self::from_zip(&path.join(ARCHIVE_FILE))?
        } else {
            return Err(JarvisError::TaxonomyMissing(path.to_path_buf()));
        };
        info!(
            nodes = taxonomy.nodes.len(),
            names = taxonomy.names.len(),
            merged = taxonomy.merged.len(),
            "taxonomy loaded from {}",
            path.display()
        );
        Ok(taxonomy)
    }

    pub fn from_dmp_text(nodes: &str, names: &str, merged: &str) -> Result<Self, JarvisError> {
        let mut taxonomy = Self::default();
        taxonomy.read_nodes(nodes.as_bytes())?;
        taxonomy.read_names(names.as_bytes())?;
        taxonomy.read_merged(merged.as_bytes())?;
        taxonomy.index_children();
        Ok(taxonomy)
    }

    fn from_dir(dir: &Path) -> Result<Self, JarvisError> {
        let mut taxonomy = Self::default();
        let nodes = open_dmp(dir, NODES_FILE)?
            .ok_or_else(|| JarvisError::TaxonomyMissing(dir.join(NODES_FILE)))?;
        taxonomy.read_nodes(nodes)?;
        let names = open_dmp(dir, NAMES_FILE)?
            .ok_or_else(|| JarvisError::TaxonomyMissing(dir.join(NAMES_FILE)))?;
        taxonomy.read_names(names)?;
        match open_dmp(dir, MERGED_FILE)? {
            Some(merged) => taxonomy.read_merged(merged)?,
            None => warn!("no {MERGED_FILE} in {}; merge history unavailable", dir.display()),
        }
        taxonomy.index_children();
        Ok(taxonomy)
    }

    fn from_zip(path: &Path) -> Result<Self, JarvisError> {
        let file = File::open(path)
            .map_err(|err| JarvisError::Filesystem(format!("open {}: {err}", path.display())))?;
        let mut archive =
            ZipArchive::new(file).map_err(|err| JarvisError::Filesystem(err.to_string()))?;
        let mut taxonomy = Self::default();
        {
            let entry = archive
                .by_name(NODES_FILE)
                .map_err(|_| JarvisError::TaxonomyMissing(path.join(NODES_FILE)))?;
            taxonomy.read_nodes(BufReader::new(entry))?;
        }
        {
            let entry = archive
                .by_name(NAMES_FILE)
                .map_err(|_| JarvisError::TaxonomyMissing(path.join(NAMES_FILE)))?;
            taxonomy.read_names(BufReader::new(entry))?;
        }
        if let Ok(entry) = archive.by_name(MERGED_FILE) {
            taxonomy.read_merged(BufReader::new(entry))?;
        } else {
            warn!("no {MERGED_FILE} in {}; merge history unavailable", path.display());
        }
        taxonomy.index_children();
        Ok(taxonomy)
    }

    fn read_nodes<R: BufRead>(&mut self, reader: R) -> Result<(), JarvisError> {
        for_each_row(reader, NODES_FILE, |line, fields| {
            let [id, parent, rank, ..] = fields else {
                return Err(parse_error(NODES_FILE, line, "expected at least 3 columns"));
            };
            let id = parse_taxid(NODES_FILE, line, id)?;
            let parent = parse_taxid(NODES_FILE, line, parent)?;
            self.nodes.insert(
                id,
                Node {
                    parent,
                    rank: rank.to_string(),
                },
            );
            Ok(())
        })
    }

    fn read_names<R: BufRead>(&mut self, reader: R) -> Result<(), JarvisError> {
        for_each_row(reader, NAMES_FILE, |line, fields| {
            let [id, name, _unique, class, ..] = fields else {
                return Err(parse_error(NAMES_FILE, line, "expected at least 4 columns"));
            };
            let id = parse_taxid(NAMES_FILE, line, id)?;
            let key = name.to_lowercase();
            match *class {
                "scientific name" => {
                    self.names.insert(id, name.to_string());
                    self.scientific_index.entry(key).or_default().push(id);
                }
                "synonym" | "equivalent name" | "genbank synonym" | "genbank common name"
                | "common name" => {
                    self.synonym_index.entry(key).or_default().push(id);
                }
                _ => {}
            }
            Ok(())
        })
    }

    fn read_merged<R: BufRead>(&mut self, reader: R) -> Result<(), JarvisError> {
        for_each_row(reader, MERGED_FILE, |line, fields| {
            let [old, new, ..] = fields else {
                return Err(parse_error(MERGED_FILE, line, "expected 2 columns"));
            };
            let old = parse_taxid(MERGED_FILE, line, old)?;
            let new = parse_taxid(MERGED_FILE, line, new)?;
            if let Some(existing) = self.merged.get(&old) {
                warn!(%old, %existing, ignored = %new, "duplicate merge row ignored");
                return Ok(());
            }
            self.merged.insert(old, new);
            self.merged_into.entry(new).or_default().push(old);
            Ok(())
        })
    }

    fn index_children(&mut self) {
        self.children.clear();
        for (id, node) in &self.nodes {
            if node.parent != *id {
                self.children.entry(node.parent).or_default().push(*id);
            }
        }
        for kids in self.children.values_mut() {
            kids.sort();
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl TaxonomyStore for NcbiTaxonomy {
    fn current_id(&self, id: TaxId) -> Option<TaxId> {
        let mut current = id;
        let mut seen = HashSet::new();
        loop {
            if self.nodes.contains_key(&current) {
                return Some(current);
            }
            if !seen.insert(current) {
                return None;
            }
            current = *self.merged.get(&current)?;
        }
    }

    fn lineage(&self, id: TaxId) -> Result<Vec<TaxId>, JarvisError> {
        let current = self
            .current_id(id)
            .ok_or(JarvisError::TaxonNotFound(id))?;
        if current != id {
            debug!(%id, %current, "translated merged taxid");
        }
        let mut chain = vec![current];
        let mut seen = HashSet::from([current]);
        let mut cursor = current;
        while let Some(node) = self.nodes.get(&cursor) {
            if node.parent == cursor || !seen.insert(node.parent) {
                break;
            }
            chain.push(node.parent);
            cursor = node.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    fn rank_of(&self, ids: &[TaxId]) -> HashMap<TaxId, String> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id).map(|node| (*id, node.rank.clone())))
            .collect()
    }

    fn name_of(&self, ids: &[TaxId]) -> HashMap<TaxId, String> {
        ids.iter()
            .filter_map(|id| self.names.get(id).map(|name| (*id, name.clone())))
            .collect()
    }

    fn name_to_ids(&self, name: &str) -> Vec<TaxId> {
        let key = name.trim().to_lowercase();
        let mut ids: Vec<TaxId> = Vec::new();
        let scientific = self.scientific_index.get(&key).into_iter().flatten();
        let synonyms = self.synonym_index.get(&key).into_iter().flatten();
        for id in scientific.chain(synonyms) {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    fn merged_predecessors(&self, id: TaxId) -> BTreeSet<TaxId> {
        self.merged_into
            .get(&id)
            .map(|olds| olds.iter().copied().collect())
            .unwrap_or_default()
    }

    fn children(&self, id: TaxId) -> BTreeSet<TaxId> {
        self.children
            .get(&id)
            .map(|kids| kids.iter().copied().collect())
            .unwrap_or_default()
    }

    fn descendants(
        &self,
        id: TaxId,
        budget: &DescendantBudget,
    ) -> Result<BTreeSet<TaxId>, JarvisError> {
        let start = Instant::now();
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        let mut steps = 0usize;
        while let Some(current) = queue.pop_front() {
            steps += 1;
            for kid in self.children.get(&current).into_iter().flatten() {
                if !found.insert(*kid) {
                    continue;
                }
                if found.len() > budget.max_nodes {
                    return Err(JarvisError::DescendantLimit {
                        taxid: id,
                        limit: budget.max_nodes,
                    });
                }
                queue.push_back(*kid);
            }
            if steps % 256 == 0 && start.elapsed() > budget.timeout {
                return Err(JarvisError::DescendantTimeout {
                    taxid: id,
                    elapsed_ms: start.elapsed().as_millis(),
                });
            }
        }
        Ok(found)
    }
}

fn open_dmp(dir: &Path, name: &str) -> Result<Option<Box<dyn BufRead>>, JarvisError> {
    let plain = dir.join(name);
    if plain.exists() {
        let file = File::open(&plain)
            .map_err(|err| JarvisError::Filesystem(format!("open {}: {err}", plain.display())))?;
        return Ok(Some(Box::new(BufReader::new(file))));
    }
    let gz = dir.join(format!("{name}.gz"));
    if gz.exists() {
        let file = File::open(&gz)
            .map_err(|err| JarvisError::Filesystem(format!("open {}: {err}", gz.display())))?;
        return Ok(Some(Box::new(BufReader::new(GzDecoder::new(file)))));
    }
    Ok(None)
}

fn for_each_row<R, F>(reader: R, file: &str, mut handle: F) -> Result<(), JarvisError>
where
    R: BufRead,
    F: FnMut(usize, &[&str]) -> Result<(), JarvisError>,
{
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|err| parse_error(file, line_no, &err.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_dmp_row(&line);
        handle(line_no, &fields)?;
    }
    Ok(())
}

fn split_dmp_row(line: &str) -> Vec<&str> {
    let body = line.trim_end_matches(['\r', '\n']);
    let body = body.strip_suffix('|').unwrap_or(body);
    body.split('|').map(str::trim).collect()
}

fn parse_taxid(file: &str, line: usize, value: &str) -> Result<TaxId, JarvisError> {
    value
        .parse::<TaxId>()
        .map_err(|_| parse_error(file, line, &format!("invalid taxid {value:?}")))
}

fn parse_error(file: &str, line: usize, message: &str) -> JarvisError {
    JarvisError::TaxonomyParse {
        file: file.to_string(),
        line,
        message: message.to_string(),
    }
}
