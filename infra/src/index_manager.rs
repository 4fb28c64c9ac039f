use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub cardinality: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub avg_access_time_micros: f64,
}

impl Default for IndexStats {
    fn default() -> Self {
        Self {
            hit_count: 0,
            miss_count: 0,
            avg_access_time_micros: 0.0,
        }
    }
}

struct Catalog {
    by_table: HashMap<String, Vec<IndexDef>>,
    insertion_order: Vec<String>,
    stats: HashMap<String, IndexStats>,
    last_accessed: HashMap<String, Instant>,
}

/// Per-backend catalog of `table -> indexes` plus running per-index access
/// stats. `find_best_index` is the planner's cost-estimation entry point:
/// it picks the index whose column list begins with the requested prefix
/// and has the highest cardinality, breaking ties by whichever index was
/// registered first.
pub struct IndexManager {
    catalog: RwLock<Catalog>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Catalog {
                by_table: HashMap::new(),
                insertion_order: Vec::new(),
                stats: HashMap::new(),
                last_accessed: HashMap::new(),
            }),
        }
    }

    pub fn register_index(&self, def: IndexDef) {
        let mut catalog = self.catalog.write().unwrap();
        catalog.insertion_order.push(def.name.clone());
        catalog.stats.entry(def.name.clone()).or_default();
        catalog.by_table.entry(def.table.clone()).or_default().push(def);
    }

    pub fn find_best_index(&self, table: &str, columns: &[String]) -> Option<IndexDef> {
        let catalog = self.catalog.read().unwrap();
        let candidates = catalog.by_table.get(table)?;
        let mut best: Option<&IndexDef> = None;
        for candidate in candidates {
            if candidate.columns.len() < columns.len() {
                continue;
            }
            if &candidate.columns[..columns.len()] != columns {
                continue;
            }
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    if candidate.cardinality > current.cardinality {
                        Some(candidate)
                    } else if candidate.cardinality == current.cardinality
                        && earlier(&catalog.insertion_order, &candidate.name, &current.name)
                    {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best.cloned()
    }

    /// Records a probe of `index_name` and folds `access_time` into its
    /// running weighted-mean access time: `avg <- (avg*n + new) / (n+1)`
    /// where `n` is the hit count observed *before* this call.
    pub fn record_access(&self, index_name: &str, hit: bool, access_time: Duration) {
        let mut catalog = self.catalog.write().unwrap();
        catalog.last_accessed.insert(index_name.to_string(), Instant::now());
        let stats = catalog.stats.entry(index_name.to_string()).or_default();
        if hit {
            let n = stats.hit_count as f64;
            let new = access_time.as_micros() as f64;
            stats.avg_access_time_micros = (stats.avg_access_time_micros * n + new) / (n + 1.0);
            stats.hit_count += 1;
        } else {
            stats.miss_count += 1;
        }
    }

    pub fn stats_for(&self, index_name: &str) -> Option<IndexStats> {
        self.catalog.read().unwrap().stats.get(index_name).copied()
    }
}

impl Default for IndexManager {
    fn default() -> Self {
        Self::new()
    }
}

fn earlier(order: &[String], a: &str, b: &str) -> bool {
    let pos_a = order.iter().position(|n| n == a);
    let pos_b = order.iter().position(|n| n == b);
    pos_a < pos_b
}
