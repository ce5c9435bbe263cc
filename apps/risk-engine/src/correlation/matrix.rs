//! Pairwise Pearson correlation matrix and cluster extraction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Symmetric correlation matrix over a symbol set.
///
/// Entries are in [-1, 1] with a unit diagonal. Pairs without enough
/// overlapping samples are absent from `entries` and listed in
/// `insufficient_pairs`; the matrix as a whole then carries reduced
/// confidence instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Symbols in index order.
    pub symbols: Vec<String>,
    /// Correlations keyed by symbol pair, canonical (lexicographic) order.
    pub entries: HashMap<(String, String), f64>,
    /// Pairs excluded for lack of overlapping samples.
    pub insufficient_pairs: Vec<(String, String)>,
}

impl CorrelationMatrix {
    /// Compute from per-symbol return windows.
    ///
    /// Each pair uses the overlap of the two windows' most recent
    /// samples; pairs with overlap shorter than `min_samples` are
    /// excluded and recorded.
    #[must_use]
    pub fn compute(windows: &HashMap<String, Vec<f64>>, min_samples: usize) -> Self {
        let mut symbols: Vec<String> = windows.keys().cloned().collect();
        symbols.sort();

        let mut entries = HashMap::new();
        let mut insufficient_pairs = Vec::new();

        for (i, a) in symbols.iter().enumerate() {
            for b in symbols.iter().skip(i + 1) {
                let (xs, ys) = (&windows[a], &windows[b]);
                let overlap = xs.len().min(ys.len());
                if overlap < min_samples {
                    insufficient_pairs.push((a.clone(), b.clone()));
                    continue;
                }
                let x_tail = &xs[xs.len() - overlap..];
                let y_tail = &ys[ys.len() - overlap..];
                if let Some(rho) = pearson(x_tail, y_tail) {
                    entries.insert((a.clone(), b.clone()), rho);
                } else {
                    // Zero variance on one leg; correlation undefined.
                    insufficient_pairs.push((a.clone(), b.clone()));
                }
            }
        }

        Self {
            symbols,
            entries,
            insufficient_pairs,
        }
    }

    /// Correlation for a pair, order-insensitive. Diagonal is 1.
    #[must_use]
    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        if a == b {
            return Some(1.0);
        }
        let key = canonical(a, b);
        self.entries.get(&key).copied()
    }

    /// Mean off-diagonal correlation over computed pairs; zero when no
    /// pair was computable.
    #[must_use]
    pub fn avg_correlation(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.entries.len() as f64;
        self.entries.values().sum::<f64>() / n
    }

    /// Mean absolute correlation of one symbol against the rest of the
    /// matrix; `None` when no pair involving the symbol was computable.
    #[must_use]
    pub fn avg_correlation_with(&self, symbol: &str) -> Option<f64> {
        let rhos: Vec<f64> = self
            .symbols
            .iter()
            .filter(|s| s.as_str() != symbol)
            .filter_map(|s| self.correlation(symbol, s))
            .collect();
        if rhos.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = rhos.len() as f64;
        Some(rhos.iter().map(|r| r.abs()).sum::<f64>() / n)
    }

    /// Whether any pair was excluded for insufficient data.
    #[must_use]
    pub fn reduced_confidence(&self) -> bool {
        !self.insufficient_pairs.is_empty()
    }

    /// Connected components of the graph with an edge where
    /// `|rho| > threshold`. Singleton components are omitted.
    #[must_use]
    pub fn clusters(&self, threshold: f64) -> Vec<Vec<String>> {
        let n = self.symbols.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], i: usize) -> usize {
            if parent[i] != i {
                let root = find(parent, parent[i]);
                parent[i] = root;
            }
            parent[i]
        }

        for (i, a) in self.symbols.iter().enumerate() {
            for (j, b) in self.symbols.iter().enumerate().skip(i + 1) {
                if let Some(rho) = self.correlation(a, b)
                    && rho.abs() > threshold
                {
                    let (ra, rb) = (find(&mut parent, i), find(&mut parent, j));
                    if ra != rb {
                        parent[ra] = rb;
                    }
                }
            }
        }

        let mut groups: HashMap<usize, Vec<String>> = HashMap::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            groups.entry(root).or_default().push(self.symbols[i].clone());
        }

        let mut clusters: Vec<Vec<String>> = groups
            .into_values()
            .filter(|g| g.len() > 1)
            .map(|mut g| {
                g.sort();
                g
            })
            .collect();
        clusters.sort();
        clusters
    }
}

fn canonical(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Pearson correlation coefficient; `None` when either series has zero
/// variance.
#[must_use]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}
