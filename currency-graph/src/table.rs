//! Floyd–Warshall routing table and route reconstruction.

use std::collections::HashMap;

/// Hop count stored for pairs with no path between them.
pub const UNREACHABLE: u32 = u32::MAX;

/// Errors returned when asking the table for a route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("No conversion route from {from} to {to}")]
    NoRouteFound { from: String, to: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing Table
// ─────────────────────────────────────────────────────────────────────────────

/// All-pairs fewest-hop routing table.
///
/// `dist` and `next` are `n * n` row-major matrices. `next[i][j]` is the
/// second vertex on a shortest path from `i` to `j`, or `None` when `j` is
/// unreachable from `i` and on the diagonal.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    codes: Vec<String>,
    index: HashMap<String, usize>,
    dist: Vec<u32>,
    next: Vec<Option<usize>>,
}

impl RoutingTable {
    /// Builds a table from directed pairs.
    ///
    /// Each `(base, quote)` only creates the edge `base -> quote`. Callers that
    /// want reciprocal edges pass both directions or use
    /// [`ConversionGraph`](crate::ConversionGraph).
    pub fn build<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut codes: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut edges = Vec::new();

        let mut intern = |code: &str| -> usize {
            if let Some(&idx) = index.get(code) {
                return idx;
            }
            let idx = codes.len();
            codes.push(code.to_string());
            index.insert(code.to_string(), idx);
            idx
        };

        for (base, quote) in pairs {
            let b = intern(base.as_ref());
            let q = intern(quote.as_ref());
            edges.push((b, q));
        }

        Self::from_edges(codes, index, &edges)
    }

    pub(crate) fn from_edges(
        codes: Vec<String>,
        index: HashMap<String, usize>,
        edges: &[(usize, usize)],
    ) -> Self {
        let n = codes.len();
        let mut dist = vec![UNREACHABLE; n * n];
        let mut next = vec![None; n * n];

        for i in 0..n {
            dist[i * n + i] = 0;
        }

        for &(from, to) in edges {
            if from == to {
                continue;
            }
            dist[from * n + to] = 1;
            next[from * n + to] = Some(to);
        }

        for k in 0..n {
            for i in 0..n {
                let d_ik = dist[i * n + k];
                if d_ik == UNREACHABLE {
                    continue;
                }
                for j in 0..n {
                    let d_kj = dist[k * n + j];
                    if d_kj == UNREACHABLE {
                        continue;
                    }
                    let candidate = d_ik + d_kj;
                    if candidate < dist[i * n + j] {
                        dist[i * n + j] = candidate;
                        next[i * n + j] = next[i * n + k];
                    }
                }
            }
        }

        Self {
            codes,
            index,
            dist,
            next,
        }
    }

    /// Number of currencies in the table.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    /// Currency code to dense index map.
    pub fn code_index(&self) -> &HashMap<String, usize> {
        &self.index
    }

    /// Currency codes in index order.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Raw hop count between two indices, [`UNREACHABLE`] if disconnected.
    pub fn dist(&self, from: usize, to: usize) -> u32 {
        self.dist[from * self.codes.len() + to]
    }

    /// Raw next-hop entry between two indices.
    pub fn next_hop(&self, from: usize, to: usize) -> Option<usize> {
        self.next[from * self.codes.len() + to]
    }

    /// Fewest number of hops between two currencies, `None` if either is
    /// unknown or they are disconnected.
    pub fn hops(&self, from: &str, to: &str) -> Option<u32> {
        let i = *self.index.get(from)?;
        let j = *self.index.get(to)?;
        match self.dist(i, j) {
            UNREACHABLE => None,
            d => Some(d),
        }
    }

    /// Reconstructs the conversion route from `from` to `to`, both inclusive.
    pub fn route(&self, from: &str, to: &str) -> Result<Vec<String>, RouteError> {
        let start = *self
            .index
            .get(from)
            .ok_or_else(|| RouteError::UnknownCurrency(from.to_string()))?;
        let target = *self
            .index
            .get(to)
            .ok_or_else(|| RouteError::UnknownCurrency(to.to_string()))?;

        let mut route = vec![self.codes[start].clone()];
        let mut current = start;

        while current != target {
            // A path never needs more than n - 1 hops.
            if route.len() > self.codes.len() {
                return Err(self.no_route(from, to));
            }
            current = self
                .next_hop(current, target)
                .ok_or_else(|| self.no_route(from, to))?;
            route.push(self.codes[current].clone());
        }

        Ok(route)
    }

    fn no_route(&self, from: &str, to: &str) -> RouteError {
        RouteError::NoRouteFound {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
