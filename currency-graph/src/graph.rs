//! Graph builder: currencies as vertices, exchange rates as edges.

use std::collections::HashMap;

use crate::table::RoutingTable;

/// Undirected-by-construction conversion graph.
///
/// Every exchange rate `base -> quote` contributes the edge itself and its
/// reciprocal `quote -> base`, both with unit weight, because a stored rate can
/// be applied in either direction (multiply forward, divide backward).
#[derive(Debug, Clone, Default)]
pub struct ConversionGraph {
    codes: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<(usize, usize)>,
}

impl ConversionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from the full currency list and every exchange-rate pair.
    ///
    /// Currencies without any exchange rate still become vertices, so routing
    /// to them reports "no route" rather than "unknown currency".
    pub fn from_exchange_rates<C, R, S>(currencies: C, rates: R) -> Self
    where
        C: IntoIterator<Item = S>,
        R: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut graph = Self::new();
        for code in currencies {
            graph.add_currency(code.as_ref());
        }
        for (base, quote) in rates {
            graph.add_exchange_rate(base.as_ref(), quote.as_ref());
        }
        graph
    }

    /// Adds a currency vertex and returns its dense index.
    pub fn add_currency(&mut self, code: &str) -> usize {
        if let Some(&idx) = self.index.get(code) {
            return idx;
        }
        let idx = self.codes.len();
        self.codes.push(code.to_string());
        self.index.insert(code.to_string(), idx);
        idx
    }

    /// Adds an exchange rate as a forward and a reciprocal edge.
    pub fn add_exchange_rate(&mut self, base: &str, quote: &str) {
        let b = self.add_currency(base);
        let q = self.add_currency(quote);
        if b == q {
            return;
        }
        self.edges.push((b, q));
        self.edges.push((q, b));
    }

    pub fn currency_count(&self) -> usize {
        self.codes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Runs the all-pairs shortest path solver over this graph.
    pub fn routing_table(&self) -> RoutingTable {
        RoutingTable::from_edges(self.codes.clone(), self.index.clone(), &self.edges)
    }
}
