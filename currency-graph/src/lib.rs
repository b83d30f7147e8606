//! Currency Conversion Graph with All-Pairs Fewest-Hop Routing
//!
//! This library turns the set of known exchange-rate pairs into a routing
//! table: for every ordered pair of currencies it knows the fewest number of
//! hops needed to convert between them and the next currency to step through.
//!
//! The table is computed once with Floyd–Warshall and is immutable afterwards,
//! so callers can share it behind an `Arc` and swap in a freshly built table
//! whenever the set of currencies or exchange rates changes.
//!
//! # Example
//! ```
//! use currency_graph::ConversionGraph;
//!
//! let mut graph = ConversionGraph::new();
//! graph.add_exchange_rate("EUR", "USD");
//! graph.add_exchange_rate("USD", "AED");
//!
//! let table = graph.routing_table();
//! assert_eq!(table.route("EUR", "AED").unwrap(), vec!["EUR", "USD", "AED"]);
//! assert_eq!(table.route("AED", "EUR").unwrap(), vec!["AED", "USD", "EUR"]);
//! assert_eq!(table.hops("EUR", "AED"), Some(2));
//! ```

mod graph;
mod table;

pub use graph::ConversionGraph;
pub use table::{RouteError, RoutingTable, UNREACHABLE};
