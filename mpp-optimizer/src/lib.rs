//! ## Background
//!
//! A massively parallel processing (MPP) database runs every query on many segments at once.
//! Inside one segment the executor may split a scan over several worker processes, so a single
//! segment contributes more than one stream of tuples. The optimizer has to know about those
//! worker streams: a join of two worker-split scans is only correct when both sides agree on how
//! rows are spread, and a plan that reads a CTE or re-scans an input must not be split at all.
//!
//! This crate implements the parallel part of a cascades style cost based optimizer [1][2]. It
//! follows the property framework of [3]: every physical operator states what it requires from
//! its children, what it delivers, and whether an enforcer must be put on top to satisfy a
//! parent's request.
//!
//! ## Design
//!
//! * [`memo`] Groups, group expressions and rule application.
//! * [`operator`] Logical and physical operators, including the parallel ones.
//! * [`properties`] Distribution, order, rewindability, partition propagation and CTE
//! properties.
//! * [`rules`] Transformation and implementation rules that produce parallel plans.
//! * [`catalog`] Table metadata consulted by the rules.
//! * [`config`] Session switches and per query facts.
//!
//! ## Reference
//!
//! 1. Graefe, G., 1995. The cascades framework for query optimization. IEEE Data Eng. Bull., 18(3),
//! pp.19-29.
//! 2. Columnbia Project, https://github.com/yongwen/columbia
//! 3. Soliman, M.A., Antova, L., Raghavan, V., El-Helw, A., Gu, Z., Shen, E., Caragea, G.C.,
//! Garcia-Alvarado, C., Rahman, F., Petropoulos, M. and Waas, F., 2014, June.  Orca: a modular
//! query optimizer architecture for big data. In Proceedings of the 2014 ACM SIGMOD
//! international  conference on Management of data (pp. 337-348).

#[macro_use]
extern crate lazy_static;

pub mod catalog;
pub mod config;
pub mod error;
pub mod memo;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod properties;
pub mod rules;

#[cfg(test)]
mod test_utils;
