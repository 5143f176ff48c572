//! # ht-cluster
//!
//! Cluster-facing half of Hivetune: the execution-substrate capability
//! boundary, capacity discovery, and per-job resource allocation.
//!
//! The substrate (a pool of worker machines) is modeled as a trait
//! so the dispatcher can run against a real cluster adapter or a local
//! in-process implementation interchangeably.

mod allocator;
mod catalog;
mod substrate;

pub use allocator::{AllocationMode, AllocatorConfig, ResourceAllocator, ResourceOverrides};
pub use catalog::{CatalogConfig, ResourceCatalog};
pub use substrate::{ExecutionSubstrate, OutputLine, OutputSink, OutputStream};
