//! Reference spectral signatures of known mineral occurrences
//!
//! Index values are sampled within a circular neighborhood around each
//! reference site, pooled across sites, and summarized per index. The
//! resulting signature is the target distribution that every other cell
//! is scored against.

mod extract;
mod validate;

pub use extract::{
    extract_signature, site_consistency, site_statistics, ConsistencyLevel, IndexSignature,
    SignatureParams, SiteConsistency, SiteCoverage, SiteStatistics, SpectralSignature,
};
pub use validate::{validate_signature, Discrimination, IndexValidation};
