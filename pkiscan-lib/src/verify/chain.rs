//! Certificate path building via DFS.
//!
//! Given a leaf certificate and a pool of untrusted intermediates, finds a
//! path whose last certificate is issued by a trust anchor. A candidate
//! issuer must match the child's raw issuer name and its key must verify the
//! child's signature. The anchor itself is matched on name first, so a bad
//! anchor signature is reported as such instead of as a missing issuer.
//!
//! Every signature check counts against a fixed budget. Many certificates
//! sharing one name and key can otherwise force the search through every
//! ordering of them.

use super::{check_signature, TrustStore};
use crate::fields::ParsedCertificate;

/// Maximum number of links followed during path building.
pub(crate) const MAX_CHAIN_DEPTH: usize = 32;

/// Maximum number of signature checks spent on one path search.
pub(crate) const MAX_SIGNATURE_CHECKS: usize = 1024;

/// A candidate path: `links` runs leaf-first, `anchor` issued the last link.
pub(crate) struct CandidatePath<'a> {
    pub links: Vec<&'a ParsedCertificate>,
    pub anchor: Option<&'a ParsedCertificate>,
    /// The search stopped because the budget ran out.
    pub exhausted: bool,
}

struct Search<'a> {
    pool: &'a [ParsedCertificate],
    anchors: &'a TrustStore,
    max_depth: usize,
    used: Vec<bool>,
    budget: usize,
}

impl<'a> Search<'a> {
    /// Spend one signature check; false once the budget is gone.
    fn spend(&mut self) -> bool {
        if self.budget == 0 {
            return false;
        }
        self.budget -= 1;
        true
    }

    fn signed_by(&mut self, child: &ParsedCertificate, issuer: &ParsedCertificate) -> bool {
        self.spend() && check_signature(child, issuer).is_ok()
    }

    fn dfs(
        &mut self,
        current: &'a ParsedCertificate,
        links: &mut Vec<&'a ParsedCertificate>,
    ) -> Option<&'a ParsedCertificate> {
        let anchors = self.anchors;
        // Prefer an anchor whose key actually signed `current`; cross-signed
        // roots share a subject.
        if let Some(candidates) = anchors.find_by_subject_raw(&current.issuer_raw) {
            let anchor = candidates
                .iter()
                .find(|a| self.signed_by(current, a))
                .or_else(|| candidates.first());
            if anchor.is_some() {
                return anchor;
            }
        }

        if links.len() >= self.max_depth {
            return None;
        }

        let pool = self.pool;
        for (idx, candidate) in pool.iter().enumerate() {
            if self.budget == 0 {
                return None;
            }
            if self.used.get(idx).copied().unwrap_or(true)
                || candidate.subject_raw != current.issuer_raw
                || candidate.raw_der == current.raw_der
                || !self.signed_by(current, candidate)
            {
                continue;
            }
            if let Some(flag) = self.used.get_mut(idx) {
                *flag = true;
            }
            links.push(candidate);

            if let Some(anchor) = self.dfs(candidate, links) {
                return Some(anchor);
            }

            links.pop();
            if let Some(flag) = self.used.get_mut(idx) {
                *flag = false;
            }
        }

        None
    }
}

/// Build a path from `leaf` to a certificate in `anchors`.
///
/// When no path exists, the returned path holds only the leaf and no anchor.
pub(crate) fn build_path<'a>(
    leaf: &'a ParsedCertificate,
    intermediates: &'a [ParsedCertificate],
    anchors: &'a TrustStore,
    max_depth: usize,
) -> CandidatePath<'a> {
    let mut search = Search {
        pool: intermediates,
        anchors,
        max_depth,
        used: vec![false; intermediates.len()],
        budget: MAX_SIGNATURE_CHECKS,
    };
    let mut links = vec![leaf];
    match search.dfs(leaf, &mut links) {
        Some(anchor) => CandidatePath {
            links,
            anchor: Some(anchor),
            exhausted: false,
        },
        None => {
            if search.budget == 0 {
                tracing::warn!(
                    subject = %leaf.subject_string(),
                    checks = MAX_SIGNATURE_CHECKS,
                    "path search budget exhausted"
                );
            }
            CandidatePath {
                links: vec![leaf],
                anchor: None,
                exhausted: search.budget == 0,
            }
        }
    }
}
