//! Pairwise task-scope conflict detection between registered agents.

/// One agent's claimed scope.
#[derive(Debug, Clone, Copy)]
pub struct ScopeClaim<'a> {
    pub agent_id: &'a str,
    pub patterns: &'a [String],
}

/// Two distinct agents claiming at least one identical pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeConflict {
    pub first: String,
    pub second: String,
    /// Overlapping patterns, in the first agent's declaration order.
    pub patterns: Vec<String>,
}

/// Compare every pair of claims once. Pairs are reported in roster order.
pub fn scope_conflicts(claims: &[ScopeClaim<'_>]) -> Vec<ScopeConflict> {
    let mut conflicts = Vec::new();
    for (i, first) in claims.iter().enumerate() {
        for second in &claims[i + 1..] {
            if first.agent_id == second.agent_id {
                continue;
            }
            let mut shared: Vec<String> = Vec::new();
            for pattern in first.patterns {
                if second.patterns.contains(pattern) && !shared.contains(pattern) {
                    shared.push(pattern.clone());
                }
            }
            if !shared.is_empty() {
                conflicts.push(ScopeConflict {
                    first: first.agent_id.to_string(),
                    second: second.agent_id.to_string(),
                    patterns: shared,
                });
            }
        }
    }
    conflicts
}
