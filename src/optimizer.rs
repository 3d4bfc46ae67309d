//! Block-set reduction: cross-feed dedup, subdomain pruning, chunking.

use std::collections::HashSet;

/// Remove domains already covered by a higher-priority feed.
///
/// Pure set difference, computed after all feeds have finished fetching.
pub fn subtract_feeds(candidates: &HashSet<String>, higher: &HashSet<String>) -> HashSet<String> {
    candidates.difference(higher).cloned().collect()
}

/// Drop every domain that is a strict subdomain of another domain in the
/// set, returning the survivors in sorted order.
///
/// Reversing each domain string turns "is-a-subdomain-of" into
/// "is-a-string-prefix-of" under lexicographic order, so a single sorted
/// scan against the most recently kept ancestor suffices. O(n log n).
pub fn prune_subdomains(domains: &HashSet<String>) -> Vec<String> {
    let mut reversed: Vec<String> = domains.iter().map(|d| reverse(d)).collect();
    reversed.sort_unstable();

    let mut kept: Vec<String> = Vec::with_capacity(reversed.len());
    for d in reversed {
        if let Some(last) = kept.last() {
            // Proper subdomain check: prefix match plus a label boundary.
            // Exact duplicates cannot occur here (set semantics upstream).
            if d.len() > last.len()
                && d.starts_with(last.as_str())
                && d.as_bytes()[last.len()] == b'.'
            {
                continue;
            }
        }
        kept.push(d);
    }

    let mut out: Vec<String> = kept.iter().map(|d| reverse(d)).collect();
    out.sort_unstable();
    out
}

/// Split a sorted block-set into positional fixed-size chunks.
///
/// Chunk `i` always holds domains `[i*size, (i+1)*size)`; remote list ids
/// are reused across runs by position, so boundaries must be deterministic.
pub fn chunk_domains(sorted: &[String], size: usize) -> Vec<Vec<String>> {
    debug_assert!(size > 0);
    sorted.chunks(size).map(|c| c.to_vec()).collect()
}

fn reverse(s: &str) -> String {
    s.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(domains: &[&str]) -> HashSet<String> {
        domains.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_prune_keeps_parents_only() {
        let input = set(&["a.com", "x.a.com", "y.x.a.com", "b.com"]);
        let pruned = prune_subdomains(&input);
        assert_eq!(pruned, vec!["a.com".to_string(), "b.com".to_string()]);
    }

    #[test]
    fn test_prune_no_false_positives() {
        // String similarity is not subdomain containment.
        let input = set(&["notexample.com", "example.com"]);
        let pruned = prune_subdomains(&input);
        assert_eq!(pruned.len(), 2);
    }

    #[test]
    fn test_prune_deep_chain() {
        let input = set(&["d.c.b.a.com", "c.b.a.com", "b.a.com", "a.com"]);
        let pruned = prune_subdomains(&input);
        assert_eq!(pruned, vec!["a.com".to_string()]);
    }

    #[test]
    fn test_prune_unrelated_survive() {
        let input = set(&["one.org", "two.net", "three.io"]);
        let mut pruned = prune_subdomains(&input);
        pruned.sort();
        assert_eq!(pruned.len(), 3);
    }

    #[test]
    fn test_prune_empty() {
        assert!(prune_subdomains(&HashSet::new()).is_empty());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let input = set(&["a.com", "x.a.com", "b.com", "deep.x.b.com"]);
        let once = prune_subdomains(&input);
        let twice = prune_subdomains(&once.iter().cloned().collect());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_subtract_feeds_priority_dedup() {
        let feed_a = set(&["ads.com"]);
        let feed_b = set(&["ads.com", "sec.com"]);
        let result = subtract_feeds(&feed_b, &feed_a);
        assert_eq!(result, set(&["sec.com"]));
    }

    #[test]
    fn test_subtract_feeds_empty_higher() {
        let feed = set(&["a.com", "b.com"]);
        assert_eq!(subtract_feeds(&feed, &HashSet::new()), feed);
    }

    #[test]
    fn test_chunk_determinism() {
        let domains: Vec<String> = (0..2500).map(|i| format!("d{i:05}.example.com")).collect();
        let chunks = chunk_domains(&domains, 1000);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert_eq!(chunks[0][0], domains[0]);
        assert_eq!(chunks[2][499], domains[2499]);
    }

    #[test]
    fn test_chunk_exact_multiple() {
        let domains: Vec<String> = (0..2000).map(|i| format!("d{i:05}.example.com")).collect();
        let chunks = chunk_domains(&domains, 1000);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_chunk_empty() {
        assert!(chunk_domains(&[], 1000).is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn label_strategy() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}"
    }

    /// Generate a domain of 2 to 5 labels.
    fn domain_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(label_strategy(), 2..5).prop_map(|labels| labels.join("."))
    }

    fn domain_set_strategy(max: usize) -> impl Strategy<Value = HashSet<String>> {
        prop::collection::hash_set(domain_strategy(), 0..max)
    }

    proptest! {
        /// Pruning never increases the set and never invents domains.
        #[test]
        fn prop_prune_subset(domains in domain_set_strategy(60)) {
            let pruned = prune_subdomains(&domains);
            prop_assert!(pruned.len() <= domains.len());
            for d in &pruned {
                prop_assert!(domains.contains(d));
            }
        }

        /// No survivor is a strict subdomain of another survivor.
        #[test]
        fn prop_prune_no_nested_survivors(domains in domain_set_strategy(60)) {
            let pruned = prune_subdomains(&domains);
            for a in &pruned {
                for b in &pruned {
                    if a != b {
                        let nested = format!(".{b}");
                        prop_assert!(!a.ends_with(&nested), "{a} is nested under {b}");
                    }
                }
            }
        }

        /// Every dropped domain is covered by some survivor.
        #[test]
        fn prop_prune_coverage(domains in domain_set_strategy(60)) {
            let pruned = prune_subdomains(&domains);
            let kept: HashSet<&String> = pruned.iter().collect();
            for d in &domains {
                if !kept.contains(d) {
                    prop_assert!(
                        pruned.iter().any(|p| d.ends_with(&format!(".{p}"))),
                        "{d} dropped without a kept ancestor"
                    );
                }
            }
        }

        /// Output is sorted and duplicate-free, so recomputation is
        /// byte-identical.
        #[test]
        fn prop_prune_deterministic(domains in domain_set_strategy(60)) {
            let a = prune_subdomains(&domains);
            let b = prune_subdomains(&domains);
            prop_assert_eq!(&a, &b);
            let mut sorted = a.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(a, sorted);
        }

        /// Chunking preserves order and membership exactly.
        #[test]
        fn prop_chunk_partition(domains in prop::collection::vec(domain_strategy(), 0..200), size in 1usize..50) {
            let chunks = chunk_domains(&domains, size);
            let flattened: Vec<String> = chunks.into_iter().flatten().collect();
            prop_assert_eq!(flattened, domains);
        }

        /// Subtraction removes exactly the higher-priority members.
        #[test]
        fn prop_subtract_difference(a in domain_set_strategy(40), b in domain_set_strategy(40)) {
            let result = subtract_feeds(&a, &b);
            for d in &result {
                prop_assert!(a.contains(d) && !b.contains(d));
            }
            for d in &a {
                if !b.contains(d) {
                    prop_assert!(result.contains(d));
                }
            }
        }
    }
}
