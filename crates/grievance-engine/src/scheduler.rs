//! Batch scheduler: reports whose candidate neighbourhoods overlap form one
//! component and are placed sequentially; disjoint components run in
//! parallel.

use std::collections::HashMap;

/// Disjoint-set forest with path halving.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// The smaller root wins, so a component's root is its first member.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (low, high) = (ra.min(rb), ra.max(rb));
            self.parent[high] = low;
        }
    }
}

/// Group batch positions by shared bucket keys. `None` keys (exact-scan
/// index) contend with everything. Components come out ordered by their
/// first member, members in submission order.
pub fn partition(keys: &[Option<Vec<u32>>]) -> Vec<Vec<usize>> {
    let n = keys.len();
    if n == 0 {
        return Vec::new();
    }
    if keys.iter().any(Option::is_none) {
        return vec![(0..n).collect()];
    }
    let mut set = DisjointSet::new(n);
    let mut owner: HashMap<u32, usize> = HashMap::new();
    for (i, buckets) in keys.iter().enumerate() {
        for key in buckets.iter().flatten() {
            match owner.get(key) {
                Some(&first) => set.union(first, i),
                None => {
                    owner.insert(*key, i);
                }
            }
        }
    }
    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut slot: HashMap<usize, usize> = HashMap::new();
    for i in 0..n {
        let root = set.find(i);
        let index = *slot.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[index].push(i);
    }
    components
}
