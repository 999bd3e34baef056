//! Regression tree builder for gradient boosting
//!
//! Exact-greedy split search over pre-sorted feature columns, grown one
//! level at a time. Each level makes two passes per column: one to total
//! the gradient statistics of the present values per node, one to sweep
//! the candidate thresholds. NaN feature values are treated as missing and
//! follow a learned default direction.

/// Smallest loss reduction accepted for a split.
const MIN_SPLIT_GAIN: f64 = 1e-6;

/// A node of a fitted tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        /// Direction taken by missing (NaN) values
        default_left: bool,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value reached by `row`. Values below the threshold go left.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            match self.nodes.get(idx) {
                None => return 0.0,
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                    let go_left = if value.is_nan() {
                        *default_left
                    } else {
                        value < *threshold
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Number of edges on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    /// Bound on the absolute leaf weight before shrinkage; 0 disables it.
    pub max_delta_step: f64,
    pub learning_rate: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            max_delta_step: 0.0,
            learning_rate: 0.3,
        }
    }
}

impl TreeConfig {
    /// Unshrunk optimal weight for a node with the given sums.
    fn raw_weight(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        let w = -g / denom;
        if self.max_delta_step > 0.0 {
            w.clamp(-self.max_delta_step, self.max_delta_step)
        } else {
            w
        }
    }

    /// Leaf value stored in the tree (weight times learning rate).
    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        self.raw_weight(g, h) * self.learning_rate
    }

    /// Structure score of a node; higher is better.
    fn node_gain(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        if self.max_delta_step > 0.0 {
            let w = self.raw_weight(g, h);
            -(2.0 * g * w + denom * w * w)
        } else {
            g * g / denom
        }
    }
}

/// Row indices of each column sorted by value, missing values excluded.
#[derive(Debug, Clone)]
pub struct SortedColumns {
    columns: Vec<Vec<usize>>,
}

impl SortedColumns {
    pub fn new(features: &[Vec<f64>], n_features: usize) -> Self {
        let columns = (0..n_features)
            .map(|f| {
                let mut idx: Vec<usize> = (0..features.len())
                    .filter(|&r| !features[r][f].is_nan())
                    .collect();
                // Stable sort keeps equal values in row order.
                idx.sort_by(|&a, &b| features[a][f].total_cmp(&features[b][f]));
                idx
            })
            .collect();
        Self { columns }
    }

    pub fn column(&self, feature: usize) -> &[usize] {
        &self.columns[feature]
    }
}

/// Gradient and hessian sums plus row count.
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    g: f64,
    h: f64,
    count: usize,
}

impl Stats {
    fn add(&mut self, g: f64, h: f64) {
        self.g += g;
        self.h += h;
        self.count += 1;
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    default_left: bool,
    gain: f64,
    left: (f64, f64),
    right: (f64, f64),
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    node: usize,
    depth: usize,
    stats: Stats,
}

#[derive(Debug, Clone, Copy, Default)]
struct Sweep {
    g: f64,
    h: f64,
    last: Option<f64>,
}

/// Build regression trees over one fixed feature matrix
pub struct TreeBuilder<'a> {
    config: &'a TreeConfig,
    features: &'a [Vec<f64>],
    sorted: &'a SortedColumns,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(config: &'a TreeConfig, features: &'a [Vec<f64>], sorted: &'a SortedColumns) -> Self {
        Self {
            config,
            features,
            sorted,
        }
    }

    /// Grow one tree on the given rows, splitting only on `columns`.
    pub fn build(&self, gradients: &[f64], hessians: &[f64], rows: &[usize], columns: &[usize]) -> Tree {
        let mut position: Vec<Option<usize>> = vec![None; self.features.len()];
        let mut root = Stats::default();
        for &r in rows {
            position[r] = Some(0);
            root.add(gradients[r], hessians[r]);
        }

        let mut nodes = vec![Node::Leaf {
            value: self.config.leaf_value(root.g, root.h),
        }];
        let mut frontier = vec![Pending {
            node: 0,
            depth: 0,
            stats: root,
        }];

        while !frontier.is_empty() {
            frontier.retain(|p| p.depth < self.config.max_depth && p.stats.count > 1);
            if frontier.is_empty() {
                break;
            }

            let mut slot_of: Vec<Option<usize>> = vec![None; nodes.len()];
            for (slot, pending) in frontier.iter().enumerate() {
                slot_of[pending.node] = Some(slot);
            }

            let best = self.find_splits(&frontier, &slot_of, &position, gradients, hessians, columns);

            let mut next = Vec::new();
            for (pending, candidate) in frontier.iter().zip(best) {
                let Some(split) = candidate else {
                    continue;
                };

                let left = nodes.len();
                nodes.push(Node::Leaf {
                    value: self.config.leaf_value(split.left.0, split.left.1),
                });
                let right = nodes.len();
                nodes.push(Node::Leaf {
                    value: self.config.leaf_value(split.right.0, split.right.1),
                });
                nodes[pending.node] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    default_left: split.default_left,
                    left,
                    right,
                };

                for (node, (g, h)) in [(left, split.left), (right, split.right)] {
                    next.push(Pending {
                        node,
                        depth: pending.depth + 1,
                        stats: Stats { g, h, count: 0 },
                    });
                }
            }

            // Route rows of freshly split nodes to their children.
            for &r in rows {
                let Some(current) = position[r] else {
                    continue;
                };
                if let Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } = &nodes[current]
                {
                    let value = self.features[r][*feature];
                    let go_left = if value.is_nan() {
                        *default_left
                    } else {
                        value < *threshold
                    };
                    position[r] = Some(if go_left { *left } else { *right });
                }
            }

            let mut counts = vec![0usize; nodes.len()];
            for node in position.iter().flatten() {
                counts[*node] += 1;
            }
            for pending in &mut next {
                pending.stats.count = counts[pending.node];
            }

            frontier = next;
        }

        Tree { nodes }
    }

    /// Best split per frontier slot, if any beats `MIN_SPLIT_GAIN`.
    fn find_splits(
        &self,
        frontier: &[Pending],
        slot_of: &[Option<usize>],
        position: &[Option<usize>],
        gradients: &[f64],
        hessians: &[f64],
        columns: &[usize],
    ) -> Vec<Option<Candidate>> {
        let slot = |r: usize| position[r].and_then(|node| slot_of[node]);
        let mut best: Vec<Option<Candidate>> = vec![None; frontier.len()];

        for &feature in columns {
            let column = self.sorted.column(feature);

            let mut present = vec![Stats::default(); frontier.len()];
            for &r in column {
                if let Some(s) = slot(r) {
                    present[s].add(gradients[r], hessians[r]);
                }
            }

            let mut sweeps = vec![Sweep::default(); frontier.len()];
            for &r in column {
                let Some(s) = slot(r) else {
                    continue;
                };
                let value = self.features[r][feature];
                let sweep = sweeps[s];
                if let Some(last) = sweep.last {
                    if value > last {
                        self.consider(
                            &mut best[s],
                            &frontier[s].stats,
                            &present[s],
                            feature,
                            (last + value) / 2.0,
                            (sweep.g, sweep.h),
                        );
                    }
                }
                let sweep = &mut sweeps[s];
                sweep.g += gradients[r];
                sweep.h += hessians[r];
                sweep.last = Some(value);
            }

            // Present values on one side, missing values on the other.
            for (s, pending) in frontier.iter().enumerate() {
                let missing = pending.stats.count - present[s].count;
                if missing == 0 || present[s].count == 0 {
                    continue;
                }
                let parent = &pending.stats;
                let left = (present[s].g, present[s].h);
                let right = (parent.g - present[s].g, parent.h - present[s].h);
                self.offer(
                    &mut best[s],
                    parent,
                    Candidate {
                        feature,
                        threshold: f64::INFINITY,
                        default_left: false,
                        gain: 0.0,
                        left,
                        right,
                    },
                );
            }
        }

        best
    }

    /// Evaluate a threshold with missing values sent either way.
    fn consider(
        &self,
        best: &mut Option<Candidate>,
        parent: &Stats,
        present: &Stats,
        feature: usize,
        threshold: f64,
        below: (f64, f64),
    ) {
        let missing = (parent.g - present.g, parent.h - present.h);
        let has_missing = parent.count > present.count;

        let left = below;
        let right = (parent.g - below.0, parent.h - below.1);
        self.offer(
            best,
            parent,
            Candidate {
                feature,
                threshold,
                default_left: false,
                gain: 0.0,
                left,
                right,
            },
        );

        if has_missing {
            let left = (below.0 + missing.0, below.1 + missing.1);
            let right = (parent.g - left.0, parent.h - left.1);
            self.offer(
                best,
                parent,
                Candidate {
                    feature,
                    threshold,
                    default_left: true,
                    gain: 0.0,
                    left,
                    right,
                },
            );
        }
    }

    /// Keep `candidate` if it is valid and strictly better than `best`.
    fn offer(&self, best: &mut Option<Candidate>, parent: &Stats, mut candidate: Candidate) {
        let min_weight = self.config.min_child_weight;
        if candidate.left.1 < min_weight || candidate.right.1 < min_weight {
            return;
        }

        candidate.gain = self.config.node_gain(candidate.left.0, candidate.left.1)
            + self.config.node_gain(candidate.right.0, candidate.right.1)
            - self.config.node_gain(parent.g, parent.h);

        let floor = best.map_or(MIN_SPLIT_GAIN, |b| b.gain);
        if candidate.gain > floor {
            *best = Some(candidate);
        }
    }
}
