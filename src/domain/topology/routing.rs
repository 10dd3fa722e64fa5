use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::utils::id::DeviceId;

/// Precomputed first hops between every ordered pair of distinct, connected devices.
///
/// Edges are directed as declared. Among several equally short paths the first hop is the neighbor with the
/// lexicographically smallest device name, so two runs over the same topology always route identically.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    next_hops: BTreeMap<(DeviceId, DeviceId), DeviceId>,
    distances: BTreeMap<(DeviceId, DeviceId), u32>,
}

impl RoutingTable {
    /// Floyd–Warshall over hop counts, followed by a first-hop selection per pair.
    pub fn build(adjacency: &BTreeMap<DeviceId, BTreeSet<DeviceId>>) -> Self {
        let mut vertices: BTreeSet<DeviceId> = adjacency.keys().cloned().collect();
        for neighbors in adjacency.values() {
            vertices.extend(neighbors.iter().cloned());
        }
        let devices: Vec<DeviceId> = vertices.into_iter().collect();
        let index: HashMap<&DeviceId, usize> = devices.iter().enumerate().map(|(i, device)| (device, i)).collect();
        let n = devices.len();

        let mut dist: Vec<Vec<Option<u32>>> = vec![vec![None; n]; n];
        for (i, row) in dist.iter_mut().enumerate() {
            row[i] = Some(0);
        }
        for (source, neighbors) in adjacency {
            let i = index[source];
            for neighbor in neighbors {
                let j = index[neighbor];
                if i != j {
                    dist[i][j] = Some(1);
                }
            }
        }

        for k in 0..n {
            for i in 0..n {
                let Some(through_k) = dist[i][k] else { continue };
                for j in 0..n {
                    if let Some(rest) = dist[k][j] {
                        let candidate = through_k + rest;
                        if dist[i][j].is_none_or(|current| candidate < current) {
                            dist[i][j] = Some(candidate);
                        }
                    }
                }
            }
        }

        let mut table = RoutingTable::default();
        for (source, neighbors) in adjacency {
            let i = index[source];
            for (j, destination) in devices.iter().enumerate() {
                let Some(total) = dist[i][j] else { continue };
                if i == j {
                    continue;
                }

                // BTreeSet iterates neighbors in name order, so the first match is the tie-break winner.
                let first_hop = neighbors.iter().find(|neighbor| {
                    let n_idx = index[*neighbor];
                    n_idx != i && dist[n_idx][j] == Some(total - 1)
                });

                if let Some(hop) = first_hop {
                    table.next_hops.insert((source.clone(), destination.clone()), hop.clone());
                    table.distances.insert((source.clone(), destination.clone()), total);
                }
            }
        }

        log::debug!("Routing table built: {} devices, {} routes.", n, table.next_hops.len());
        table
    }

    /// `None` for `source == destination` and for unreachable pairs.
    pub fn next_hop(&self, source: &DeviceId, destination: &DeviceId) -> Option<&DeviceId> {
        self.next_hops.get(&(source.clone(), destination.clone()))
    }

    /// Hop count of the shortest path.
    pub fn distance(&self, source: &DeviceId, destination: &DeviceId) -> Option<u32> {
        self.distances.get(&(source.clone(), destination.clone())).copied()
    }

    /// The routing row of one device: destination -> next hop.
    pub fn routes_from(&self, source: &DeviceId) -> BTreeMap<DeviceId, DeviceId> {
        self.next_hops.iter().filter(|((src, _), _)| src == source).map(|((_, dst), hop)| (dst.clone(), hop.clone())).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &DeviceId, &DeviceId)> {
        self.next_hops.iter().map(|((src, dst), hop)| (src, dst, hop))
    }

    pub fn len(&self) -> usize {
        self.next_hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_hops.is_empty()
    }
}
