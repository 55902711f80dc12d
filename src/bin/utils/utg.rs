// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]

//
// unbranching path extraction: the maximal walks whose interior nodes have
// exactly one edge in and one edge out, the unitigs of the repeat graph
//

use rustc_hash::FxHashSet;

use super::repeat_graph::{rc, RepeatGraph, SeqId};

#[derive(Debug, Clone)]
pub struct UnbranchingPath {
    pub id: SeqId,
    pub path: Vec<usize>,
    pub node_left: usize,
    pub node_right: usize,
    pub length: u32,
    pub mean_coverage: f32,
    pub looped: bool,
}

fn is_interior(g: &RepeatGraph, n: usize) -> bool {
    g.nodes[n].in_edges.len() == 1 && g.nodes[n].out_edges.len() == 1
}

fn complement_path(g: &RepeatGraph, edges: &Vec<usize>) -> Vec<usize> {
    let mut out = Vec::<usize>::with_capacity(edges.len());
    for &e in edges.iter().rev() {
        out.push(g.complement_edge(e));
    }
    out
}

fn make_path(g: &RepeatGraph, edges: Vec<usize>, id: SeqId) -> UnbranchingPath {
    let first = edges[0];
    let last = *edges.last().unwrap();
    let mut length = 0_u32;
    let mut cov_sum = 0_f32;
    for &e in edges.iter() {
        length += g.edges[e].length;
        cov_sum += g.edges[e].mean_coverage * g.edges[e].length as f32;
    }
    let mean_coverage = if length > 0 {
        cov_sum / length as f32
    } else {
        0.0
    };
    UnbranchingPath {
        id,
        node_left: g.edges[first].node_left,
        node_right: g.edges[last].node_right,
        length,
        mean_coverage,
        looped: g.edges[first].node_left == g.edges[last].node_right,
        path: edges,
    }
}

pub fn get_unbranching_paths(g: &RepeatGraph) -> Vec<UnbranchingPath> {
    //
    // every path shows up together with its reverse complement twin and the
    // two carry complementary ids, so a pass can stage both strands of a
    // structure by id alone
    //

    let mut visited = FxHashSet::<usize>::default();
    let mut paths = Vec::<UnbranchingPath>::new();

    // walks seeded at branching nodes, singleton edges included
    for e in 0..g.edges.len() {
        if visited.contains(&e) {
            continue;
        }
        if is_interior(g, g.edges[e].node_left) {
            continue;
        }

        let mut edges = vec![e];
        let mut cur = e;
        while is_interior(g, g.edges[cur].node_right) {
            let next = g.nodes[g.edges[cur].node_right].out_edges[0];
            edges.push(next);
            cur = next;
        }
        for &ee in edges.iter() {
            visited.insert(ee);
        }

        let twin = complement_path(g, &edges);
        for &ee in twin.iter() {
            visited.insert(ee);
        }

        let id = g.edges[e].edge_id;
        let palindrome = twin == edges;
        paths.push(make_path(g, edges, id));
        if !palindrome {
            paths.push(make_path(g, twin, rc(id)));
        }
    }

    // whatever is left sits on circles with no branching node at all
    for e in 0..g.edges.len() {
        if visited.contains(&e) {
            continue;
        }
        let mut edges = vec![e];
        visited.insert(e);
        let mut cur = e;
        loop {
            let next = g.nodes[g.edges[cur].node_right].out_edges[0];
            if next == e {
                break;
            }
            edges.push(next);
            visited.insert(next);
            cur = next;
        }

        let twin = complement_path(g, &edges);
        for &ee in twin.iter() {
            visited.insert(ee);
        }

        let id = g.edges[e].edge_id;
        let palindrome = twin == edges;
        paths.push(make_path(g, edges, id));
        if !palindrome {
            paths.push(make_path(g, twin, rc(id)));
        }
    }
    paths
}
